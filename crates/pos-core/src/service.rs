//! # Shop Service Trait
//!
//! The catalog/order service the terminal talks to. Implementations:
//! the REST client in `pos-http` and the in-memory [`MemoryShop`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ShopService (trait)             │
//! │  ├── search_products()                       │
//! │  ├── search_customers()                      │
//! │  ├── validate_discount_code()                │
//! │  └── create_order()                          │
//! └──────────────────────────────────────────────┘
//!                       ▲
//!            ┌──────────┴──────────┐
//!    ┌───────┴───────┐     ┌───────┴───────┐
//!    │HttpShopService│     │  MemoryShop   │
//!    └───────────────┘     └───────────────┘
//! ```
//!
//! [`MemoryShop`]: crate::memory::MemoryShop

use crate::catalog::{Customer, Product};
use crate::discount_code::{DiscountCodeValidation, DiscountCodeValidationRequest};
use crate::error::PosResult;
use crate::order::{OrderConfirmation, OrderRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Customer searches shorter than this are not sent
pub const MIN_CUSTOMER_QUERY_LEN: usize = 3;

/// How the operator looks a product up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductQuery {
    /// Free text over name and sku
    Text(String),
    /// Exact barcode scan
    Barcode(String),
}

impl ProductQuery {
    pub fn value(&self) -> &str {
        match self {
            ProductQuery::Text(q) | ProductQuery::Barcode(q) => q,
        }
    }
}

/// Catalog and order operations consumed by the checkout session.
#[async_trait]
pub trait ShopService: Send + Sync {
    /// Products (with nested variants and discount state) matching the query.
    async fn search_products(&self, query: &ProductQuery) -> PosResult<Vec<Product>>;

    /// Customers matching a query of at least [`MIN_CUSTOMER_QUERY_LEN`] characters.
    async fn search_customers(&self, query: &str) -> PosResult<Vec<Customer>>;

    /// Validate a typed code against the cart and customer.
    async fn validate_discount_code(
        &self,
        request: &DiscountCodeValidationRequest,
    ) -> PosResult<DiscountCodeValidation>;

    /// Create the order. The service is the sole source of truth for success.
    async fn create_order(&self, request: &OrderRequest) -> PosResult<OrderConfirmation>;

    /// Service name (for logging).
    fn service_name(&self) -> &'static str;
}

/// Type alias for a shared shop service (dynamic dispatch)
pub type BoxedShopService = Arc<dyn ShopService>;
