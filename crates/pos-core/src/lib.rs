//! # pos-core
//!
//! Pricing, discount and checkout engine for the shopdesk point of sale.
//!
//! This crate provides:
//! - Tax-inclusive money helpers (`money`)
//! - Effective unit price resolution across discount tiers (`pricing`)
//! - Discount code rules and wire types (`discount_code`)
//! - `Cart` with order-level discounts and `CartTotals`
//! - `PaymentLedger` for split cash/card/check tenders
//! - `CheckoutSession` tying it all together for one terminal
//! - `ShopService` trait plus the in-memory `MemoryShop`
//! - `PosError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use pos_core::{CheckoutSession, MemoryShop, ProductQuery, ShopCatalog};
//!
//! let shop = MemoryShop::new(ShopCatalog::from_toml(&toml)?);
//! let mut session = CheckoutSession::new();
//!
//! let hits = session.search_products(&shop, ProductQuery::Barcode("4000000000011".into())).await?;
//! let product = hits[0].clone();
//! session.add_product(&product, None)?;
//! session.apply_discount_code(&shop, "APPAREL20").await?;
//! session.set_cash_given(session.totals().total)?;
//!
//! let confirmation = session.submit_order(&shop).await?;
//! println!("order {}", confirmation.order_number);
//! ```

pub mod cart;
pub mod catalog;
pub mod discount_code;
pub mod error;
pub mod memory;
pub mod money;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod service;
pub mod session;

// Re-exports for convenience
pub use cart::{Cart, CartItem, CartItemId, CartTotals, DiscountType, ManualDiscount};
pub use catalog::{Customer, Discount, DiscountTarget, OrderSource, Product, ProductVariant};
pub use discount_code::{
    AppliedDiscountCode, CodeCartLine, DiscountCode, DiscountCodeRejection, DiscountCodeScope,
    DiscountCodeValidation, DiscountCodeValidationRequest,
};
pub use error::{ErrorCategory, PosError, PosResult};
pub use memory::{MemoryShop, ShopCatalog};
pub use money::{round_money, MONEY_TOLERANCE};
pub use order::{OrderConfirmation, OrderLine, OrderRequest, OrderStatus};
pub use payment::{
    CheckDetails, PaymentDetails, PaymentLedger, PaymentMethodEntry, PaymentMethodType,
    PaymentStatus, PaymentValidationError,
};
pub use pricing::{resolve_price, DiscountSource, ResolvedPrice};
pub use service::{BoxedShopService, ProductQuery, ShopService, MIN_CUSTOMER_QUERY_LEN};
pub use session::{CheckoutSession, RequestTicket};
