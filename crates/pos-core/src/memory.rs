//! # In-Memory Shop
//!
//! A self-contained [`ShopService`] over a catalog loaded from TOML.
//! Used for offline terminals, demos and tests. Order creation re-prices the
//! order from the catalog exactly like the real service would and refuses
//! it when stock or totals disagree.

use crate::cart::{Cart, CartItemId, ManualDiscount};
use crate::catalog::{Customer, Product};
use crate::discount_code::{
    DiscountCode, DiscountCodeRejection, DiscountCodeValidation, DiscountCodeValidationRequest,
};
use crate::error::{PosError, PosResult};
use crate::money::within_tolerance;
use crate::order::{OrderConfirmation, OrderRequest};
use crate::service::{ProductQuery, ShopService, MIN_CUSTOMER_QUERY_LEN};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

const SERVICE_NAME: &str = "memory";

/// Products, codes and customers held by the in-memory shop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopCatalog {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub discount_codes: Vec<DiscountCode>,
    #[serde(default)]
    pub customers: Vec<Customer>,
}

impl ShopCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn discount_code_by_code(&self, typed: &str) -> Option<&DiscountCode> {
        self.discount_codes.iter().find(|c| c.matches_code(typed))
    }

    /// Decrement stock for every cart line; nothing changes unless all lines fit.
    fn take_stock(&mut self, cart: &Cart) -> PosResult<()> {
        let mut remaining = Vec::with_capacity(cart.items().len());
        for item in cart.items() {
            let variant = self
                .product(&item.product_id)
                .and_then(|p| p.variant(&item.variant_id))
                .ok_or_else(|| service_error(format!("variant not found: {}", item.id)))?;
            let left = variant.inventory.checked_sub(item.quantity).ok_or_else(|| {
                service_error(format!(
                    "Insufficient stock for {}: {} available",
                    item.name, variant.inventory
                ))
            })?;
            remaining.push(left);
        }

        for (item, left) in cart.items().iter().zip(remaining) {
            if let Some(variant) = self
                .products
                .iter_mut()
                .find(|p| p.id == item.product_id)
                .and_then(|p| p.variants.iter_mut().find(|v| v.id == item.variant_id))
            {
                variant.inventory = left;
            }
        }
        Ok(())
    }

    fn categories_of(&self, product_id: &str) -> &[String] {
        self.product(product_id)
            .map(|p| p.category_ids.as_slice())
            .unwrap_or(&[])
    }
}

/// In-memory implementation of the shop service
pub struct MemoryShop {
    catalog: Mutex<ShopCatalog>,
    next_order: AtomicU64,
    clock: fn() -> DateTime<Utc>,
}

impl MemoryShop {
    pub fn new(catalog: ShopCatalog) -> Self {
        Self {
            catalog: Mutex::new(catalog),
            next_order: AtomicU64::new(1),
            clock: Utc::now,
        }
    }

    /// Builder: replace the clock (for date-window tests)
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Copy of the current catalog state
    pub fn snapshot(&self) -> PosResult<ShopCatalog> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> PosResult<MutexGuard<'_, ShopCatalog>> {
        self.catalog
            .lock()
            .map_err(|_| PosError::Internal("catalog lock poisoned".to_string()))
    }

    /// Re-price the order from catalog data. Repeated lines for the same
    /// variant are summed before the stock check.
    fn reprice(
        catalog: &ShopCatalog,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> PosResult<Repriced> {
        if request.items.is_empty() {
            return Err(service_error("order has no items"));
        }

        let mut cart = Cart::new();
        for line in &request.items {
            if line.quantity == 0 {
                return Err(service_error(format!(
                    "line quantity must be positive: {}:{}",
                    line.product_id, line.variant_id
                )));
            }
            let product = catalog.product(&line.product_id).ok_or_else(|| {
                service_error(format!("product not found: {}", line.product_id))
            })?;
            let already = cart
                .item(&CartItemId::new(&line.product_id, &line.variant_id))
                .map_or(0, |item| item.quantity);
            let id = cart
                .add_item(product, Some(&line.variant_id), now, request.order_source)
                .map_err(|e| service_error(e.to_string()))?;
            cart.update_quantity(&id, i64::from(already) + i64::from(line.quantity))
                .map_err(|e| service_error(e.to_string()))?;
        }

        let mut charged_code = None;
        if let Some(code_id) = &request.discount_code_id {
            let code = catalog
                .discount_codes
                .iter()
                .find(|c| &c.id == code_id)
                .ok_or_else(|| service_error(format!("discount code not found: {code_id}")))?;
            let validation = DiscountCodeValidationRequest {
                code: code.code.clone(),
                order_source: request.order_source,
                customer_id: request.customer_id.clone(),
                cart_items: cart.code_lines(),
                subtotal: cart.subtotal_including_tax(),
            };
            let amount = code
                .evaluate(&validation, now, |pid| catalog.categories_of(pid))
                .map_err(|e| service_error(format!("discount code {}: {e}", code.code)))?;
            let applied = DiscountCodeValidation::accepted(code.clone(), amount).into_applied()?;
            cart.apply_discount_code(applied);
            charged_code = Some(code.id.clone());
        }

        let manual = ManualDiscount::new(request.order_discount, request.order_discount_type)
            .map_err(|e| service_error(e.to_string()))?;
        cart.set_manual_discount(manual);

        let totals = cart.compute_totals();
        if !within_tolerance(totals.total, request.expected_totals.total) {
            return Err(service_error(format!(
                "order total mismatch: expected {}, computed {}",
                request.expected_totals.total, totals.total
            )));
        }

        let paid: Decimal = request.payment_methods.iter().map(|p| p.amount).sum();
        if !within_tolerance(paid, totals.total) {
            return Err(service_error(format!(
                "payments total {paid} but the order total is {}",
                totals.total
            )));
        }

        Ok(Repriced { cart, charged_code })
    }
}

/// Server-side view of an accepted order
struct Repriced {
    /// One line per variant with the summed quantity
    cart: Cart,
    /// Discount code to charge usage to
    charged_code: Option<String>,
}

fn service_error(message: impl Into<String>) -> PosError {
    PosError::ServiceError {
        service: SERVICE_NAME.to_string(),
        message: message.into(),
    }
}

#[async_trait]
impl ShopService for MemoryShop {
    async fn search_products(&self, query: &ProductQuery) -> PosResult<Vec<Product>> {
        let catalog = self.lock()?;
        let products: Vec<Product> = match query {
            ProductQuery::Text(text) => catalog
                .products
                .iter()
                .filter(|p| p.matches_text(text.trim()))
                .cloned()
                .collect(),
            ProductQuery::Barcode(code) => catalog
                .products
                .iter()
                .filter(|p| p.variant_by_barcode(code.trim()).is_some())
                .cloned()
                .collect(),
        };
        debug!(query = query.value(), hits = products.len(), "product search");
        Ok(products)
    }

    async fn search_customers(&self, query: &str) -> PosResult<Vec<Customer>> {
        let query = query.trim();
        if query.chars().count() < MIN_CUSTOMER_QUERY_LEN {
            return Ok(Vec::new());
        }
        let catalog = self.lock()?;
        Ok(catalog
            .customers
            .iter()
            .filter(|c| c.matches(query))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    async fn validate_discount_code(
        &self,
        request: &DiscountCodeValidationRequest,
    ) -> PosResult<DiscountCodeValidation> {
        let catalog = self.lock()?;
        let Some(code) = catalog.discount_code_by_code(&request.code) else {
            return Ok(DiscountCodeValidation::rejected(&DiscountCodeRejection::NotFound));
        };
        let outcome = code.evaluate(request, (self.clock)(), |pid| catalog.categories_of(pid));
        Ok(match outcome {
            Ok(amount) => DiscountCodeValidation::accepted(code.clone(), amount),
            Err(reason) => {
                debug!(%reason, "discount code rejected");
                DiscountCodeValidation::rejected(&reason)
            }
        })
    }

    #[instrument(skip(self, request), fields(items = request.items.len()))]
    async fn create_order(&self, request: &OrderRequest) -> PosResult<OrderConfirmation> {
        let mut catalog = self.lock()?;
        let repriced = Self::reprice(&catalog, request, (self.clock)())
            .and_then(|repriced| {
                catalog.take_stock(&repriced.cart)?;
                Ok(repriced)
            })
            .map_err(|e| {
                warn!("Order refused: {}", e);
                e
            })?;

        if let Some(code_id) = repriced.charged_code {
            if let Some(code) = catalog.discount_codes.iter_mut().find(|c| c.id == code_id) {
                code.used_count += 1;
            }
        }

        let sequence = self.next_order.fetch_add(1, Ordering::SeqCst);
        let confirmation = OrderConfirmation {
            id: uuid::Uuid::new_v4().to_string(),
            order_number: format!("POS-{sequence:06}"),
        };
        info!(
            "Created order {} ({} items, {:?})",
            confirmation.order_number,
            request.item_count(),
            request.payment_status
        );
        Ok(confirmation)
    }

    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }
}

impl Default for MemoryShop {
    fn default() -> Self {
        Self::new(ShopCatalog::new())
    }
}

impl std::fmt::Debug for MemoryShop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryShop")
            .field("next_order", &self.next_order.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
