//! # Checkout Session
//!
//! One terminal, one operator, one order in progress. The session owns the
//! cart, the selected customer, notes and the payment ledger; every mutation
//! goes through it so totals and the cash leg are recomputed from current
//! state after each change.
//!
//! ## Async requests
//!
//! Network calls are split in two halves so the caller never holds the
//! session across an await:
//!
//! ```text
//!   (ticket, request) = session.discount_code_request(code)?
//!   response          = service.validate_discount_code(&request).await
//!   session.accept_discount_code(ticket, response)?   // StaleResponse if the
//!                                                      // cart moved meanwhile
//! ```
//!
//! The `apply_*` / `submit_order` helpers chain both halves for callers that
//! do own the session for the duration of the request.

use crate::cart::{Cart, CartItemId, CartTotals, DiscountType, ManualDiscount};
use crate::catalog::{Customer, OrderSource, Product};
use crate::discount_code::{
    AppliedDiscountCode, DiscountCodeValidation, DiscountCodeValidationRequest,
};
use crate::error::{PosError, PosResult};
use crate::order::{OrderConfirmation, OrderRequest};
use crate::payment::{CheckDetails, PaymentLedger, PaymentMethodType, PaymentValidationError};
use crate::service::{ProductQuery, ShopService, MIN_CUSTOMER_QUERY_LEN};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

/// Snapshot of the cart generation an async request was issued against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    generation: u64,
}

impl RequestTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Latest-request-wins result slot
#[derive(Debug, Clone)]
pub struct SearchResults<T> {
    latest: u64,
    results: Vec<T>,
}

impl<T> Default for SearchResults<T> {
    fn default() -> Self {
        Self {
            latest: 0,
            results: Vec::new(),
        }
    }
}

impl<T> SearchResults<T> {
    fn begin(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    fn accept(&mut self, search_id: u64, results: Vec<T>) -> bool {
        if search_id != self.latest {
            return false;
        }
        self.results = results;
        true
    }

    fn reset(&mut self) {
        self.latest += 1;
        self.results.clear();
    }

    pub fn results(&self) -> &[T] {
        &self.results
    }
}

/// The checkout in progress on this terminal
#[derive(Debug)]
pub struct CheckoutSession {
    cart: Cart,
    payments: PaymentLedger,
    customer: Option<Customer>,
    notes: String,
    generation: u64,
    processing: bool,
    products: SearchResults<Product>,
    customers: SearchResults<Customer>,
    channel: OrderSource,
    clock: fn() -> DateTime<Utc>,
    /// Terminal's offset from UTC; check dates are compared in local time
    utc_offset: FixedOffset,
}

impl Default for CheckoutSession {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutSession {
    pub fn new() -> Self {
        Self {
            cart: Cart::new(),
            payments: PaymentLedger::default(),
            customer: None,
            notes: String::new(),
            generation: 0,
            processing: false,
            products: SearchResults::default(),
            customers: SearchResults::default(),
            channel: OrderSource::InStore,
            clock: Utc::now,
            utc_offset: *Local::now().offset(),
        }
    }

    /// Builder: replace the clock (for date-dependent tests)
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Builder: pin the terminal's UTC offset
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn totals(&self) -> CartTotals {
        self.cart.compute_totals()
    }

    pub fn payments(&self) -> &PaymentLedger {
        &self.payments
    }

    pub fn customer(&self) -> Option<&Customer> {
        self.customer.as_ref()
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn product_results(&self) -> &[Product] {
        self.products.results()
    }

    pub fn customer_results(&self) -> &[Customer] {
        self.customers.results()
    }

    /// Calendar date at the terminal.
    pub fn today(&self) -> NaiveDate {
        (self.clock)().with_timezone(&self.utc_offset).date_naive()
    }

    /// Ticket for a request issued against the current cart.
    pub fn ticket(&self) -> RequestTicket {
        RequestTicket {
            generation: self.generation,
        }
    }

    // =========================================================================
    // Cart
    // =========================================================================

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add_product(
        &mut self,
        product: &Product,
        variant_id: Option<&str>,
    ) -> PosResult<CartItemId> {
        self.ensure_idle()?;
        let id = self
            .cart
            .add_item(product, variant_id, (self.clock)(), self.channel)?;
        self.cart_changed();
        debug!(item = %id, "added to cart");
        Ok(id)
    }

    pub fn update_quantity(&mut self, id: &CartItemId, quantity: i64) -> PosResult<()> {
        self.ensure_idle()?;
        self.cart.update_quantity(id, quantity)?;
        self.cart_changed();
        Ok(())
    }

    pub fn remove_item(&mut self, id: &CartItemId) -> PosResult<()> {
        self.ensure_idle()?;
        self.cart.remove_item(id)?;
        self.cart_changed();
        Ok(())
    }

    pub fn set_manual_discount(&mut self, amount: Decimal, kind: DiscountType) -> PosResult<()> {
        self.ensure_idle()?;
        self.cart.set_manual_discount(ManualDiscount::new(amount, kind)?);
        self.totals_changed();
        Ok(())
    }

    pub fn remove_discount_code(&mut self) -> PosResult<Option<AppliedDiscountCode>> {
        self.ensure_idle()?;
        let removed = self.cart.remove_discount_code();
        self.totals_changed();
        Ok(removed)
    }

    pub fn set_customer(&mut self, customer: Option<Customer>) {
        self.customer = customer;
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    /// Single reset point for a new transaction.
    pub fn clear(&mut self) -> PosResult<()> {
        self.ensure_idle()?;
        self.reset();
        Ok(())
    }

    // =========================================================================
    // Payments
    // =========================================================================

    pub fn add_payment_method(&mut self, method: PaymentMethodType) -> PosResult<String> {
        self.ensure_idle()?;
        self.payments.add_payment_method(method)
    }

    pub fn update_payment_amount(&mut self, id: &str, amount: Decimal) -> PosResult<()> {
        self.ensure_idle()?;
        self.payments.update_amount(id, amount)
    }

    pub fn set_cash_given(&mut self, given: Decimal) -> PosResult<()> {
        self.ensure_idle()?;
        self.payments.set_cash_given(given)
    }

    pub fn update_check(&mut self, id: &str, details: CheckDetails) -> PosResult<()> {
        self.ensure_idle()?;
        self.payments.update_check(id, details)
    }

    pub fn remove_payment_method(&mut self, id: &str) -> PosResult<()> {
        self.ensure_idle()?;
        self.payments.remove_payment_method(id)
    }

    pub fn validate_payments(&self) -> Result<(), PaymentValidationError> {
        self.payments.validate(self.today())
    }

    // =========================================================================
    // Discount codes
    // =========================================================================

    pub fn discount_code_request(
        &self,
        code: &str,
    ) -> PosResult<(RequestTicket, DiscountCodeValidationRequest)> {
        let code = code.trim();
        if code.is_empty() {
            return Err(PosError::InvalidRequest("discount code is empty".to_string()));
        }
        if self.cart.is_empty() {
            return Err(PosError::EmptyCart);
        }
        let request = DiscountCodeValidationRequest {
            code: code.to_string(),
            order_source: self.channel,
            customer_id: self.customer.as_ref().map(|c| c.id.clone()),
            cart_items: self.cart.code_lines(),
            subtotal: self.cart.subtotal_including_tax(),
        };
        Ok((self.ticket(), request))
    }

    /// Apply a validation result, replacing any previously applied code.
    pub fn accept_discount_code(
        &mut self,
        ticket: RequestTicket,
        validation: DiscountCodeValidation,
    ) -> PosResult<&AppliedDiscountCode> {
        self.ensure_idle()?;
        self.ensure_current(ticket)?;
        let applied = validation.into_applied()?;
        info!(code = %applied.code, amount = %applied.discount_amount, "discount code applied");
        self.cart.apply_discount_code(applied);
        self.totals_changed();
        self.cart
            .discount_code()
            .ok_or_else(|| PosError::Internal("discount code missing after apply".to_string()))
    }

    pub async fn apply_discount_code(
        &mut self,
        service: &dyn ShopService,
        code: &str,
    ) -> PosResult<&AppliedDiscountCode> {
        let (ticket, request) = self.discount_code_request(code)?;
        let validation = service.validate_discount_code(&request).await?;
        self.accept_discount_code(ticket, validation)
    }

    // =========================================================================
    // Searches
    // =========================================================================

    /// Start a product search; only the latest one may land.
    pub fn begin_product_search(&mut self) -> u64 {
        self.products.begin()
    }

    /// Store results; returns false when a newer search superseded this one.
    pub fn accept_product_results(&mut self, search_id: u64, products: Vec<Product>) -> bool {
        let accepted = self.products.accept(search_id, products);
        if !accepted {
            debug!(search_id, "discarding stale product results");
        }
        accepted
    }

    pub async fn search_products(
        &mut self,
        service: &dyn ShopService,
        query: ProductQuery,
    ) -> PosResult<&[Product]> {
        let search_id = self.begin_product_search();
        let products = service.search_products(&query).await?;
        self.accept_product_results(search_id, products);
        Ok(self.products.results())
    }

    pub fn begin_customer_search(&mut self) -> u64 {
        self.customers.begin()
    }

    pub fn accept_customer_results(&mut self, search_id: u64, customers: Vec<Customer>) -> bool {
        let accepted = self.customers.accept(search_id, customers);
        if !accepted {
            debug!(search_id, "discarding stale customer results");
        }
        accepted
    }

    pub async fn search_customers(
        &mut self,
        service: &dyn ShopService,
        query: &str,
    ) -> PosResult<&[Customer]> {
        let search_id = self.begin_customer_search();
        let query = query.trim();
        let customers = if query.chars().count() < MIN_CUSTOMER_QUERY_LEN {
            Vec::new()
        } else {
            service.search_customers(query).await?
        };
        self.accept_customer_results(search_id, customers);
        Ok(self.customers.results())
    }

    // =========================================================================
    // Order submission
    // =========================================================================

    /// Validate and package the order; marks the session as processing.
    #[instrument(skip(self))]
    pub fn prepare_order(&mut self) -> PosResult<(RequestTicket, OrderRequest)> {
        self.ensure_idle()?;
        if self.cart.is_empty() {
            return Err(PosError::EmptyCart);
        }
        self.validate_payments()?;

        let request = OrderRequest::from_checkout(
            &self.cart,
            &self.payments,
            self.customer.as_ref(),
            &self.notes,
            self.channel,
        );
        self.processing = true;
        Ok((self.ticket(), request))
    }

    /// Settle a submission: success clears the session, failure keeps the cart.
    pub fn finish_order(
        &mut self,
        ticket: RequestTicket,
        result: PosResult<OrderConfirmation>,
    ) -> PosResult<OrderConfirmation> {
        self.processing = false;
        match result {
            Ok(confirmation) => {
                if ticket.generation != self.generation {
                    warn!(
                        order = %confirmation.order_number,
                        "order confirmed for a cart that has since changed"
                    );
                }
                info!(order = %confirmation.order_number, "order created");
                self.reset();
                Ok(confirmation)
            }
            Err(err) => {
                warn!("Order submission failed: {}", err);
                Err(err)
            }
        }
    }

    pub async fn submit_order(
        &mut self,
        service: &dyn ShopService,
    ) -> PosResult<OrderConfirmation> {
        let (ticket, request) = self.prepare_order()?;
        let result = service.create_order(&request).await;
        self.finish_order(ticket, result)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_idle(&self) -> PosResult<()> {
        if self.processing {
            return Err(PosError::SubmissionInProgress);
        }
        Ok(())
    }

    fn ensure_current(&self, ticket: RequestTicket) -> PosResult<()> {
        if ticket.generation != self.generation {
            debug!(request = ticket.generation, current = self.generation, "stale response");
            return Err(PosError::StaleResponse {
                request: ticket.generation,
                current: self.generation,
            });
        }
        Ok(())
    }

    fn cart_changed(&mut self) {
        self.generation += 1;
        self.cart.refresh_discount_code();
        self.totals_changed();
    }

    fn totals_changed(&mut self) {
        let total = self.cart.compute_totals().total;
        self.payments.set_order_total(total);
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.cart.clear();
        self.payments.reset(Decimal::ZERO);
        self.customer = None;
        self.notes.clear();
        self.processing = false;
        self.products.reset();
        self.customers.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductVariant;
    use crate::discount_code::DiscountCode;
    use crate::memory::{MemoryShop, ShopCatalog};
    use crate::payment::PaymentDetails;
    use chrono::TimeZone;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 15, 30, 0).unwrap()
    }

    /// 22:00 on Oct 19 in New York (EDT)
    fn just_after_utc_midnight() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 20, 2, 0, 0).unwrap()
    }

    fn hoodie() -> Product {
        Product::new("p1", "Hoodie")
            .with_category("apparel")
            .with_variant(ProductVariant::new("v1", "Default", d("100")).with_inventory(5))
    }

    fn code_valid(amount: &str) -> DiscountCodeValidation {
        let code: DiscountCode = serde_json::from_value(serde_json::json!({
            "id": "dc1",
            "code": "SAVE10",
            "percentage": 10,
            "startDate": "2020-01-01T00:00:00Z",
            "endDate": "2099-01-01T00:00:00Z"
        }))
        .unwrap();
        DiscountCodeValidation::accepted(code, d(amount))
    }

    fn session_with_two() -> CheckoutSession {
        let mut session = CheckoutSession::new().with_clock(fixed_now);
        let id = session.add_product(&hoodie(), None).unwrap();
        session.update_quantity(&id, 2).unwrap();
        session
    }

    fn shop() -> MemoryShop {
        let mut catalog = ShopCatalog::new();
        catalog.products.push(hoodie());
        MemoryShop::new(catalog).with_clock(fixed_now)
    }

    #[test]
    fn test_cash_follows_cart_total() {
        let session = session_with_two();
        assert_eq!(session.totals().total, d("200"));
        assert_eq!(session.payments().cash().map(|c| c.amount), Some(d("200")));
    }

    #[test]
    fn test_full_checkout_scenario() {
        let mut session = session_with_two();
        let (ticket, _) = session.discount_code_request("SAVE10").unwrap();
        session.accept_discount_code(ticket, code_valid("20")).unwrap();
        session.set_manual_discount(d("10"), DiscountType::Percentage).unwrap();

        let totals = session.totals();
        assert_eq!(totals.total, d("162"));
        assert_eq!(session.payments().order_total(), d("162"));

        let check = session.add_payment_method(PaymentMethodType::Check).unwrap();
        session.update_payment_amount(&check, d("62")).unwrap();
        session
            .update_check(
                &check,
                CheckDetails {
                    check_number: "1001".into(),
                    bank_name: None,
                    check_date: Some(session.today()),
                    notes: None,
                },
            )
            .unwrap();
        assert_eq!(session.payments().cash().map(|c| c.amount), Some(d("100")));
        assert!(session.validate_payments().is_err());

        session.set_cash_given(d("100")).unwrap();
        assert!(session.validate_payments().is_ok());
    }

    #[test]
    fn test_stale_discount_code_response_is_discarded() {
        let mut session = session_with_two();
        let (ticket, request) = session.discount_code_request("SAVE10").unwrap();
        assert_eq!(request.subtotal, d("200"));

        let id = session.cart().items()[0].id.clone();
        session.update_quantity(&id, 1).unwrap();

        let err = session.accept_discount_code(ticket, code_valid("20")).unwrap_err();
        assert!(matches!(err, PosError::StaleResponse { .. }));
        assert!(session.cart().discount_code().is_none());
    }

    #[test]
    fn test_code_amount_follows_subtotal() {
        let mut session = session_with_two();
        let (ticket, _) = session.discount_code_request("SAVE10").unwrap();
        session.accept_discount_code(ticket, code_valid("20")).unwrap();

        let id = session.cart().items()[0].id.clone();
        session.update_quantity(&id, 3).unwrap();
        assert_eq!(session.totals().discount_code_amount, d("30"));
        assert_eq!(session.payments().order_total(), d("270"));
    }

    #[test]
    fn test_rejected_code_leaves_cart_alone() {
        let mut session = session_with_two();
        let (ticket, _) = session.discount_code_request("NOPE").unwrap();
        let rejected = DiscountCodeValidation {
            valid: false,
            discount_code: None,
            discount_amount: None,
            error: Some("code has expired".into()),
        };
        let err = session.accept_discount_code(ticket, rejected).unwrap_err();
        assert_eq!(err.to_string(), "Discount code rejected: code has expired");
        assert_eq!(session.totals().total, d("200"));
    }

    #[test]
    fn test_code_needs_cart() {
        let session = CheckoutSession::new();
        assert!(matches!(session.discount_code_request("SAVE10"), Err(PosError::EmptyCart)));
    }

    #[test]
    fn test_stale_search_results() {
        let mut session = CheckoutSession::new();
        let first = session.begin_product_search();
        let second = session.begin_product_search();

        assert!(session.accept_product_results(second, vec![hoodie()]));
        assert!(!session.accept_product_results(first, Vec::new()));
        assert_eq!(session.product_results().len(), 1);

        session.clear().unwrap();
        assert!(session.product_results().is_empty());
        assert!(!session.accept_product_results(second, vec![hoodie()]));
    }

    #[test]
    fn test_prepare_order_blocks_empty_cart() {
        let mut session = CheckoutSession::new();
        assert!(matches!(session.prepare_order(), Err(PosError::EmptyCart)));
        assert!(!session.is_processing());
    }

    #[test]
    fn test_prepare_order_requires_valid_payments() {
        let mut session = session_with_two();
        let err = session.prepare_order().unwrap_err();
        assert!(matches!(
            err,
            PosError::PaymentInvalid(PaymentValidationError::InsufficientCash { .. })
        ));
        assert!(!session.is_processing());
    }

    #[test]
    fn test_mutations_blocked_while_processing() {
        let mut session = session_with_two();
        session.set_cash_given(d("200")).unwrap();
        let (ticket, _) = session.prepare_order().unwrap();
        assert!(session.is_processing());

        assert!(matches!(
            session.add_product(&hoodie(), None),
            Err(PosError::SubmissionInProgress)
        ));
        assert!(matches!(session.clear(), Err(PosError::SubmissionInProgress)));
        assert!(matches!(
            session.remove_discount_code(),
            Err(PosError::SubmissionInProgress)
        ));

        let err = session
            .finish_order(ticket, Err(PosError::NetworkError("connection reset".into())))
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(!session.is_processing());
        assert_eq!(session.cart().items().len(), 1);
    }

    #[test]
    fn test_check_dated_today_in_local_time() {
        let edt = FixedOffset::west_opt(4 * 3600).unwrap();
        let mut session = CheckoutSession::new()
            .with_clock(just_after_utc_midnight)
            .with_utc_offset(edt);
        let id = session.add_product(&hoodie(), None).unwrap();
        session.update_quantity(&id, 2).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        assert_eq!(session.today(), today);

        let check = session.add_payment_method(PaymentMethodType::Check).unwrap();
        session.update_payment_amount(&check, d("200")).unwrap();
        session
            .update_check(
                &check,
                CheckDetails {
                    check_number: "2002".into(),
                    check_date: Some(today),
                    ..CheckDetails::default()
                },
            )
            .unwrap();
        assert!(session.validate_payments().is_ok());

        let yesterday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        session
            .update_check(
                &check,
                CheckDetails {
                    check_number: "2002".into(),
                    check_date: Some(yesterday),
                    ..CheckDetails::default()
                },
            )
            .unwrap();
        assert_eq!(
            session.validate_payments(),
            Err(PaymentValidationError::CheckDateInPast(yesterday))
        );
    }

    #[test]
    fn test_code_changes_blocked_while_processing() {
        let mut session = session_with_two();
        let (code_ticket, _) = session.discount_code_request("SAVE10").unwrap();
        session.set_cash_given(d("200")).unwrap();
        let (order_ticket, request) = session.prepare_order().unwrap();

        let err = session
            .accept_discount_code(code_ticket, code_valid("20"))
            .unwrap_err();
        assert!(matches!(err, PosError::SubmissionInProgress));

        session
            .finish_order(order_ticket, Err(PosError::NetworkError("timeout".into())))
            .unwrap_err();
        assert!(session.cart().discount_code().is_none());
        assert_eq!(session.totals(), request.expected_totals);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut session = session_with_two();
        session.set_notes("gift wrap");
        session.set_customer(Some(Customer {
            id: "c1".into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: None,
            phone: None,
        }));
        session.add_payment_method(PaymentMethodType::CreditCard).unwrap();
        session.clear().unwrap();

        assert!(session.cart().is_empty());
        assert!(session.customer().is_none());
        assert!(session.notes().is_empty());
        assert_eq!(session.payments().entries().len(), 1);
        assert_eq!(session.totals(), CartTotals::default());
    }

    #[tokio::test]
    async fn test_submit_order_clears_on_success() {
        let shop = shop();
        let mut session = session_with_two();
        session.set_cash_given(d("250")).unwrap();
        match &session.payments().cash().unwrap().details {
            PaymentDetails::Cash { cash_change, .. } => assert_eq!(*cash_change, Some(d("50"))),
            other => panic!("unexpected {other:?}"),
        }

        let confirmation = session.submit_order(&shop).await.unwrap();
        assert_eq!(confirmation.order_number, "POS-000001");
        assert!(session.cart().is_empty());
        assert!(!session.is_processing());
        assert_eq!(shop.snapshot().unwrap().products[0].variants[0].inventory, 3);
    }

    #[tokio::test]
    async fn test_submit_order_keeps_cart_on_failure() {
        let shop = shop();
        let mut session = session_with_two();
        session.set_manual_discount(d("5"), DiscountType::Fixed).unwrap();
        session.set_cash_given(d("195")).unwrap();

        // Stock sold elsewhere before the order lands.
        let mut other = CheckoutSession::new().with_clock(fixed_now);
        let id = other.add_product(&hoodie(), None).unwrap();
        other.update_quantity(&id, 4).unwrap();
        other.set_cash_given(d("400")).unwrap();
        other.submit_order(&shop).await.unwrap();

        let err = session.submit_order(&shop).await.unwrap_err();
        assert!(matches!(err, PosError::ServiceError { .. }));
        assert_eq!(session.totals().total, d("195"));
        assert!(!session.is_processing());
    }

    #[tokio::test]
    async fn test_customer_search_min_length() {
        let shop = shop();
        let mut session = CheckoutSession::new();
        assert!(session.search_customers(&shop, "ab").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_products_via_service() {
        let shop = shop();
        let mut session = CheckoutSession::new();
        let hits = session
            .search_products(&shop, ProductQuery::Text("hood".into()))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
