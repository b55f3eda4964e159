//! # Cart
//!
//! In-memory cart of variant lines plus the two order-level discount layers
//! (one discount code, one manual discount). Totals are always a pure
//! recomputation of the current lines; nothing is patched incrementally.

use crate::catalog::{OrderSource, Product};
use crate::discount_code::{AppliedDiscountCode, CodeCartLine};
use crate::error::{PosError, PosResult};
use crate::money::{percent_of, price_excluding_tax, round_money, tax_amount};
use crate::pricing::{resolve_price, ResolvedPrice};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Composite cart line id: `{product_id}:{variant_id}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItemId(String);

impl CartItemId {
    pub fn new(product_id: &str, variant_id: &str) -> Self {
        Self(format!("{product_id}:{variant_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A line in the cart
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: String,
    pub variant_id: String,
    pub name: String,
    /// Original tax-inclusive unit price
    pub price: Decimal,
    /// Unit price after the per-item discount
    pub final_price: Decimal,
    pub quantity: u32,
    /// `final_price * quantity`
    pub total: Decimal,
    /// Unrounded tax-exclusive unit price
    pub price_excluding_tax: Decimal,
    /// Unrounded tax per unit
    pub tax_amount: Decimal,
    pub tax_rate: Decimal,
    /// Stock ceiling cached when the line was last touched
    pub inventory: u32,
    pub discount_percentage: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl CartItem {
    fn from_resolved(resolved: ResolvedPrice) -> Self {
        let excl = price_excluding_tax(resolved.final_price, resolved.tax_rate);
        Self {
            id: CartItemId::new(&resolved.product_id, &resolved.variant_id),
            product_id: resolved.product_id,
            variant_id: resolved.variant_id,
            name: resolved.name,
            price: resolved.price,
            final_price: resolved.final_price,
            quantity: 1,
            total: resolved.final_price,
            price_excluding_tax: excl,
            tax_amount: tax_amount(resolved.final_price, excl),
            tax_rate: resolved.tax_rate,
            inventory: resolved.inventory,
            discount_percentage: resolved.discount_percentage,
            sku: resolved.sku,
            images: resolved.images,
        }
    }

    fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.total = self.final_price * Decimal::from(quantity);
    }
}

/// How a manual order discount is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    #[default]
    Percentage,
    Fixed,
}

/// Operator-entered order discount
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualDiscount {
    pub amount: Decimal,
    pub kind: DiscountType,
}

impl ManualDiscount {
    /// Percentages must lie in 0..=100, fixed amounts must be non-negative.
    pub fn new(amount: Decimal, kind: DiscountType) -> PosResult<Self> {
        if amount < Decimal::ZERO {
            return Err(PosError::InvalidDiscount(format!(
                "discount must not be negative, got {amount}"
            )));
        }
        if kind == DiscountType::Percentage && amount > Decimal::ONE_HUNDRED {
            return Err(PosError::InvalidDiscount(format!(
                "percentage must be between 0 and 100, got {amount}"
            )));
        }
        Ok(Self { amount, kind })
    }

    pub fn none() -> Self {
        Self::default()
    }

    /// Amount taken off `base` (the subtotal after the discount code).
    pub fn amount_for(&self, base: Decimal) -> Decimal {
        if self.amount <= Decimal::ZERO || base <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        match self.kind {
            DiscountType::Percentage => percent_of(base, self.amount),
            DiscountType::Fixed => self.amount.min(base),
        }
    }
}

/// Aggregate pricing for the whole cart
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub item_count: u32,
    pub subtotal_including_tax: Decimal,
    pub subtotal_excluding_tax: Decimal,
    pub original_tax: Decimal,
    pub discount_code_amount: Decimal,
    pub subtotal_after_code: Decimal,
    pub manual_discount_amount: Decimal,
    pub total_discount: Decimal,
    /// Share of the subtotal removed by order-level discounts, to the cent
    pub discount_ratio: Decimal,
    pub discounted_subtotal_excluding_tax: Decimal,
    pub discounted_tax: Decimal,
    pub total: Decimal,
}

/// The cart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    discount_code: Option<AppliedDiscountCode>,
    #[serde(default)]
    manual_discount: ManualDiscount,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, id: &CartItemId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn discount_code(&self) -> Option<&AppliedDiscountCode> {
        self.discount_code.as_ref()
    }

    pub fn manual_discount(&self) -> ManualDiscount {
        self.manual_discount
    }

    /// Add one unit of a variant (the first one when `variant_id` is None).
    pub fn add_item(
        &mut self,
        product: &Product,
        variant_id: Option<&str>,
        now: DateTime<Utc>,
        channel: OrderSource,
    ) -> PosResult<CartItemId> {
        let resolved = resolve_price(product, variant_id, now, channel)?;
        if resolved.inventory == 0 {
            return Err(PosError::OutOfStock {
                name: resolved.name,
            });
        }

        let id = CartItemId::new(&resolved.product_id, &resolved.variant_id);
        if let Some(item) = self.items.iter_mut().find(|i| i.id == id) {
            let quantity = item.quantity + 1;
            if quantity > resolved.inventory {
                return Err(PosError::InsufficientStock {
                    name: item.name.clone(),
                    available: resolved.inventory,
                });
            }
            item.inventory = resolved.inventory;
            item.set_quantity(quantity);
        } else {
            self.items.push(CartItem::from_resolved(resolved));
        }
        Ok(id)
    }

    /// Set a line's quantity; zero or below removes the line.
    pub fn update_quantity(&mut self, id: &CartItemId, quantity: i64) -> PosResult<()> {
        if quantity <= 0 {
            return self.remove_item(id);
        }
        let item = self
            .items
            .iter_mut()
            .find(|i| &i.id == id)
            .ok_or_else(|| PosError::CartItemNotFound(id.to_string()))?;
        if quantity > i64::from(item.inventory) {
            return Err(PosError::InsufficientStock {
                name: item.name.clone(),
                available: item.inventory,
            });
        }
        item.set_quantity(u32::try_from(quantity).unwrap_or(item.inventory));
        Ok(())
    }

    pub fn remove_item(&mut self, id: &CartItemId) -> PosResult<()> {
        let before = self.items.len();
        self.items.retain(|i| &i.id != id);
        if self.items.len() == before {
            return Err(PosError::CartItemNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Replace any previously applied code.
    pub fn apply_discount_code(&mut self, code: AppliedDiscountCode) {
        self.discount_code = Some(code);
    }

    pub fn remove_discount_code(&mut self) -> Option<AppliedDiscountCode> {
        self.discount_code.take()
    }

    /// Re-derive the applied code's amount from the current subtotal.
    pub fn refresh_discount_code(&mut self) {
        let subtotal = self.subtotal_including_tax();
        if let Some(code) = self.discount_code.as_mut() {
            code.refresh(subtotal);
        }
    }

    pub fn set_manual_discount(&mut self, discount: ManualDiscount) {
        self.manual_discount = discount;
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.discount_code = None;
        self.manual_discount = ManualDiscount::none();
    }

    /// Rounded tax-inclusive subtotal.
    pub fn subtotal_including_tax(&self) -> Decimal {
        round_money(
            self.items
                .iter()
                .map(|i| i.final_price * Decimal::from(i.quantity))
                .sum(),
        )
    }

    /// Lines in the shape the code validator expects.
    pub fn code_lines(&self) -> Vec<CodeCartLine> {
        self.items
            .iter()
            .map(|i| CodeCartLine {
                product_id: i.product_id.clone(),
                variant_id: i.variant_id.clone(),
                quantity: i.quantity,
                price: i.final_price,
            })
            .collect()
    }

    pub fn compute_totals(&self) -> CartTotals {
        if self.items.is_empty() {
            return CartTotals::default();
        }

        let sum = |f: fn(&CartItem) -> Decimal| -> Decimal {
            round_money(
                self.items
                    .iter()
                    .map(|i| f(i) * Decimal::from(i.quantity))
                    .sum(),
            )
        };
        let subtotal_including_tax = sum(|i| i.final_price);
        let subtotal_excluding_tax = sum(|i| i.price_excluding_tax);
        let original_tax = sum(|i| i.tax_amount);

        let discount_code_amount = self
            .discount_code
            .as_ref()
            .map(|c| c.discount_amount)
            .unwrap_or(Decimal::ZERO);
        let subtotal_after_code = subtotal_including_tax - discount_code_amount;
        let manual_discount_amount =
            round_money(self.manual_discount.amount_for(subtotal_after_code));
        let total_discount = discount_code_amount + manual_discount_amount;

        let discount_ratio = if subtotal_including_tax.is_zero() {
            Decimal::ZERO
        } else {
            total_discount / subtotal_including_tax
        };
        let keep = Decimal::ONE - discount_ratio;

        CartTotals {
            item_count: self.items.iter().map(|i| i.quantity).sum(),
            subtotal_including_tax,
            subtotal_excluding_tax,
            original_tax,
            discount_code_amount: round_money(discount_code_amount),
            subtotal_after_code: round_money(subtotal_after_code),
            manual_discount_amount,
            total_discount: round_money(total_discount),
            discount_ratio: round_money(discount_ratio),
            discounted_subtotal_excluding_tax: round_money(subtotal_excluding_tax * keep),
            discounted_tax: round_money(original_tax * keep),
            total: round_money(subtotal_including_tax - total_discount),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductVariant;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn hoodie(inventory: u32) -> Product {
        Product::new("p1", "Hoodie")
            .with_variant(ProductVariant::new("v1", "Default", d("100")).with_inventory(inventory))
    }

    fn add(cart: &mut Cart, product: &Product) -> PosResult<CartItemId> {
        cart.add_item(product, None, Utc::now(), OrderSource::InStore)
    }

    fn code(amount: &str) -> AppliedDiscountCode {
        AppliedDiscountCode {
            id: "dc1".into(),
            code: "SAVE10".into(),
            percentage: d("10"),
            title: None,
            description: None,
            discount_amount: d(amount),
        }
    }

    #[test]
    fn test_add_item_merges_lines() {
        let mut cart = Cart::new();
        let product = hoodie(5);
        let first = add(&mut cart, &product).unwrap();
        let second = add(&mut cart, &product).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str(), "p1:v1");
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.items()[0].total, d("200"));
    }

    #[test]
    fn test_add_item_out_of_stock() {
        let mut cart = Cart::new();
        let err = add(&mut cart, &hoodie(0)).unwrap_err();
        assert!(matches!(err, PosError::OutOfStock { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_item_respects_inventory() {
        let mut cart = Cart::new();
        let product = hoodie(1);
        add(&mut cart, &product).unwrap();
        let err = add(&mut cart, &product).unwrap_err();
        assert!(matches!(err, PosError::InsufficientStock { available: 1, .. }));
        assert_eq!(cart.items()[0].quantity, 1);
    }

    #[test]
    fn test_update_quantity() {
        let mut cart = Cart::new();
        let id = add(&mut cart, &hoodie(3)).unwrap();

        cart.update_quantity(&id, 3).unwrap();
        assert_eq!(cart.items()[0].total, d("300"));

        let err = cart.update_quantity(&id, 4).unwrap_err();
        assert!(matches!(err, PosError::InsufficientStock { .. }));
        assert_eq!(cart.items()[0].quantity, 3);

        cart.update_quantity(&id, 0).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_remove_unknown_item() {
        let mut cart = Cart::new();
        let err = cart.remove_item(&CartItemId::new("x", "y")).unwrap_err();
        assert!(matches!(err, PosError::CartItemNotFound(_)));
    }

    #[test]
    fn test_empty_cart_totals() {
        assert_eq!(Cart::new().compute_totals(), CartTotals::default());
    }

    #[test]
    fn test_totals_single_line() {
        let mut cart = Cart::new();
        let id = add(&mut cart, &hoodie(5)).unwrap();
        cart.update_quantity(&id, 2).unwrap();

        let totals = cart.compute_totals();
        assert_eq!(totals.item_count, 2);
        assert_eq!(totals.subtotal_including_tax, d("200"));
        assert_eq!(totals.subtotal_excluding_tax, d("168.07"));
        assert_eq!(totals.original_tax, d("31.93"));
        assert_eq!(totals.total_discount, Decimal::ZERO);
        assert_eq!(totals.total, d("200"));
    }

    #[test]
    fn test_totals_with_code_and_manual_percentage() {
        let mut cart = Cart::new();
        let id = add(&mut cart, &hoodie(5)).unwrap();
        cart.update_quantity(&id, 2).unwrap();
        cart.apply_discount_code(code("20"));
        cart.set_manual_discount(ManualDiscount::new(d("10"), DiscountType::Percentage).unwrap());

        let totals = cart.compute_totals();
        assert_eq!(totals.subtotal_after_code, d("180"));
        assert_eq!(totals.manual_discount_amount, d("18"));
        assert_eq!(totals.total_discount, d("38"));
        assert_eq!(totals.total, d("162"));
        assert_eq!(totals.discount_ratio, d("0.19"));
        assert_eq!(totals.discounted_subtotal_excluding_tax, d("136.14"));
        assert_eq!(totals.discounted_tax, d("25.86"));
    }

    #[test]
    fn test_reduced_tax_rate_line() {
        let mug = Product::new("p2", "Mug").with_variant(
            ProductVariant::new("v1", "Default", d("10.70"))
                .with_tax_rate(d("7"))
                .with_inventory(5),
        );
        let mut cart = Cart::new();
        add(&mut cart, &mug).unwrap();

        let totals = cart.compute_totals();
        assert_eq!(totals.subtotal_including_tax, d("10.70"));
        assert_eq!(totals.subtotal_excluding_tax, d("10.00"));
        assert_eq!(totals.original_tax, d("0.70"));
    }

    #[test]
    fn test_discount_ratio_reported_to_cents() {
        let mut cart = Cart::new();
        let id = add(&mut cart, &hoodie(5)).unwrap();
        cart.update_quantity(&id, 3).unwrap();
        cart.set_manual_discount(ManualDiscount::new(d("25"), DiscountType::Fixed).unwrap());

        let totals = cart.compute_totals();
        assert_eq!(totals.total, d("275"));
        assert_eq!(totals.discount_ratio, d("0.08"));
        // Split uses the exact 25/300 share, not the reported ratio.
        assert_eq!(
            totals.discounted_subtotal_excluding_tax + totals.discounted_tax,
            d("275")
        );
    }

    #[test]
    fn test_fixed_manual_discount_is_capped() {
        let mut cart = Cart::new();
        add(&mut cart, &hoodie(5)).unwrap();
        cart.set_manual_discount(ManualDiscount::new(d("250"), DiscountType::Fixed).unwrap());

        let totals = cart.compute_totals();
        assert_eq!(totals.manual_discount_amount, d("100"));
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_manual_discount_range() {
        assert!(ManualDiscount::new(d("101"), DiscountType::Percentage).is_err());
        assert!(ManualDiscount::new(d("-1"), DiscountType::Fixed).is_err());
        assert!(ManualDiscount::new(d("101"), DiscountType::Fixed).is_ok());
    }

    #[test]
    fn test_totals_are_pure() {
        let mut cart = Cart::new();
        let id = add(&mut cart, &hoodie(5)).unwrap();
        cart.update_quantity(&id, 2).unwrap();
        cart.apply_discount_code(code("20"));

        let first = cart.compute_totals();
        assert_eq!(first, cart.compute_totals());

        cart.update_quantity(&id, 2).unwrap();
        assert_eq!(first, cart.compute_totals());
    }

    #[test]
    fn test_refresh_discount_code() {
        let mut cart = Cart::new();
        let id = add(&mut cart, &hoodie(5)).unwrap();
        cart.apply_discount_code(code("10"));
        cart.update_quantity(&id, 3).unwrap();
        cart.refresh_discount_code();

        assert_eq!(cart.discount_code().map(|c| c.discount_amount), Some(d("30")));
    }

    #[test]
    fn test_clear_resets_discounts() {
        let mut cart = Cart::new();
        add(&mut cart, &hoodie(5)).unwrap();
        cart.apply_discount_code(code("10"));
        cart.set_manual_discount(ManualDiscount::new(d("5"), DiscountType::Fixed).unwrap());
        cart.clear();

        assert!(cart.is_empty());
        assert!(cart.discount_code().is_none());
        assert_eq!(cart.manual_discount(), ManualDiscount::none());
    }
}
