//! # Catalog Types
//!
//! Product, discount and customer records supplied by the catalog service.
//! The engine treats all of them as read-only snapshots.

use crate::money::DEFAULT_TAX_RATE;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sales channel an order or discount belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSource {
    /// Web storefront
    Online,
    /// Point-of-sale terminal
    InStore,
}

impl OrderSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSource::Online => "ONLINE",
            OrderSource::InStore => "IN_STORE",
        }
    }
}

impl Default for OrderSource {
    fn default() -> Self {
        OrderSource::InStore
    }
}

impl std::fmt::Display for OrderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

fn default_tax_rate() -> Decimal {
    DEFAULT_TAX_RATE
}

/// What a [`Discount`] is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscountTarget {
    Product(String),
    Variant(String),
}

/// A percentage markdown on one product or one variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discount {
    pub id: String,

    /// Markdown percentage (1-100)
    pub percentage: Decimal,

    pub target: DiscountTarget,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub available_online: bool,

    #[serde(default = "default_true")]
    pub available_in_store: bool,
}

impl Discount {
    /// Enabled, inside `[start_date, end_date]` and offered on `channel`.
    pub fn is_active(&self, now: DateTime<Utc>, channel: OrderSource) -> bool {
        self.enabled
            && self.start_date <= now
            && now <= self.end_date
            && match channel {
                OrderSource::Online => self.available_online,
                OrderSource::InStore => self.available_in_store,
            }
    }

    /// Whether the discount targets this product or this variant.
    pub fn applies_to(&self, product_id: &str, variant_id: &str) -> bool {
        match &self.target {
            DiscountTarget::Product(id) => id == product_id,
            DiscountTarget::Variant(id) => id == variant_id,
        }
    }
}

/// A sellable unit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductVariant {
    pub id: String,

    pub name: String,

    /// Tax-inclusive unit price
    pub price: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Decimal>,

    /// Tax rate in percent (0-100)
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,

    #[serde(default)]
    pub inventory: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,

    /// Attribute name to value, e.g. `color = "Black"`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Precomputed by the catalog service
    #[serde(default)]
    pub has_discount: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_price: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<Decimal>,
}

impl ProductVariant {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            cost: None,
            tax_rate: DEFAULT_TAX_RATE,
            inventory: 0,
            sku: None,
            barcode: None,
            options: BTreeMap::new(),
            images: Vec::new(),
            has_discount: false,
            final_price: None,
            discount_percentage: None,
        }
    }

    /// Builder: set stock on hand
    pub fn with_inventory(mut self, inventory: u32) -> Self {
        self.inventory = inventory;
        self
    }

    /// Builder: set tax rate
    pub fn with_tax_rate(mut self, tax_rate: Decimal) -> Self {
        self.tax_rate = tax_rate;
        self
    }

    /// Builder: set barcode
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Builder: add an option value
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Builder: precomputed catalog discount
    pub fn with_precomputed_discount(mut self, final_price: Decimal, percentage: Decimal) -> Self {
        self.has_discount = true;
        self.final_price = Some(final_price);
        self.discount_percentage = Some(percentage);
        self
    }
}

/// Groups one or more variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    #[serde(default)]
    pub variants: Vec<ProductVariant>,

    /// Product-level discount flag
    #[serde(default)]
    pub has_discount: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percentage: Option<Decimal>,

    /// Discounts evaluated on the fly, in list order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub discounts: Vec<Discount>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            sku: None,
            barcode: None,
            category_ids: Vec::new(),
            images: Vec::new(),
            variants: Vec::new(),
            has_discount: false,
            discount_percentage: None,
            discounts: Vec::new(),
        }
    }

    /// Builder: add a variant
    pub fn with_variant(mut self, variant: ProductVariant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Builder: add a category membership
    pub fn with_category(mut self, category_id: impl Into<String>) -> Self {
        self.category_ids.push(category_id.into());
        self
    }

    /// Builder: product-level discount
    pub fn with_product_discount(mut self, percentage: Decimal) -> Self {
        self.has_discount = true;
        self.discount_percentage = Some(percentage);
        self
    }

    /// Builder: add a legacy discount
    pub fn with_discount(mut self, discount: Discount) -> Self {
        self.discounts.push(discount);
        self
    }

    pub fn first_variant(&self) -> Option<&ProductVariant> {
        self.variants.first()
    }

    pub fn variant(&self, variant_id: &str) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }

    pub fn in_category(&self, category_id: &str) -> bool {
        self.category_ids.iter().any(|c| c == category_id)
    }

    /// Variant carrying `barcode`, falling back to the first variant when
    /// the barcode is the product's own.
    pub fn variant_by_barcode(&self, barcode: &str) -> Option<&ProductVariant> {
        self.variants
            .iter()
            .find(|v| v.barcode.as_deref() == Some(barcode))
            .or_else(|| {
                if self.barcode.as_deref() == Some(barcode) {
                    self.first_variant()
                } else {
                    None
                }
            })
    }

    /// Case-insensitive match on name or sku of the product or any variant.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        let hit = |s: &str| s.to_lowercase().contains(&needle);
        hit(&self.name)
            || self.sku.as_deref().is_some_and(hit)
            || self
                .variants
                .iter()
                .any(|v| {
                    hit(&v.name)
                        || v.sku.as_deref().is_some_and(hit)
                        || v.options.values().any(|o| hit(o))
                })
    }
}

/// A shop customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,

    pub first_name: String,

    pub last_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Customer {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.display_name().to_lowercase().contains(&needle)
            || self
                .email
                .as_deref()
                .is_some_and(|e| e.to_lowercase().contains(&needle))
            || self.phone.as_deref().is_some_and(|p| p.contains(&needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn discount(enabled: bool, in_store: bool) -> Discount {
        let now = Utc::now();
        Discount {
            id: "disc".into(),
            percentage: d("10"),
            target: DiscountTarget::Product("p1".into()),
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            enabled,
            available_online: true,
            available_in_store: in_store,
        }
    }

    #[test]
    fn test_discount_activity() {
        let now = Utc::now();
        assert!(discount(true, true).is_active(now, OrderSource::InStore));
        assert!(!discount(false, true).is_active(now, OrderSource::InStore));
        assert!(!discount(true, false).is_active(now, OrderSource::InStore));
        assert!(discount(true, false).is_active(now, OrderSource::Online));
        assert!(!discount(true, true).is_active(now + Duration::days(2), OrderSource::InStore));
    }

    #[test]
    fn test_variant_defaults_from_json() {
        let json = r#"{"id":"v1","name":"Default","price":25.5}"#;
        let variant: ProductVariant = serde_json::from_str(json).unwrap();
        assert_eq!(variant.tax_rate, d("19"));
        assert_eq!(variant.price, d("25.5"));
        assert_eq!(variant.inventory, 0);
        assert!(!variant.has_discount);
    }

    #[test]
    fn test_product_lookup_helpers() {
        let product = Product::new("p1", "Hoodie")
            .with_category("apparel")
            .with_variant(ProductVariant::new("v1", "Black", d("40")).with_barcode("111"))
            .with_variant(ProductVariant::new("v2", "White", d("40")).with_barcode("222"));

        assert!(product.in_category("apparel"));
        assert_eq!(product.variant("v2").map(|v| v.name.as_str()), Some("White"));
        assert_eq!(product.variant_by_barcode("222").map(|v| v.id.as_str()), Some("v2"));
        assert!(product.variant_by_barcode("333").is_none());
        assert!(product.matches_text("hood"));
        assert!(product.matches_text("WHITE"));
        assert!(!product.matches_text("mug"));
    }

    #[test]
    fn test_text_search_covers_variant_options() {
        let product = Product::new("p1", "Hoodie").with_variant(
            ProductVariant::new("v1", "Default", d("40"))
                .with_option("size", "XL")
                .with_option("color", "Forest"),
        );

        assert!(product.matches_text("xl"));
        assert!(product.matches_text("forest"));
        assert!(!product.matches_text("size"));
    }

    #[test]
    fn test_discount_target_serde() {
        let target: DiscountTarget = serde_json::from_str(r#"{"variant":"v9"}"#).unwrap();
        assert_eq!(target, DiscountTarget::Variant("v9".into()));
    }
}
