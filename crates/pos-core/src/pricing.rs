//! # Discount Resolver
//!
//! Turns a product (and optionally a chosen variant) into the effective
//! per-unit price the cart sells it at.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  1. variant.has_discount        (precomputed by the catalog) │
//! │  2. product.has_discount        (product-wide percentage)    │
//! │  3. product.discounts[..]       (first active match wins)    │
//! │  4. no discount                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use crate::catalog::{OrderSource, Product, ProductVariant};
use crate::error::{PosError, PosResult};
use crate::money::{percent_of, round_money};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which tier produced the final price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum DiscountSource {
    Variant,
    Product,
    Scheduled { discount_id: String },
    None,
}

/// Effective pricing for one variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrice {
    pub product_id: String,
    pub variant_id: String,
    pub name: String,
    /// Original tax-inclusive unit price
    pub price: Decimal,
    pub final_price: Decimal,
    pub has_discount: bool,
    pub discount_percentage: Decimal,
    pub discount_amount: Decimal,
    pub tax_rate: Decimal,
    pub inventory: u32,
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub images: Vec<String>,
    pub source: DiscountSource,
}

/// Resolve the selling price of `variant_id` (or the first variant) at `now`.
pub fn resolve_price(
    product: &Product,
    variant_id: Option<&str>,
    now: DateTime<Utc>,
    channel: OrderSource,
) -> PosResult<ResolvedPrice> {
    let variant = match variant_id {
        Some(id) => product.variant(id).ok_or_else(|| PosError::VariantNotFound {
            product_id: product.id.clone(),
            variant_id: id.to_string(),
        })?,
        None => product.first_variant().ok_or_else(|| PosError::NoVariants {
            product_id: product.id.clone(),
        })?,
    };

    let price = variant.price;
    let (final_price, percentage, source) = if let Some(tier) = variant_tier(variant) {
        tier
    } else if let Some(pct) = product.discount_percentage.filter(|_| product.has_discount) {
        (
            apply_percentage(price, pct),
            clamp_percentage(pct),
            DiscountSource::Product,
        )
    } else if let Some(discount) = product
        .discounts
        .iter()
        .find(|d| d.applies_to(&product.id, &variant.id) && d.is_active(now, channel))
    {
        (
            apply_percentage(price, discount.percentage),
            clamp_percentage(discount.percentage),
            DiscountSource::Scheduled {
                discount_id: discount.id.clone(),
            },
        )
    } else {
        (price, Decimal::ZERO, DiscountSource::None)
    };

    let has_discount = final_price < price;

    Ok(ResolvedPrice {
        product_id: product.id.clone(),
        variant_id: variant.id.clone(),
        name: display_name(product, variant),
        price,
        final_price,
        has_discount,
        discount_percentage: if has_discount { percentage } else { Decimal::ZERO },
        discount_amount: price - final_price,
        tax_rate: variant.tax_rate,
        inventory: variant.inventory,
        sku: variant.sku.clone().or_else(|| product.sku.clone()),
        barcode: variant.barcode.clone().or_else(|| product.barcode.clone()),
        images: if variant.images.is_empty() {
            product.images.clone()
        } else {
            variant.images.clone()
        },
        source: if has_discount { source } else { DiscountSource::None },
    })
}

fn variant_tier(variant: &ProductVariant) -> Option<(Decimal, Decimal, DiscountSource)> {
    if !variant.has_discount {
        return None;
    }
    let price = variant.price;
    match (variant.final_price, variant.discount_percentage) {
        (Some(final_price), pct) => {
            let final_price = final_price.clamp(Decimal::ZERO, price);
            let pct = pct.map(clamp_percentage).unwrap_or_else(|| {
                if price.is_zero() {
                    Decimal::ZERO
                } else {
                    round_money((price - final_price) / price * Decimal::ONE_HUNDRED)
                }
            });
            Some((final_price, pct, DiscountSource::Variant))
        }
        (None, Some(pct)) => Some((
            apply_percentage(price, pct),
            clamp_percentage(pct),
            DiscountSource::Variant,
        )),
        (None, None) => None,
    }
}

fn clamp_percentage(pct: Decimal) -> Decimal {
    pct.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

fn apply_percentage(price: Decimal, pct: Decimal) -> Decimal {
    price - percent_of(price, clamp_percentage(pct))
}

fn display_name(product: &Product, variant: &ProductVariant) -> String {
    if product.variants.len() > 1 {
        format!("{} - {}", product.name, variant.name)
    } else {
        product.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Discount, DiscountTarget};
    use chrono::Duration;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn scheduled(id: &str, pct: &str, target: DiscountTarget, now: DateTime<Utc>) -> Discount {
        Discount {
            id: id.into(),
            percentage: d(pct),
            target,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(1),
            enabled: true,
            available_online: true,
            available_in_store: true,
        }
    }

    #[test]
    fn test_first_variant_without_discount() {
        let product = Product::new("p1", "Mug")
            .with_variant(ProductVariant::new("v1", "Default", d("12.50")).with_inventory(4));

        let resolved = resolve_price(&product, None, Utc::now(), OrderSource::InStore).unwrap();
        assert_eq!(resolved.variant_id, "v1");
        assert_eq!(resolved.name, "Mug");
        assert_eq!(resolved.final_price, d("12.50"));
        assert!(!resolved.has_discount);
        assert_eq!(resolved.discount_percentage, Decimal::ZERO);
        assert_eq!(resolved.source, DiscountSource::None);
        assert_eq!(resolved.inventory, 4);
    }

    #[test]
    fn test_variant_discount_beats_scheduled_discount() {
        let now = Utc::now();
        let product = Product::new("p1", "Hoodie")
            .with_variant(
                ProductVariant::new("v1", "Black", d("100"))
                    .with_precomputed_discount(d("80"), d("20")),
            )
            .with_discount(scheduled("legacy", "50", DiscountTarget::Product("p1".into()), now));

        let resolved = resolve_price(&product, Some("v1"), now, OrderSource::InStore).unwrap();
        assert_eq!(resolved.final_price, d("80"));
        assert_eq!(resolved.discount_percentage, d("20"));
        assert_eq!(resolved.discount_amount, d("20"));
        assert_eq!(resolved.source, DiscountSource::Variant);
    }

    #[test]
    fn test_variant_percentage_derived_from_final_price() {
        let mut variant = ProductVariant::new("v1", "Black", d("80"));
        variant.has_discount = true;
        variant.final_price = Some(d("60"));
        let product = Product::new("p1", "Hoodie").with_variant(variant);

        let resolved = resolve_price(&product, None, Utc::now(), OrderSource::InStore).unwrap();
        assert_eq!(resolved.discount_percentage, d("25"));
    }

    #[test]
    fn test_product_discount() {
        let product = Product::new("p1", "Cap")
            .with_product_discount(d("15"))
            .with_variant(ProductVariant::new("v1", "Default", d("20")));

        let resolved = resolve_price(&product, None, Utc::now(), OrderSource::InStore).unwrap();
        assert_eq!(resolved.final_price, d("17"));
        assert_eq!(resolved.source, DiscountSource::Product);
    }

    #[test]
    fn test_first_active_scheduled_discount_wins() {
        let now = Utc::now();
        let mut disabled = scheduled("off", "90", DiscountTarget::Product("p1".into()), now);
        disabled.enabled = false;
        let mut online_only = scheduled("web", "70", DiscountTarget::Product("p1".into()), now);
        online_only.available_in_store = false;

        let product = Product::new("p1", "Tee")
            .with_variant(ProductVariant::new("v1", "S", d("50")))
            .with_variant(ProductVariant::new("v2", "M", d("50")))
            .with_discount(disabled)
            .with_discount(online_only)
            .with_discount(scheduled(
                "other-variant",
                "60",
                DiscountTarget::Variant("v2".into()),
                now,
            ))
            .with_discount(scheduled("first", "10", DiscountTarget::Product("p1".into()), now))
            .with_discount(scheduled("better", "40", DiscountTarget::Product("p1".into()), now));

        let resolved = resolve_price(&product, Some("v1"), now, OrderSource::InStore).unwrap();
        assert_eq!(resolved.final_price, d("45"));
        assert_eq!(resolved.name, "Tee - S");
        assert_eq!(
            resolved.source,
            DiscountSource::Scheduled {
                discount_id: "first".into()
            }
        );

        let online = resolve_price(&product, Some("v1"), now, OrderSource::Online).unwrap();
        assert_eq!(online.final_price, d("15"));
    }

    #[test]
    fn test_unknown_variant() {
        let product =
            Product::new("p1", "Tee").with_variant(ProductVariant::new("v1", "S", d("50")));
        let err =
            resolve_price(&product, Some("nope"), Utc::now(), OrderSource::InStore).unwrap_err();
        assert!(matches!(err, PosError::VariantNotFound { .. }));
    }

    #[test]
    fn test_product_without_variants() {
        let product = Product::new("p1", "Ghost");
        let err = resolve_price(&product, None, Utc::now(), OrderSource::InStore).unwrap_err();
        assert!(matches!(err, PosError::NoVariants { .. }));
    }
}
