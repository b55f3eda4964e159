//! # Money and Tax
//!
//! Prices are tax-inclusive `Decimal`s. Intermediate products keep full
//! precision; only aggregates are rounded, to 2 places, half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places for monetary aggregates
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Tax rate applied when a variant does not specify one (19%)
pub const DEFAULT_TAX_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 0);

/// Round a monetary amount to 2 decimal places.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Tax-exclusive price: `price / (1 + rate/100)`.
///
/// Negative rates are treated as zero.
pub fn price_excluding_tax(price_including_tax: Decimal, tax_rate_percent: Decimal) -> Decimal {
    let rate = tax_rate_percent.max(Decimal::ZERO);
    price_including_tax / (Decimal::ONE + rate / Decimal::ONE_HUNDRED)
}

/// Tax contained in an inclusive price.
pub fn tax_amount(price_including_tax: Decimal, price_excluding_tax: Decimal) -> Decimal {
    price_including_tax - price_excluding_tax
}

/// `amount * percent / 100`, unrounded.
pub fn percent_of(amount: Decimal, percent: Decimal) -> Decimal {
    amount * percent / Decimal::ONE_HUNDRED
}

/// True when two amounts differ by at most [`MONEY_TOLERANCE`].
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= MONEY_TOLERANCE
}
