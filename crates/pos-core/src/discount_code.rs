//! # Discount Codes
//!
//! Code records, the validation call contract, and the targeting rules a
//! code must satisfy before it can be applied to an order.

use crate::catalog::OrderSource;
use crate::error::{PosError, PosResult};
use crate::money::{percent_of, round_money};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which carts or customers a code may be used for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiscountCodeScope {
    AllProducts,
    Category(String),
    #[serde(rename_all = "camelCase")]
    Products {
        #[serde(default)]
        product_ids: Vec<String>,
        #[serde(default)]
        variant_ids: Vec<String>,
    },
    Customers(Vec<String>),
}

impl Default for DiscountCodeScope {
    fn default() -> Self {
        DiscountCodeScope::AllProducts
    }
}

fn default_true() -> bool {
    true
}

/// A percentage markdown unlocked by typing a code
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: String,

    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Markdown percentage (1-100)
    pub percentage: Decimal,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_limit: Option<u32>,

    #[serde(default)]
    pub used_count: u32,

    #[serde(default = "default_true")]
    pub available_online: bool,

    #[serde(default = "default_true")]
    pub available_in_store: bool,

    #[serde(default)]
    pub scope: DiscountCodeScope,
}

/// Why a code was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscountCodeRejection {
    #[error("code not found")]
    NotFound,
    #[error("code is inactive")]
    Inactive,
    #[error("code is not valid yet")]
    NotStarted,
    #[error("code has expired")]
    Expired,
    #[error("usage limit reached")]
    UsageLimitReached,
    #[error("code is not available for {0} orders")]
    WrongChannel(OrderSource),
    #[error("code is not available for this customer")]
    CustomerNotEligible,
    #[error("code does not apply to any item in the cart")]
    NotApplicable,
    #[error("code has an invalid percentage")]
    InvalidPercentage,
    /// Reason reported verbatim by the service
    #[error("{0}")]
    Rejected(String),
}

/// Cart line as sent for code validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCartLine {
    pub product_id: String,
    pub variant_id: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// `POST /discount-codes/validate` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeValidationRequest {
    pub code: String,
    pub order_source: OrderSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub cart_items: Vec<CodeCartLine>,
    /// Tax-inclusive subtotal before any order-level discount
    pub subtotal: Decimal,
}

/// `POST /discount-codes/validate` response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeValidation {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<DiscountCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DiscountCodeValidation {
    pub fn accepted(code: DiscountCode, discount_amount: Decimal) -> Self {
        Self {
            valid: true,
            discount_code: Some(code),
            discount_amount: Some(discount_amount),
            error: None,
        }
    }

    pub fn rejected(reason: &DiscountCodeRejection) -> Self {
        Self {
            valid: false,
            discount_code: None,
            discount_amount: None,
            error: Some(reason.to_string()),
        }
    }

    /// Convert into the order-scoped code, or the rejection.
    pub fn into_applied(self) -> PosResult<AppliedDiscountCode> {
        match (self.valid, self.discount_code, self.discount_amount) {
            (true, Some(code), Some(amount)) => Ok(AppliedDiscountCode {
                id: code.id,
                code: code.code,
                percentage: code.percentage,
                title: code.title,
                description: code.description,
                discount_amount: round_money(amount),
            }),
            (true, _, _) => Err(PosError::Serialization(
                "valid discount code response without code or amount".to_string(),
            )),
            (false, _, _) => Err(PosError::DiscountCodeRejected(
                DiscountCodeRejection::Rejected(
                    self.error.unwrap_or_else(|| "invalid discount code".to_string()),
                ),
            )),
        }
    }
}

/// The code applied to the current order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedDiscountCode {
    pub id: String,
    pub code: String,
    pub percentage: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Absolute amount against the current subtotal
    pub discount_amount: Decimal,
}

impl AppliedDiscountCode {
    /// Re-derive the amount for a changed subtotal.
    pub fn refresh(&mut self, subtotal: Decimal) {
        self.discount_amount = round_money(percent_of(subtotal, self.percentage));
    }
}

impl DiscountCode {
    pub fn matches_code(&self, typed: &str) -> bool {
        self.code.eq_ignore_ascii_case(typed.trim())
    }

    /// Check every rule and return the discount amount for `request.subtotal`.
    ///
    /// `categories` yields the category ids of a product id.
    pub fn evaluate<'a, F>(
        &self,
        request: &DiscountCodeValidationRequest,
        now: DateTime<Utc>,
        categories: F,
    ) -> Result<Decimal, DiscountCodeRejection>
    where
        F: Fn(&str) -> &'a [String],
    {
        if !self.is_active {
            return Err(DiscountCodeRejection::Inactive);
        }
        if now < self.start_date {
            return Err(DiscountCodeRejection::NotStarted);
        }
        if now > self.end_date {
            return Err(DiscountCodeRejection::Expired);
        }
        if self.usage_limit.is_some_and(|limit| self.used_count >= limit) {
            return Err(DiscountCodeRejection::UsageLimitReached);
        }
        let channel_ok = match request.order_source {
            OrderSource::Online => self.available_online,
            OrderSource::InStore => self.available_in_store,
        };
        if !channel_ok {
            return Err(DiscountCodeRejection::WrongChannel(request.order_source));
        }
        if self.percentage <= Decimal::ZERO || self.percentage > Decimal::ONE_HUNDRED {
            return Err(DiscountCodeRejection::InvalidPercentage);
        }

        match &self.scope {
            DiscountCodeScope::AllProducts => {}
            DiscountCodeScope::Customers(allowed) => {
                let eligible = request
                    .customer_id
                    .as_ref()
                    .is_some_and(|id| allowed.contains(id));
                if !eligible {
                    return Err(DiscountCodeRejection::CustomerNotEligible);
                }
            }
            DiscountCodeScope::Category(category_id) => {
                let hit = request
                    .cart_items
                    .iter()
                    .any(|line| categories(&line.product_id).contains(category_id));
                if !hit {
                    return Err(DiscountCodeRejection::NotApplicable);
                }
            }
            DiscountCodeScope::Products {
                product_ids,
                variant_ids,
            } => {
                let hit = request.cart_items.iter().any(|line| {
                    product_ids.contains(&line.product_id) || variant_ids.contains(&line.variant_id)
                });
                if !hit {
                    return Err(DiscountCodeRejection::NotApplicable);
                }
            }
        }

        Ok(round_money(percent_of(request.subtotal, self.percentage)))
    }
}
