//! # Payment Ledger
//!
//! Tendered payments for the current order. There is always at least one
//! entry. The single CASH entry, when present, absorbs whatever the other
//! methods do not cover:
//!
//! ```text
//!   cash = max(0, round(order_total - Σ non-cash))
//! ```

use crate::error::{PosError, PosResult};
use crate::money::{round_money, within_tolerance};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Tender type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethodType {
    Cash,
    CreditCard,
    Check,
}

impl PaymentMethodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodType::Cash => "CASH",
            PaymentMethodType::CreditCard => "CREDIT_CARD",
            PaymentMethodType::Check => "CHECK",
        }
    }
}

impl std::fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields recorded for a check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckDetails {
    #[serde(default)]
    pub check_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Method-specific fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentDetails {
    #[serde(rename_all = "camelCase")]
    Cash {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cash_given: Option<Decimal>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cash_change: Option<Decimal>,
    },
    CreditCard,
    Check(CheckDetails),
}

impl PaymentDetails {
    pub fn method(&self) -> PaymentMethodType {
        match self {
            PaymentDetails::Cash { .. } => PaymentMethodType::Cash,
            PaymentDetails::CreditCard => PaymentMethodType::CreditCard,
            PaymentDetails::Check(_) => PaymentMethodType::Check,
        }
    }

    fn empty(method: PaymentMethodType) -> Self {
        match method {
            PaymentMethodType::Cash => PaymentDetails::Cash {
                cash_given: None,
                cash_change: None,
            },
            PaymentMethodType::CreditCard => PaymentDetails::CreditCard,
            PaymentMethodType::Check => PaymentDetails::Check(CheckDetails::default()),
        }
    }
}

/// One tendered payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodEntry {
    pub id: String,
    pub amount: Decimal,
    #[serde(flatten)]
    pub details: PaymentDetails,
}

impl PaymentMethodEntry {
    fn new(method: PaymentMethodType, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            amount,
            details: PaymentDetails::empty(method),
        }
    }

    pub fn method(&self) -> PaymentMethodType {
        self.details.method()
    }

    pub fn is_cash(&self) -> bool {
        self.method() == PaymentMethodType::Cash
    }

    /// Recompute change, or clear cash fields when nothing is owed in cash.
    fn settle_cash(&mut self) {
        let amount = self.amount;
        if let PaymentDetails::Cash {
            cash_given,
            cash_change,
        } = &mut self.details
        {
            if amount.is_zero() {
                *cash_given = None;
                *cash_change = None;
            } else if let Some(given) = *cash_given {
                *cash_change = Some(round_money((given - amount).max(Decimal::ZERO)));
            }
        }
    }
}

/// Why the tendered payments cannot settle the order
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentValidationError {
    #[error("payments total {paid} but the order total is {total}")]
    SumMismatch { paid: Decimal, total: Decimal },
    #[error("{method} payment amount must be greater than zero")]
    NonPositiveAmount { method: PaymentMethodType },
    #[error("cash given {given} does not cover {amount}")]
    InsufficientCash { given: Decimal, amount: Decimal },
    #[error("check number is required")]
    MissingCheckNumber,
    #[error("check date is required")]
    MissingCheckDate,
    #[error("check date {0} is in the past")]
    CheckDateInPast(NaiveDate),
}

/// Order payment state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Awaiting check clearance
    Pending,
    Completed,
}

/// The set of tendered payments for one order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLedger {
    entries: Vec<PaymentMethodEntry>,
    order_total: Decimal,
}

impl Default for PaymentLedger {
    fn default() -> Self {
        Self::new(Decimal::ZERO)
    }
}

impl PaymentLedger {
    /// A ledger holding a single cash entry for the whole total.
    pub fn new(order_total: Decimal) -> Self {
        let order_total = round_money(order_total);
        Self {
            entries: vec![PaymentMethodEntry::new(PaymentMethodType::Cash, order_total)],
            order_total,
        }
    }

    pub fn entries(&self) -> &[PaymentMethodEntry] {
        &self.entries
    }

    pub fn entry(&self, id: &str) -> Option<&PaymentMethodEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn cash(&self) -> Option<&PaymentMethodEntry> {
        self.entries.iter().find(|e| e.is_cash())
    }

    pub fn order_total(&self) -> Decimal {
        self.order_total
    }

    pub fn total_paid(&self) -> Decimal {
        self.entries.iter().map(|e| e.amount).sum()
    }

    /// Unfunded part of the order, never negative.
    pub fn remaining(&self) -> Decimal {
        round_money((self.order_total - self.total_paid()).max(Decimal::ZERO))
    }

    pub fn has_check(&self) -> bool {
        self.entries.iter().any(|e| e.method() == PaymentMethodType::Check)
    }

    /// Checks need clearance, so their presence leaves the order pending.
    pub fn payment_status(&self) -> PaymentStatus {
        if self.has_check() {
            PaymentStatus::Pending
        } else {
            PaymentStatus::Completed
        }
    }

    /// Retarget the order total and rebalance cash.
    pub fn set_order_total(&mut self, total: Decimal) {
        self.order_total = round_money(total);
        self.rebalance_cash();
    }

    /// Back to a single cash entry for `order_total`.
    pub fn reset(&mut self, order_total: Decimal) {
        *self = Self::new(order_total);
    }

    pub fn add_payment_method(&mut self, method: PaymentMethodType) -> PosResult<String> {
        if method != PaymentMethodType::Check && self.entries.iter().any(|e| e.method() == method) {
            return Err(PosError::PaymentMethodRejected(format!(
                "{method} payment already added"
            )));
        }
        let amount = match method {
            PaymentMethodType::Check => Decimal::ZERO,
            _ => self.remaining(),
        };
        let entry = PaymentMethodEntry::new(method, amount);
        let id = entry.id.clone();
        self.entries.push(entry);
        self.rebalance_cash();
        debug!(method = %method, %amount, "payment method added");
        Ok(id)
    }

    /// Set an entry's amount. Non-cash changes rebalance the cash entry.
    pub fn update_amount(&mut self, id: &str, amount: Decimal) -> PosResult<()> {
        if amount < Decimal::ZERO {
            return Err(PosError::InvalidRequest(format!(
                "payment amount must not be negative, got {amount}"
            )));
        }
        let entry = self.entry_mut(id)?;
        entry.amount = round_money(amount);
        if entry.is_cash() {
            entry.settle_cash();
        } else {
            self.rebalance_cash();
        }
        Ok(())
    }

    /// Record the cash handed over and compute change.
    pub fn set_cash_given(&mut self, given: Decimal) -> PosResult<()> {
        if given < Decimal::ZERO {
            return Err(PosError::InvalidRequest(format!(
                "cash given must not be negative, got {given}"
            )));
        }
        let cash = self
            .entries
            .iter_mut()
            .find(|e| e.is_cash())
            .ok_or_else(|| PosError::PaymentMethodNotFound(PaymentMethodType::Cash.to_string()))?;
        if let PaymentDetails::Cash { cash_given, .. } = &mut cash.details {
            *cash_given = Some(round_money(given));
        }
        cash.settle_cash();
        Ok(())
    }

    pub fn update_check(&mut self, id: &str, details: CheckDetails) -> PosResult<()> {
        let entry = self.entry_mut(id)?;
        match &mut entry.details {
            PaymentDetails::Check(current) => {
                *current = details;
                Ok(())
            }
            _ => Err(PosError::InvalidRequest(format!(
                "payment {id} is not a check"
            ))),
        }
    }

    pub fn remove_payment_method(&mut self, id: &str) -> PosResult<()> {
        let index = self
            .entries
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| PosError::PaymentMethodNotFound(id.to_string()))?;
        if self.entries.len() == 1 {
            return Err(PosError::PaymentMethodRejected(
                "At least one payment method is required".to_string(),
            ));
        }
        self.entries.remove(index);
        self.rebalance_cash();
        Ok(())
    }

    /// Check the payments against the order total and per-method rules.
    pub fn validate(&self, today: NaiveDate) -> Result<(), PaymentValidationError> {
        let paid = self.total_paid();
        if !within_tolerance(paid, self.order_total) {
            return Err(PaymentValidationError::SumMismatch {
                paid: round_money(paid),
                total: self.order_total,
            });
        }

        for entry in &self.entries {
            if entry.is_cash() && entry.amount.is_zero() {
                continue;
            }
            if entry.amount <= Decimal::ZERO {
                return Err(PaymentValidationError::NonPositiveAmount {
                    method: entry.method(),
                });
            }
            match &entry.details {
                PaymentDetails::Cash { cash_given, .. } => {
                    let given = cash_given.unwrap_or(Decimal::ZERO);
                    if given < entry.amount {
                        return Err(PaymentValidationError::InsufficientCash {
                            given,
                            amount: entry.amount,
                        });
                    }
                }
                PaymentDetails::Check(check) => {
                    if check.check_number.trim().is_empty() {
                        return Err(PaymentValidationError::MissingCheckNumber);
                    }
                    let date = check.check_date.ok_or(PaymentValidationError::MissingCheckDate)?;
                    if date < today {
                        return Err(PaymentValidationError::CheckDateInPast(date));
                    }
                }
                PaymentDetails::CreditCard => {}
            }
        }
        Ok(())
    }

    pub fn is_valid(&self, today: NaiveDate) -> bool {
        self.validate(today).is_ok()
    }

    fn entry_mut(&mut self, id: &str) -> PosResult<&mut PaymentMethodEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| PosError::PaymentMethodNotFound(id.to_string()))
    }

    fn rebalance_cash(&mut self) {
        let non_cash: Decimal = self
            .entries
            .iter()
            .filter(|e| !e.is_cash())
            .map(|e| e.amount)
            .sum();
        let target = round_money((self.order_total - non_cash).max(Decimal::ZERO));
        if let Some(cash) = self.entries.iter_mut().find(|e| e.is_cash()) {
            cash.amount = target;
            cash.settle_cash();
        }
    }
}
