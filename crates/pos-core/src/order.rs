//! # Order Types
//!
//! The order-creation payload sent to the order service and its result.
//! Line prices are never sent: the service recomputes them and uses
//! `expected_totals` only to cross-check the terminal's arithmetic.

use crate::cart::{Cart, CartTotals, DiscountType};
use crate::catalog::{Customer, OrderSource};
use crate::payment::{PaymentLedger, PaymentMethodEntry, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A line in an order request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub variant_id: String,
    pub quantity: u32,
}

/// Fulfilment state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    /// In-store sales are fulfilled on the spot
    Delivered,
    Cancelled,
}

/// `POST /orders` body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub items: Vec<OrderLine>,
    pub payment_methods: Vec<PaymentMethodEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
    pub order_discount: Decimal,
    pub order_discount_type: DiscountType,
    pub expected_totals: CartTotals,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub order_source: OrderSource,
}

impl OrderRequest {
    /// Package the current checkout state.
    pub fn from_checkout(
        cart: &Cart,
        payments: &PaymentLedger,
        customer: Option<&Customer>,
        notes: &str,
        channel: OrderSource,
    ) -> Self {
        let manual = cart.manual_discount();
        let notes = notes.trim();
        Self {
            customer_id: customer.map(|c| c.id.clone()),
            items: cart
                .items()
                .iter()
                .map(|i| OrderLine {
                    product_id: i.product_id.clone(),
                    variant_id: i.variant_id.clone(),
                    quantity: i.quantity,
                })
                .collect(),
            payment_methods: payments.entries().to_vec(),
            discount_code_id: cart.discount_code().map(|c| c.id.clone()),
            discount_code: cart.discount_code().map(|c| c.code.clone()),
            order_discount: manual.amount,
            order_discount_type: manual.kind,
            expected_totals: cart.compute_totals(),
            notes: if notes.is_empty() {
                None
            } else {
                Some(notes.to_string())
            },
            order_status: OrderStatus::Delivered,
            payment_status: payments.payment_status(),
            order_source: channel,
        }
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

/// Identity of a created order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    pub id: String,
    pub order_number: String,
}
