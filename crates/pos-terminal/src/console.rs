//! # Operator Console
//!
//! Line-oriented front end over a [`CheckoutSession`]. Every command either
//! prints the updated checkout or an error; failures never end the loop.

use crate::command::{Command, HELP};
use crate::state::AppState;
use anyhow::{anyhow, Context};
use pos_core::{
    CheckDetails, CheckoutSession, Customer, PaymentDetails, PaymentLedger, Product,
    ProductQuery,
};
use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// What the console prints after a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub output: String,
    pub quit: bool,
}

impl Reply {
    fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            quit: false,
        }
    }
}

pub struct Console {
    state: AppState,
}

impl Console {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Read commands from stdin until `quit` or end of input.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        loop {
            stdout.write_all(b"pos> ").await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let reply = match Command::parse(&line) {
                Ok(command) => self.execute(command).await,
                Err(err) => Err(err.into()),
            };

            match reply {
                Ok(reply) => {
                    println!("{}", reply.output);
                    if reply.quit {
                        break;
                    }
                }
                Err(err) => {
                    warn!("command failed: {:#}", err);
                    println!("error: {:#}", err);
                }
            }
        }
        Ok(())
    }

    pub async fn execute(&mut self, command: Command) -> anyhow::Result<Reply> {
        debug!(?command, "executing");
        let shop = self.state.shop.clone();
        let session = &mut self.state.session;

        let reply = match command {
            Command::Search(text) => {
                let products = session
                    .search_products(shop.as_ref(), ProductQuery::Text(text))
                    .await?;
                Reply::text(render_products(products))
            }
            Command::Scan(barcode) => {
                let products = session
                    .search_products(shop.as_ref(), ProductQuery::Barcode(barcode.clone()))
                    .await?
                    .to_vec();
                match products.as_slice() {
                    [product] => {
                        let variant_id = product
                            .variant_by_barcode(barcode.trim())
                            .map(|v| v.id.clone());
                        session.add_product(product, variant_id.as_deref())?;
                        Reply::text(render_checkout(session))
                    }
                    _ => Reply::text(render_products(&products)),
                }
            }
            Command::Add { index, variant_id } => {
                let product = session
                    .product_results()
                    .get(index - 1)
                    .cloned()
                    .ok_or_else(|| anyhow!("no search result #{index}"))?;
                session.add_product(&product, variant_id.as_deref())?;
                Reply::text(render_checkout(session))
            }
            Command::Quantity { line, quantity } => {
                let id = session
                    .cart()
                    .items()
                    .get(line - 1)
                    .map(|item| item.id.clone())
                    .ok_or_else(|| anyhow!("no cart line #{line}"))?;
                session.update_quantity(&id, quantity)?;
                Reply::text(render_checkout(session))
            }
            Command::Remove { line } => {
                let id = session
                    .cart()
                    .items()
                    .get(line - 1)
                    .map(|item| item.id.clone())
                    .ok_or_else(|| anyhow!("no cart line #{line}"))?;
                session.remove_item(&id)?;
                Reply::text(render_checkout(session))
            }
            Command::FindCustomer(query) => {
                let customers = session.search_customers(shop.as_ref(), &query).await?;
                Reply::text(render_customers(customers))
            }
            Command::PickCustomer(index) => {
                let customer = session
                    .customer_results()
                    .get(index - 1)
                    .cloned()
                    .ok_or_else(|| anyhow!("no customer result #{index}"))?;
                let name = customer.display_name();
                session.set_customer(Some(customer));
                Reply::text(format!("customer: {name}"))
            }
            Command::ApplyCode(code) => {
                let applied = session
                    .apply_discount_code(shop.as_ref(), &code)
                    .await
                    .with_context(|| format!("code {code}"))?;
                let line = format!("applied {}: -{:.2}", applied.code, applied.discount_amount);
                Reply::text(format!("{line}\n{}", render_checkout(session)))
            }
            Command::RemoveCode => {
                session
                    .remove_discount_code()?
                    .ok_or_else(|| anyhow!("no discount code applied"))?;
                Reply::text(render_checkout(session))
            }
            Command::Discount { kind, amount } => {
                session.set_manual_discount(amount, kind)?;
                Reply::text(render_checkout(session))
            }
            Command::AddPayment(method) => {
                session.add_payment_method(method)?;
                Reply::text(render_payments(session.payments()))
            }
            Command::PaymentAmount { payment, amount } => {
                let id = payment_id(session, payment)?;
                session.update_payment_amount(&id, amount)?;
                Reply::text(render_payments(session.payments()))
            }
            Command::CashGiven(amount) => {
                session.set_cash_given(amount)?;
                Reply::text(render_payments(session.payments()))
            }
            Command::Check {
                payment,
                number,
                date,
                bank,
            } => {
                let id = payment_id(session, payment)?;
                session.update_check(
                    &id,
                    CheckDetails {
                        check_number: number,
                        bank_name: bank,
                        check_date: Some(date),
                        notes: None,
                    },
                )?;
                Reply::text(render_payments(session.payments()))
            }
            Command::RemovePayment { payment } => {
                let id = payment_id(session, payment)?;
                session.remove_payment_method(&id)?;
                Reply::text(render_payments(session.payments()))
            }
            Command::Note(text) => {
                session.set_notes(text);
                Reply::text("notes updated")
            }
            Command::Show => Reply::text(render_checkout(session)),
            Command::Submit => {
                let confirmation = session.submit_order(shop.as_ref()).await?;
                Reply::text(format!(
                    "order {} created ({})",
                    confirmation.order_number, confirmation.id
                ))
            }
            Command::Clear => {
                session.clear()?;
                Reply::text("checkout cleared")
            }
            Command::Help => Reply::text(HELP),
            Command::Quit => Reply {
                output: "bye".to_string(),
                quit: true,
            },
        };
        Ok(reply)
    }
}

fn payment_id(session: &CheckoutSession, payment: usize) -> anyhow::Result<String> {
    session
        .payments()
        .entries()
        .get(payment - 1)
        .map(|entry| entry.id.clone())
        .ok_or_else(|| anyhow!("no payment #{payment}"))
}

// =============================================================================
// Rendering
// =============================================================================

fn render_products(products: &[Product]) -> String {
    if products.is_empty() {
        return "no products found".to_string();
    }
    let mut out = String::new();
    for (i, product) in products.iter().enumerate() {
        let _ = write!(out, "{:>3}. {}", i + 1, product.name);
        if product.variants.len() == 1 {
            if let Some(variant) = product.first_variant() {
                let _ = write!(out, "  {:.2}  ({} in stock)", variant.price, variant.inventory);
            }
            out.push('\n');
            continue;
        }
        out.push('\n');
        for variant in &product.variants {
            let _ = writeln!(
                out,
                "       - {} [{}]  {:.2}  ({} in stock)",
                variant.name, variant.id, variant.price, variant.inventory
            );
        }
    }
    out.trim_end().to_string()
}

fn render_customers(customers: &[Customer]) -> String {
    if customers.is_empty() {
        return "no customers found".to_string();
    }
    let mut out = String::new();
    for (i, customer) in customers.iter().enumerate() {
        let _ = write!(out, "{:>3}. {}", i + 1, customer.display_name());
        if let Some(email) = &customer.email {
            let _ = write!(out, " <{email}>");
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

fn render_payments(ledger: &PaymentLedger) -> String {
    let mut out = String::new();
    for (i, entry) in ledger.entries().iter().enumerate() {
        let _ = write!(out, "{:>3}. {:<12} {:>10.2}", i + 1, entry.method().as_str(), entry.amount);
        match &entry.details {
            PaymentDetails::Cash {
                cash_given: Some(given),
                cash_change,
            } => {
                let change = cash_change.unwrap_or_default();
                let _ = write!(out, "  given {given:.2} change {change:.2}");
            }
            PaymentDetails::Check(check) => {
                let _ = write!(out, "  #{}", check.check_number);
                if let Some(date) = check.check_date {
                    let _ = write!(out, " {date}");
                }
                if let Some(bank) = &check.bank_name {
                    let _ = write!(out, " {bank}");
                }
            }
            _ => {}
        }
        out.push('\n');
    }
    let _ = write!(
        out,
        "     paid {:.2} of {:.2}, remaining {:.2}",
        ledger.total_paid(),
        ledger.order_total(),
        ledger.remaining()
    );
    out
}

fn render_checkout(session: &CheckoutSession) -> String {
    let cart = session.cart();
    if cart.is_empty() {
        return "cart is empty".to_string();
    }

    let mut out = String::new();
    for (i, item) in cart.items().iter().enumerate() {
        let _ = write!(
            out,
            "{:>3}. {:<32} {:>3} x {:>8.2} = {:>9.2}",
            i + 1,
            item.name,
            item.quantity,
            item.final_price,
            item.total
        );
        if !item.discount_percentage.is_zero() {
            let _ = write!(out, "  (-{}%, was {:.2})", item.discount_percentage, item.price);
        }
        out.push('\n');
    }

    let totals = session.totals();
    let _ = writeln!(out, "     subtotal           {:>10.2}", totals.subtotal_including_tax);
    if let Some(code) = cart.discount_code() {
        let _ = writeln!(out, "     code {:<13} {:>10.2}", code.code, -totals.discount_code_amount);
    }
    if !totals.manual_discount_amount.is_zero() {
        let _ = writeln!(out, "     order discount     {:>10.2}", -totals.manual_discount_amount);
    }
    let _ = writeln!(
        out,
        "     net {:.2} + tax {:.2}",
        totals.discounted_subtotal_excluding_tax, totals.discounted_tax
    );
    let _ = writeln!(out, "     TOTAL              {:>10.2}", totals.total);
    if let Some(customer) = session.customer() {
        let _ = writeln!(out, "     customer: {}", customer.display_name());
    }
    out.push_str(&render_payments(session.payments()));
    out
}
