//! # Console Commands
//!
//! One line typed by the operator parses into one [`Command`].
//! Indexes are 1-based, as printed by the console.

use chrono::NaiveDate;
use pos_core::{DiscountType, PaymentMethodType};
use rust_decimal::Decimal;
use thiserror::Error;

/// Parsed operator command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(String),
    Scan(String),
    Add { index: usize, variant_id: Option<String> },
    Quantity { line: usize, quantity: i64 },
    Remove { line: usize },
    FindCustomer(String),
    PickCustomer(usize),
    ApplyCode(String),
    RemoveCode,
    Discount { kind: DiscountType, amount: Decimal },
    AddPayment(PaymentMethodType),
    PaymentAmount { payment: usize, amount: Decimal },
    CashGiven(Decimal),
    Check {
        payment: usize,
        number: String,
        date: NaiveDate,
        bank: Option<String>,
    },
    RemovePayment { payment: usize },
    Note(String),
    Show,
    Submit,
    Clear,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("type a command, or `help`")]
    Empty,
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not a valid number")]
    InvalidNumber(String),
    #[error("`{0}` is not a valid amount")]
    InvalidAmount(String),
    #[error("`{0}` is not a date (expected yyyy-mm-dd)")]
    InvalidDate(String),
    #[error("unknown payment method `{0}` (cash, card, check)")]
    UnknownPaymentMethod(String),
    #[error("unknown discount type `{0}` (pct, fixed)")]
    UnknownDiscountType(String),
}

pub const HELP: &str = "\
  search <text>                  find products by name or sku
  scan <barcode>                 find a product by barcode
  add <n> [variant-id]           add result n to the cart
  qty <line> <n>                 set quantity (0 removes)
  rm <line>                      remove a cart line
  customer <query>               find customers (3+ characters)
  pick <n>                       attach customer n to the order
  code <CODE> | uncode           apply or remove a discount code
  discount <pct|fixed> <amount>  order discount (0 clears)
  pay <cash|card|check>          add a payment method
  amount <payment#> <amount>     set a payment amount
  given <amount>                 cash handed over by the customer
  check <payment#> <number> <yyyy-mm-dd> [bank]
  unpay <payment#>               remove a payment method
  note <text>                    order notes
  show | submit | clear | quit";

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let args: Vec<&str> = rest.split_whitespace().collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "" => return Err(CommandError::Empty),
            "search" => Command::Search(required(rest, "search <text>")?),
            "scan" => Command::Scan(required(rest, "scan <barcode>")?),
            "add" => match args.as_slice() {
                [index] => Command::Add {
                    index: index_arg(index)?,
                    variant_id: None,
                },
                [index, variant] => Command::Add {
                    index: index_arg(index)?,
                    variant_id: Some(variant.to_string()),
                },
                _ => return Err(CommandError::Usage("add <n> [variant-id]")),
            },
            "qty" => match args.as_slice() {
                [line, quantity] => Command::Quantity {
                    line: index_arg(line)?,
                    quantity: quantity
                        .parse()
                        .map_err(|_| CommandError::InvalidNumber(quantity.to_string()))?,
                },
                _ => return Err(CommandError::Usage("qty <line> <n>")),
            },
            "rm" => match args.as_slice() {
                [line] => Command::Remove {
                    line: index_arg(line)?,
                },
                _ => return Err(CommandError::Usage("rm <line>")),
            },
            "customer" => Command::FindCustomer(required(rest, "customer <query>")?),
            "pick" => match args.as_slice() {
                [n] => Command::PickCustomer(index_arg(n)?),
                _ => return Err(CommandError::Usage("pick <n>")),
            },
            "code" => match args.as_slice() {
                [code] => Command::ApplyCode(code.to_string()),
                _ => return Err(CommandError::Usage("code <CODE>")),
            },
            "uncode" => Command::RemoveCode,
            "discount" => match args.as_slice() {
                [kind, amount] => Command::Discount {
                    kind: discount_type(kind)?,
                    amount: amount_arg(amount)?,
                },
                _ => return Err(CommandError::Usage("discount <pct|fixed> <amount>")),
            },
            "pay" => match args.as_slice() {
                [method] => Command::AddPayment(payment_method(method)?),
                _ => return Err(CommandError::Usage("pay <cash|card|check>")),
            },
            "amount" => match args.as_slice() {
                [payment, amount] => Command::PaymentAmount {
                    payment: index_arg(payment)?,
                    amount: amount_arg(amount)?,
                },
                _ => return Err(CommandError::Usage("amount <payment#> <amount>")),
            },
            "given" => match args.as_slice() {
                [amount] => Command::CashGiven(amount_arg(amount)?),
                _ => return Err(CommandError::Usage("given <amount>")),
            },
            "check" => match args.as_slice() {
                [payment, number, date, bank @ ..] => Command::Check {
                    payment: index_arg(payment)?,
                    number: number.to_string(),
                    date: NaiveDate::parse_from_str(date, "%Y-%m-%d")
                        .map_err(|_| CommandError::InvalidDate(date.to_string()))?,
                    bank: if bank.is_empty() {
                        None
                    } else {
                        Some(bank.join(" "))
                    },
                },
                _ => {
                    return Err(CommandError::Usage(
                        "check <payment#> <number> <yyyy-mm-dd> [bank]",
                    ))
                }
            },
            "unpay" => match args.as_slice() {
                [payment] => Command::RemovePayment {
                    payment: index_arg(payment)?,
                },
                _ => return Err(CommandError::Usage("unpay <payment#>")),
            },
            "note" => Command::Note(rest.to_string()),
            "show" => Command::Show,
            "submit" => Command::Submit,
            "clear" => Command::Clear,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

fn required(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

/// 1-based index as displayed
fn index_arg(raw: &str) -> Result<usize, CommandError> {
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(CommandError::InvalidNumber(raw.to_string())),
    }
}

fn amount_arg(raw: &str) -> Result<Decimal, CommandError> {
    raw.parse::<Decimal>()
        .map_err(|_| CommandError::InvalidAmount(raw.to_string()))
}

fn payment_method(raw: &str) -> Result<PaymentMethodType, CommandError> {
    match raw.to_ascii_lowercase().as_str() {
        "cash" => Ok(PaymentMethodType::Cash),
        "card" | "credit" | "credit-card" => Ok(PaymentMethodType::CreditCard),
        "check" | "cheque" => Ok(PaymentMethodType::Check),
        _ => Err(CommandError::UnknownPaymentMethod(raw.to_string())),
    }
}

fn discount_type(raw: &str) -> Result<DiscountType, CommandError> {
    match raw.to_ascii_lowercase().as_str() {
        "pct" | "percent" | "%" => Ok(DiscountType::Percentage),
        "fixed" => Ok(DiscountType::Fixed),
        _ => Err(CommandError::UnknownDiscountType(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cart_commands() {
        assert_eq!(
            Command::parse("search  blue hoodie "),
            Ok(Command::Search("blue hoodie".into()))
        );
        assert_eq!(
            Command::parse("add 2 v_large"),
            Ok(Command::Add {
                index: 2,
                variant_id: Some("v_large".into())
            })
        );
        assert_eq!(
            Command::parse("QTY 1 0"),
            Ok(Command::Quantity { line: 1, quantity: 0 })
        );
        assert_eq!(Command::parse("rm 0"), Err(CommandError::InvalidNumber("0".into())));
    }

    #[test]
    fn test_parse_payment_commands() {
        assert_eq!(
            Command::parse("pay card"),
            Ok(Command::AddPayment(PaymentMethodType::CreditCard))
        );
        assert_eq!(
            Command::parse("amount 2 62.00"),
            Ok(Command::PaymentAmount {
                payment: 2,
                amount: Decimal::new(6200, 2)
            })
        );
        assert_eq!(
            Command::parse("check 2 1001 2026-10-19 First National"),
            Ok(Command::Check {
                payment: 2,
                number: "1001".into(),
                date: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
                bank: Some("First National".into()),
            })
        );
        assert_eq!(
            Command::parse("check 2 1001 19/10/2026"),
            Err(CommandError::InvalidDate("19/10/2026".into()))
        );
    }

    #[test]
    fn test_parse_discount() {
        assert_eq!(
            Command::parse("discount pct 10"),
            Ok(Command::Discount {
                kind: DiscountType::Percentage,
                amount: Decimal::from(10)
            })
        );
        assert_eq!(
            Command::parse("discount bogus 10"),
            Err(CommandError::UnknownDiscountType("bogus".into()))
        );
        assert_eq!(
            Command::parse("discount fixed ten"),
            Err(CommandError::InvalidAmount("ten".into()))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Command::parse("   "), Err(CommandError::Empty));
        assert_eq!(Command::parse("search"), Err(CommandError::Usage("search <text>")));
        assert_eq!(Command::parse("refund 3"), Err(CommandError::Unknown("refund".into())));
        assert_eq!(Command::parse("note"), Ok(Command::Note(String::new())));
    }
}
