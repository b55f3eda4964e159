//! # pos-terminal
//!
//! Operator console for the shopdesk point of sale.
//!
//! This crate provides:
//! - Command parsing for the line-oriented console
//! - Terminal configuration and shop service selection
//! - The console loop driving a `CheckoutSession`

pub mod command;
pub mod console;
pub mod state;

pub use command::{Command, CommandError};
pub use console::{Console, Reply};
pub use state::{AppState, TerminalConfig};
