//! # pos-http
//!
//! REST client for the shopdesk catalog and order service.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pos_http::HttpShopService;
//! use pos_core::{CheckoutSession, ProductQuery};
//!
//! // SHOP_API_URL / SHOP_API_TOKEN from the environment
//! let shop = HttpShopService::from_env()?;
//!
//! let mut session = CheckoutSession::new();
//! session.search_products(&shop, ProductQuery::Text("hoodie".into())).await?;
//! ```

pub mod client;
pub mod config;

// Re-exports
pub use client::HttpShopService;
pub use config::{ShopApiConfig, DEFAULT_TIMEOUT_SECS};
