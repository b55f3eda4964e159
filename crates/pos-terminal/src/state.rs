//! # Terminal State
//!
//! Configuration and the shop service the console runs against.
//! With `SHOP_API_URL` set the terminal talks to the live API; otherwise it
//! serves a local catalog file through the in-memory shop.

use pos_core::{BoxedShopService, CheckoutSession, MemoryShop, ShopCatalog};
use pos_http::{HttpShopService, ShopApiConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default location of the offline catalog
pub const DEFAULT_CATALOG_PATH: &str = "config/catalog.toml";

/// Terminal configuration
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// Catalog file for offline mode
    pub catalog_path: PathBuf,
    /// Live API settings, when configured
    pub api: Option<ShopApiConfig>,
}

impl TerminalConfig {
    /// Load from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let catalog_path = std::env::var("POS_CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CATALOG_PATH));

        let api = match std::env::var("SHOP_API_URL") {
            Ok(_) => Some(ShopApiConfig::from_env()?),
            Err(_) => None,
        };

        Ok(Self { catalog_path, api })
    }

    pub fn is_offline(&self) -> bool {
        self.api.is_none()
    }
}

/// Everything the console needs
pub struct AppState {
    /// Catalog/order service
    pub shop: BoxedShopService,
    /// The checkout in progress
    pub session: CheckoutSession,
    /// Terminal config
    pub config: TerminalConfig,
}

impl AppState {
    /// Build state from the environment
    pub fn new() -> anyhow::Result<Self> {
        let config = TerminalConfig::from_env()?;
        Self::with_config(config)
    }

    pub fn with_config(config: TerminalConfig) -> anyhow::Result<Self> {
        let shop: BoxedShopService = match &config.api {
            Some(api) => Arc::new(
                HttpShopService::new(api.clone())
                    .map_err(|e| anyhow::anyhow!("Failed to initialize shop API client: {}", e))?,
            ),
            None => Arc::new(MemoryShop::new(load_shop_catalog(&config.catalog_path)?)),
        };

        Ok(Self::with_shop(shop, config))
    }

    /// State over an explicit service
    pub fn with_shop(shop: BoxedShopService, config: TerminalConfig) -> Self {
        Self {
            shop,
            session: CheckoutSession::new(),
            config,
        }
    }
}

/// Load the offline catalog, falling back to an empty one when the file is missing
pub fn load_shop_catalog(path: &Path) -> anyhow::Result<ShopCatalog> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("No catalog found at {}, using empty catalog", path.display());
            return Ok(ShopCatalog::new());
        }
        Err(err) => {
            return Err(anyhow::anyhow!("Failed to read {}: {}", path.display(), err));
        }
    };

    let catalog = ShopCatalog::from_toml(&content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?;
    tracing::info!(
        "Loaded {} products and {} discount codes from {}",
        catalog.products.len(),
        catalog.discount_codes.len(),
        path.display()
    );
    Ok(catalog)
}
