//! # Shop API Configuration
//!
//! Connection settings for the catalog/order service.
//! Loaded from environment variables (and `.env` when present).

use pos_core::PosError;
use std::env;
use std::time::Duration;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Shop API configuration
#[derive(Debug, Clone)]
pub struct ShopApiConfig {
    /// Base URL, e.g. `https://shop.example.com/api`
    pub base_url: String,

    /// Bearer token for the terminal, if the service requires one
    pub api_token: Option<String>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl ShopApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `SHOP_API_URL`
    ///
    /// Optional:
    /// - `SHOP_API_TOKEN`
    /// - `SHOP_API_TIMEOUT_SECS` (default 15)
    pub fn from_env() -> Result<Self, PosError> {
        dotenvy::dotenv().ok();

        let base_url = env::var("SHOP_API_URL")
            .map_err(|_| PosError::Configuration("SHOP_API_URL not set".to_string()))?;

        let timeout = match env::var("SHOP_API_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse::<u64>().map_err(|_| {
                PosError::Configuration(format!(
                    "SHOP_API_TIMEOUT_SECS must be a whole number of seconds, got {raw:?}"
                ))
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        let api_token = env::var("SHOP_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let mut config = Self::new(base_url)?.with_timeout(Duration::from_secs(timeout));
        config.api_token = api_token;
        Ok(config)
    }

    /// Create config for an explicit base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, PosError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(PosError::Configuration(
                "SHOP_API_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            api_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Builder: set the bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Builder: set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> Option<String> {
        self.api_token.as_ref().map(|token| format!("Bearer {token}"))
    }

    /// Absolute URL for an API path
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(ShopApiConfig::new("https://shop.example.com/api").is_ok());
        assert!(ShopApiConfig::new("http://localhost:8080").is_ok());

        let err = ShopApiConfig::new("shop.example.com").unwrap_err();
        assert!(matches!(err, PosError::Configuration(_)));
    }

    #[test]
    fn test_url_join() {
        let config = ShopApiConfig::new("https://shop.example.com/api/").unwrap();
        assert_eq!(config.base_url, "https://shop.example.com/api");
        assert_eq!(config.url("/orders"), "https://shop.example.com/api/orders");
        assert_eq!(
            config.url("discount-codes/validate"),
            "https://shop.example.com/api/discount-codes/validate"
        );
    }

    #[test]
    fn test_auth_header() {
        let config = ShopApiConfig::new("https://shop.example.com").unwrap();
        assert_eq!(config.auth_header(), None);

        let config = config.with_token("term_abc123");
        assert_eq!(config.auth_header().as_deref(), Some("Bearer term_abc123"));
    }

    #[test]
    fn test_default_timeout() {
        let config = ShopApiConfig::new("https://shop.example.com").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
