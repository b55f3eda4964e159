//! # REST Shop Service
//!
//! [`ShopService`] over the shop's JSON API:
//!
//! | Operation               | Request                                   |
//! |-------------------------|-------------------------------------------|
//! | product search          | `GET /products?query=` or `?barcode=`     |
//! | customer search         | `GET /customers?query=`                   |
//! | discount code check     | `POST /discount-codes/validate`           |
//! | order creation          | `POST /orders`                            |

use crate::config::ShopApiConfig;
use async_trait::async_trait;
use pos_core::{
    Customer, DiscountCodeValidation, DiscountCodeValidationRequest, OrderConfirmation,
    OrderRequest, PosError, PosResult, Product, ProductQuery, ShopService,
    MIN_CUSTOMER_QUERY_LEN,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const SERVICE_NAME: &str = "shop-api";

/// Shop service backed by the HTTP API
pub struct HttpShopService {
    config: ShopApiConfig,
    client: Client,
}

impl HttpShopService {
    /// Create a new client
    pub fn new(config: ShopApiConfig) -> PosResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PosError::Configuration(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PosResult<Self> {
        Self::new(ShopApiConfig::from_env()?)
    }

    pub fn config(&self) -> &ShopApiConfig {
        &self.config
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.config.auth_header() {
            Some(header) => builder.header("Authorization", header),
            None => builder,
        }
    }

    /// Send a request and decode a successful JSON body.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> PosResult<T> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(|e| PosError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PosError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            error!("Shop API error: status={}, body={}", status, body);
            return Err(service_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| PosError::Serialization(format!("Failed to parse shop API response: {e}")))
    }
}

#[async_trait]
impl ShopService for HttpShopService {
    #[instrument(skip(self))]
    async fn search_products(&self, query: &ProductQuery) -> PosResult<Vec<Product>> {
        let param = match query {
            ProductQuery::Text(_) => "query",
            ProductQuery::Barcode(_) => "barcode",
        };
        let request = self
            .client
            .get(self.config.url("products"))
            .query(&[(param, query.value())]);

        let products: Vec<Product> = self.send(request).await?;
        debug!("product search returned {} results", products.len());
        Ok(products)
    }

    #[instrument(skip(self))]
    async fn search_customers(&self, query: &str) -> PosResult<Vec<Customer>> {
        let query = query.trim();
        if query.chars().count() < MIN_CUSTOMER_QUERY_LEN {
            return Ok(Vec::new());
        }

        let request = self
            .client
            .get(self.config.url("customers"))
            .query(&[("query", query)]);

        self.send(request).await
    }

    #[instrument(skip(self, request), fields(code = %request.code))]
    async fn validate_discount_code(
        &self,
        request: &DiscountCodeValidationRequest,
    ) -> PosResult<DiscountCodeValidation> {
        let builder = self
            .client
            .post(self.config.url("discount-codes/validate"))
            .json(request);

        let validation: DiscountCodeValidation = self.send(builder).await?;
        debug!(valid = validation.valid, "discount code validated");
        Ok(validation)
    }

    #[instrument(skip(self, request), fields(items = request.item_count()))]
    async fn create_order(&self, request: &OrderRequest) -> PosResult<OrderConfirmation> {
        if request.items.is_empty() {
            return Err(PosError::EmptyCart);
        }

        let builder = self.client.post(self.config.url("orders")).json(request);
        let response: CreateOrderResponse = self.send(builder).await?;

        match response {
            CreateOrderResponse {
                success: true,
                order: Some(order),
                ..
            } => {
                info!(
                    "Created order: id={}, number={}",
                    order.id, order.order_number
                );
                Ok(order)
            }
            CreateOrderResponse { error, .. } => Err(PosError::ServiceError {
                service: SERVICE_NAME.to_string(),
                message: error.unwrap_or_else(|| "order was not created".to_string()),
            }),
        }
    }

    fn service_name(&self) -> &'static str {
        SERVICE_NAME
    }
}

/// Map a non-2xx response to a service error, preferring the body's message.
fn service_error(status: StatusCode, body: &str) -> PosError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error.or(b.message))
        .unwrap_or_else(|| format!("HTTP {status}: {body}"));

    PosError::ServiceError {
        service: SERVICE_NAME.to_string(),
        message,
    }
}

// =============================================================================
// Shop API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    order: Option<OrderConfirmation>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
