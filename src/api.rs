//! REST boundary to the storefront pricing authority.
//!
//! Every request carries the session's bearer token. Read operations
//! (catalog, totals, addresses) go through a bounded retry with exponential
//! backoff; mutating operations (order creation, payment verification,
//! address writes) are sent exactly once because their side effects are not
//! idempotent.

use async_trait::async_trait;
use http::StatusCode;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    errors::CheckoutError,
    models::{
        Address, CalculateTotalsRequest, CreateOrderRequest, OrderCreationResult,
        PaymentVerificationResult, ProductSnapshot, SecureTotals, VerifyPaymentRequest,
    },
};

/// The endpoints this core consumes, behind a seam so services can be tested
/// against scripted collaborators.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommerceApi: Send + Sync {
    async fn list_products(&self) -> Result<Vec<ProductSnapshot>, CheckoutError>;
    async fn get_product(&self, id: Uuid) -> Result<ProductSnapshot, CheckoutError>;

    async fn list_addresses(&self) -> Result<Vec<Address>, CheckoutError>;
    async fn create_address(&self, address: &Address) -> Result<Address, CheckoutError>;
    async fn update_address(&self, address: &Address) -> Result<Address, CheckoutError>;
    async fn delete_address(&self, id: Uuid) -> Result<(), CheckoutError>;

    async fn calculate_totals(
        &self,
        request: &CalculateTotalsRequest,
    ) -> Result<SecureTotals, CheckoutError>;

    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderCreationResult, CheckoutError>;

    async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<PaymentVerificationResult, CheckoutError>;
}

/// Bounded exponential backoff for read operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A policy that issues exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt after `attempt` failed: base, 2x, 4x, ...
    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Error body shape returned by the authority on 4xx/5xx.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// reqwest-backed implementation of [`CommerceApi`].
#[derive(Debug, Clone)]
pub struct HttpCommerceApi {
    client: Client,
    base_url: Url,
    bearer_token: String,
    retry: RetryPolicy,
}

impl HttpCommerceApi {
    pub fn new(config: &AppConfig) -> Result<Self, CheckoutError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        // A trailing slash keeps Url::join appending instead of replacing.
        let mut base = config.api_base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| CheckoutError::Validation(format!("Invalid API base URL: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            bearer_token: config.api_bearer_token.clone(),
            retry: RetryPolicy::new(
                config.read_retry_attempts,
                Duration::from_millis(config.read_retry_base_delay_ms),
            ),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, CheckoutError> {
        self.base_url
            .join(path)
            .map_err(|e| CheckoutError::Validation(format!("Invalid endpoint path: {}", e)))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, CheckoutError> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::error_from(status, response).await)
        }
    }

    async fn error_from(status: StatusCode, response: Response) -> CheckoutError {
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                } else {
                    body
                }
            });

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            CheckoutError::Unauthorized(message)
        } else {
            CheckoutError::Api { status, message }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: Url) -> Result<T, CheckoutError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn post_once<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> Result<T, CheckoutError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.bearer_token)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// GET with bounded backoff. Only used for read endpoints.
    async fn get_with_retry<T: DeserializeOwned>(&self, path: &str) -> Result<T, CheckoutError> {
        let url = self.endpoint(path)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_once(url.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retry.max_attempts && err.is_retryable() => {
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "read request failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// POST with bounded backoff. Only for read-class endpoints
    /// (`/cart/calculate` computes, it does not mutate).
    async fn post_with_retry<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CheckoutError> {
        let url = self.endpoint(path)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.post_once(url.clone(), body).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retry.max_attempts && err.is_retryable() => {
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %err,
                        "read request failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl CommerceApi for HttpCommerceApi {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<ProductSnapshot>, CheckoutError> {
        self.get_with_retry("products").await
    }

    #[instrument(skip(self))]
    async fn get_product(&self, id: Uuid) -> Result<ProductSnapshot, CheckoutError> {
        self.get_with_retry(&format!("products/{}", id)).await
    }

    #[instrument(skip(self))]
    async fn list_addresses(&self) -> Result<Vec<Address>, CheckoutError> {
        self.get_with_retry("account/addresses").await
    }

    #[instrument(skip(self, address))]
    async fn create_address(&self, address: &Address) -> Result<Address, CheckoutError> {
        let url = self.endpoint("account/addresses")?;
        self.post_once(url, address).await
    }

    #[instrument(skip(self, address))]
    async fn update_address(&self, address: &Address) -> Result<Address, CheckoutError> {
        let id = address.id.ok_or_else(|| {
            CheckoutError::Validation("Cannot update an address without an id".to_string())
        })?;
        let url = self.endpoint(&format!("account/addresses/{}", id))?;
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.bearer_token)
            .json(address)
            .send()
            .await?;
        Self::decode(response).await
    }

    #[instrument(skip(self))]
    async fn delete_address(&self, id: Uuid) -> Result<(), CheckoutError> {
        let url = self.endpoint(&format!("account/addresses/{}", id))?;
        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::error_from(status, response).await)
        }
    }

    #[instrument(skip(self, request), fields(shipping_option = %request.shipping_option))]
    async fn calculate_totals(
        &self,
        request: &CalculateTotalsRequest,
    ) -> Result<SecureTotals, CheckoutError> {
        self.post_with_retry("cart/calculate", request).await
    }

    #[instrument(skip(self, request), fields(shipping_option = %request.shipping_option))]
    async fn create_order(
        &self,
        request: &CreateOrderRequest,
    ) -> Result<OrderCreationResult, CheckoutError> {
        let url = self.endpoint("checkout/order")?;
        self.post_once(url, request).await
    }

    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn verify_payment(
        &self,
        request: &VerifyPaymentRequest,
    ) -> Result<PaymentVerificationResult, CheckoutError> {
        let url = self.endpoint("checkout/paystack-verify")?;
        self.post_once(url, request).await
    }
}
