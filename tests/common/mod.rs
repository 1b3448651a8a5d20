//! Shared harness for integration tests: a wiremock pricing authority and a
//! scripted payment gateway wired into a full checkout context.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;
use wiremock::MockServer;

use storefront_checkout::api::HttpCommerceApi;
use storefront_checkout::config::AppConfig;
use storefront_checkout::events::Event;
use storefront_checkout::gateway::{GatewayOutcome, GatewayRequest, PaymentGateway};
use storefront_checkout::CheckoutContext;

/// How the scripted widget concludes each attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    /// Report success with the charge's own reference.
    Succeed,
    /// The shopper closes the widget.
    Close,
}

/// Test double for the hosted widget: records what it was asked to charge
/// and concludes according to its mode.
pub struct ScriptedGateway {
    mode: GatewayMode,
    last_request: Mutex<Option<GatewayRequest>>,
}

impl ScriptedGateway {
    pub fn new(mode: GatewayMode) -> Self {
        Self {
            mode,
            last_request: Mutex::new(None),
        }
    }

    #[allow(dead_code)]
    pub fn last_request(&self) -> Option<GatewayRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn open(&self, request: GatewayRequest) -> GatewayOutcome {
        let reference = request.reference.clone();
        *self.last_request.lock().unwrap() = Some(request);
        match self.mode {
            GatewayMode::Succeed => GatewayOutcome::Success { reference },
            GatewayMode::Close => GatewayOutcome::Closed,
        }
    }
}

/// In-process authority stub for tests that only need catalog resolution:
/// every product id resolves to the same priced snapshot.
#[allow(dead_code)]
pub struct StaticCatalogApi {
    price: rust_decimal::Decimal,
}

impl StaticCatalogApi {
    #[allow(dead_code)]
    pub fn new(price: rust_decimal::Decimal) -> Self {
        Self { price }
    }
}

#[async_trait]
impl storefront_checkout::api::CommerceApi for StaticCatalogApi {
    async fn list_products(
        &self,
    ) -> Result<Vec<storefront_checkout::models::ProductSnapshot>, storefront_checkout::errors::CheckoutError>
    {
        Ok(vec![])
    }

    async fn get_product(
        &self,
        id: Uuid,
    ) -> Result<storefront_checkout::models::ProductSnapshot, storefront_checkout::errors::CheckoutError>
    {
        Ok(storefront_checkout::models::ProductSnapshot {
            id,
            name: "Product".to_string(),
            price: self.price,
            available_stock: 100,
        })
    }

    async fn list_addresses(
        &self,
    ) -> Result<Vec<storefront_checkout::models::Address>, storefront_checkout::errors::CheckoutError>
    {
        Ok(vec![])
    }

    async fn create_address(
        &self,
        _address: &storefront_checkout::models::Address,
    ) -> Result<storefront_checkout::models::Address, storefront_checkout::errors::CheckoutError>
    {
        unimplemented!("not used by these tests")
    }

    async fn update_address(
        &self,
        _address: &storefront_checkout::models::Address,
    ) -> Result<storefront_checkout::models::Address, storefront_checkout::errors::CheckoutError>
    {
        unimplemented!("not used by these tests")
    }

    async fn delete_address(
        &self,
        _id: Uuid,
    ) -> Result<(), storefront_checkout::errors::CheckoutError> {
        unimplemented!("not used by these tests")
    }

    async fn calculate_totals(
        &self,
        _request: &storefront_checkout::models::CalculateTotalsRequest,
    ) -> Result<storefront_checkout::models::SecureTotals, storefront_checkout::errors::CheckoutError>
    {
        unimplemented!("not used by these tests")
    }

    async fn create_order(
        &self,
        _request: &storefront_checkout::models::CreateOrderRequest,
    ) -> Result<storefront_checkout::models::OrderCreationResult, storefront_checkout::errors::CheckoutError>
    {
        unimplemented!("not used by these tests")
    }

    async fn verify_payment(
        &self,
        _request: &storefront_checkout::models::VerifyPaymentRequest,
    ) -> Result<
        storefront_checkout::models::PaymentVerificationResult,
        storefront_checkout::errors::CheckoutError,
    > {
        unimplemented!("not used by these tests")
    }
}

pub struct TestHarness {
    pub server: MockServer,
    pub ctx: CheckoutContext,
    pub gateway: Arc<ScriptedGateway>,
    #[allow(dead_code)]
    pub events: mpsc::Receiver<Event>,
}

/// Builds a checkout context pointed at a fresh mock authority.
pub async fn harness(mode: GatewayMode) -> TestHarness {
    let server = MockServer::start().await;

    let mut config = AppConfig::new(server.uri(), "test-bearer-token", "pk_test_harness");
    // Keep read retries fast inside tests.
    config.read_retry_base_delay_ms = 10;

    let api = Arc::new(HttpCommerceApi::new(&config).expect("api client"));
    let gateway = Arc::new(ScriptedGateway::new(mode));
    let (ctx, events) = CheckoutContext::new(config, api, gateway.clone());

    TestHarness {
        server,
        ctx,
        gateway,
        events,
    }
}

// ==================== JSON fixtures ====================

#[allow(dead_code)]
pub fn product_json(id: Uuid, name: &str, price: &str, stock: i32) -> Value {
    json!({
        "id": id,
        "name": name,
        "price": price,
        "availableStock": stock,
    })
}

#[allow(dead_code)]
pub fn address_json(id: Uuid, is_default: bool) -> Value {
    json!({
        "id": id,
        "firstName": "Ada",
        "lastName": "Lovelace",
        "street": "12 Analytical Way",
        "city": "Lagos",
        "postalCode": "100001",
        "country": "NG",
        "isDefault": is_default,
    })
}

/// The calibration breakdown: subtotal 100.00, standard shipping 15.00, a
/// 10.00 discount, 8% tax on (100 + 15 - 10) = 8.40, grand total 113.40.
#[allow(dead_code)]
pub fn discounted_totals_json(code: &str) -> Value {
    json!({
        "subtotal": "100.00",
        "shipping": "15.00",
        "tax": "8.40",
        "discountAmount": "10.00",
        "grandTotal": "113.40",
        "discountCode": code,
    })
}

/// Same inputs without a discount: tax 8% of 115.00 = 9.20, grand 124.20.
#[allow(dead_code)]
pub fn undiscounted_totals_json() -> Value {
    json!({
        "subtotal": "100.00",
        "shipping": "15.00",
        "tax": "9.20",
        "discountAmount": "0.00",
        "grandTotal": "124.20",
    })
}

#[allow(dead_code)]
pub fn order_json(order_id: Uuid, total: &str, total_cents: i64, reference: &str) -> Value {
    json!({
        "orderId": order_id,
        "orderTotal": total,
        "orderTotalCents": total_cents,
        "userEmail": "ada@example.com",
        "paymentReference": reference,
    })
}

#[allow(dead_code)]
pub fn verification_json(order_id: Uuid, verified: bool, message: Option<&str>) -> Value {
    match message {
        Some(message) => json!({
            "orderId": order_id,
            "verified": verified,
            "message": message,
        }),
        None => json!({
            "orderId": order_id,
            "verified": verified,
        }),
    }
}
