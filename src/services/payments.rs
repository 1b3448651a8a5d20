//! Payment initiation and verification.
//!
//! Initiation hands control to the hosted widget and returns immediately;
//! the terminal signal (success reference or shopper-closed) arrives later on
//! the outcome channel. Verification forwards the gateway reference to the
//! pricing authority, which performs the actual charge confirmation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{info, instrument, warn};

use crate::{
    api::CommerceApi,
    config::AppConfig,
    errors::CheckoutError,
    events::{Event, EventSender},
    gateway::{GatewayOutcome, GatewayRequest, PaymentGateway},
    models::{OrderCreationResult, PaymentVerificationResult, VerifyPaymentRequest},
};

const OUTCOME_CHANNEL_CAPACITY: usize = 8;

/// Terminal signal of one payment initiation. Exactly one arrives per
/// [`PaymentService::begin`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Success { gateway_reference: String },
    Cancelled,
}

pub struct PaymentService {
    api: Arc<dyn CommerceApi>,
    gateway: Arc<dyn PaymentGateway>,
    event_sender: Arc<EventSender>,
    ready: AtomicBool,
    outcome_tx: mpsc::Sender<PaymentOutcome>,
    outcome_rx: AsyncMutex<mpsc::Receiver<PaymentOutcome>>,
    public_key: String,
    currency: String,
}

impl PaymentService {
    pub fn new(
        api: Arc<dyn CommerceApi>,
        gateway: Arc<dyn PaymentGateway>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            api,
            gateway,
            event_sender,
            ready: AtomicBool::new(false),
            outcome_tx,
            outcome_rx: AsyncMutex::new(outcome_rx),
            public_key: config.gateway_public_key.clone(),
            currency: config.currency.clone(),
        }
    }

    /// Marks the widget as loaded. The embedding application calls this once
    /// the vendor script has finished its asynchronous load.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Opens the widget for the pending order and returns immediately.
    ///
    /// The charge amount is the authoritative `order_total_cents` from order
    /// creation. Completion arrives later as exactly one [`PaymentOutcome`]
    /// on the outcome channel.
    #[instrument(
        skip(self, order),
        fields(order_id = %order.order_id, reference = %order.payment_reference)
    )]
    pub async fn begin(&self, order: &OrderCreationResult) -> Result<(), CheckoutError> {
        if !self.is_ready() {
            return Err(CheckoutError::GatewayNotReady);
        }

        let request = GatewayRequest {
            public_key: self.public_key.clone(),
            email: order.user_email.clone(),
            amount_minor: order.order_total_cents,
            reference: order.payment_reference.clone(),
            currency: self.currency.clone(),
        };

        self.event_sender
            .send_or_log(Event::PaymentInitiated {
                order_id: order.order_id,
                reference: order.payment_reference.clone(),
            })
            .await;

        let gateway = self.gateway.clone();
        let outcome_tx = self.outcome_tx.clone();
        let event_sender = self.event_sender.clone();
        let order_id = order.order_id;

        tokio::spawn(async move {
            let outcome = match gateway.open(request).await {
                GatewayOutcome::Success { reference } => PaymentOutcome::Success {
                    gateway_reference: reference,
                },
                GatewayOutcome::Closed => {
                    event_sender
                        .send_or_log(Event::PaymentCancelled { order_id })
                        .await;
                    PaymentOutcome::Cancelled
                }
            };

            if outcome_tx.send(outcome).await.is_err() {
                warn!(order_id = %order_id, "payment outcome receiver dropped");
            }
        });

        Ok(())
    }

    /// Awaits the next terminal signal from the widget.
    pub async fn next_outcome(&self) -> Option<PaymentOutcome> {
        self.outcome_rx.lock().await.recv().await
    }

    /// Confirms the charge with the pricing authority.
    ///
    /// Failure leaves the order pending server-side; the caller surfaces the
    /// error and never retries automatically.
    #[instrument(skip(self, order), fields(order_id = %order.order_id))]
    pub async fn verify(
        &self,
        order: &OrderCreationResult,
        gateway_reference: &str,
    ) -> Result<PaymentVerificationResult, CheckoutError> {
        let request = VerifyPaymentRequest {
            reference: gateway_reference.to_string(),
            order_id: order.order_id,
        };

        let result = self.api.verify_payment(&request).await?;
        if result.verified {
            info!(order_id = %order.order_id, "Charge confirmed");
            Ok(result)
        } else {
            Err(CheckoutError::PaymentVerification(
                result
                    .message
                    .unwrap_or_else(|| "The charge could not be confirmed".to_string()),
            ))
        }
    }
}
