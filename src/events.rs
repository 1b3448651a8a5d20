use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events emitted by the cart and checkout services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Cart events
    CartItemAdded { product_id: Uuid, quantity: u32 },
    CartItemUpdated { product_id: Uuid, quantity: u32 },
    CartItemRemoved { product_id: Uuid },
    CartCleared,

    // Reconciliation events
    TotalsReconciled { grand_total: Decimal },
    DiscountRejected { code: String },

    // Checkout events
    CheckoutStarted,
    CheckoutAbandoned,

    // Order and payment events
    OrderCreated(Uuid),
    PaymentInitiated { order_id: Uuid, reference: String },
    PaymentCancelled { order_id: Uuid },
    PaymentVerified { order_id: Uuid },
    PaymentVerificationFailed { order_id: Uuid },

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Handlers implementing this trait process events asynchronously.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: Event) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, surfacing channel failure to the caller.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed
    /// or full. Event delivery is never allowed to fail a checkout operation.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropped event: {}", e);
        }
    }
}

/// Creates the event channel and its sender wrapper.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, logging each event. The embedding application
/// spawns this (or its own handler) next to the checkout context.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::PaymentInitiated {
                order_id,
                reference,
            } => {
                info!(order_id = %order_id, reference = %reference, "Payment initiated");
            }
            Event::PaymentVerified { order_id } => {
                info!(order_id = %order_id, "Payment verified");
            }
            Event::PaymentVerificationFailed { order_id } => {
                warn!(order_id = %order_id, "Payment verification failed");
            }
            Event::PaymentCancelled { order_id } => {
                info!(order_id = %order_id, "Payment widget closed by shopper");
            }
            Event::DiscountRejected { code } => {
                info!(code = %code, "Discount code rejected by pricing authority");
            }
            other => debug!(event = ?other, "Event"),
        }
    }

    info!("Event processing loop stopped");
}

/// Drains the event channel, fanning each event out to the registered
/// handlers. A failing handler is logged and never blocks the others.
pub async fn dispatch_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event dispatch loop");

    while let Some(event) = rx.recv().await {
        let results = join_all(
            handlers
                .iter()
                .map(|handler| handler.handle_event(event.clone())),
        )
        .await;

        for result in results {
            if let Err(e) = result {
                error!("Event handler failed: {}", e);
            }
        }
    }

    info!("Event dispatch loop stopped");
}
