//! Order creation against the pricing authority.
//!
//! Opening an order is a non-idempotent mutation: it reserves a payment
//! reference and creates a pending order server-side. The service therefore
//! never retries, checks its preconditions before touching the wire, and
//! holds a single order slot guarded against concurrent or repeated creation
//! while a pending order awaits verification.

use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

use crate::{
    api::CommerceApi,
    errors::CheckoutError,
    events::{Event, EventSender},
    models::{CheckoutDraft, CreateOrderRequest, OrderCreationResult, SecureTotals},
};

#[derive(Default)]
struct OrderSlot {
    in_flight: bool,
    info: Option<OrderCreationResult>,
}

pub struct OrderService {
    api: Arc<dyn CommerceApi>,
    event_sender: Arc<EventSender>,
    slot: Mutex<OrderSlot>,
}

impl OrderService {
    pub fn new(api: Arc<dyn CommerceApi>, event_sender: Arc<EventSender>) -> Self {
        Self {
            api,
            event_sender,
            slot: Mutex::new(OrderSlot::default()),
        }
    }

    /// Opens a pending order for the draft.
    ///
    /// Preconditions are rechecked here as a final guard against races (for
    /// example the cart emptying after totals were fetched): an address must
    /// be present, a shipping option chosen, and the reconciled grand total
    /// positive. Violations return before any network call.
    #[instrument(skip(self, draft, totals))]
    pub async fn create_order(
        &self,
        draft: &CheckoutDraft,
        totals: Option<&SecureTotals>,
    ) -> Result<OrderCreationResult, CheckoutError> {
        let shipping_address = draft.address.clone().ok_or_else(|| {
            CheckoutError::Validation(
                "A shipping address is required before placing an order".to_string(),
            )
        })?;
        let shipping_option = draft.shipping_option.ok_or_else(|| {
            CheckoutError::Validation(
                "A shipping option must be selected before placing an order".to_string(),
            )
        })?;
        let grand_total = totals.map(|t| t.grand_total).unwrap_or(Decimal::ZERO);
        if grand_total <= Decimal::ZERO {
            return Err(CheckoutError::Validation(
                "Order total must be greater than zero".to_string(),
            ));
        }

        {
            let mut slot = self.slot.lock().unwrap();
            if slot.in_flight {
                return Err(CheckoutError::OrderPending(
                    "An order request is already in flight".to_string(),
                ));
            }
            if slot.info.is_some() {
                return Err(CheckoutError::OrderPending(
                    "A pending order is already awaiting payment verification".to_string(),
                ));
            }
            slot.in_flight = true;
        }

        let request = CreateOrderRequest {
            shipping_address,
            shipping_option,
            discount_code: draft.discount_code.clone(),
        };

        // Mutation: exactly one attempt, failures surface to the caller.
        let result = self.api.create_order(&request).await;

        let info = {
            let mut slot = self.slot.lock().unwrap();
            slot.in_flight = false;
            match result {
                Ok(info) => {
                    slot.info = Some(info.clone());
                    info
                }
                Err(err) => return Err(err),
            }
        };

        self.event_sender
            .send_or_log(Event::OrderCreated(info.order_id))
            .await;
        info!(
            order_id = %info.order_id,
            order_total = %info.order_total,
            reference = %info.payment_reference,
            "Opened pending order"
        );
        Ok(info)
    }

    /// The unverified order for the current attempt, if one exists.
    pub fn order_info(&self) -> Option<OrderCreationResult> {
        self.slot.lock().unwrap().info.clone()
    }

    /// Releases the order slot. Called when the draft changes or when
    /// verification concludes.
    pub fn clear(&self) {
        self.slot.lock().unwrap().info = None;
    }
}
