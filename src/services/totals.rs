//! Price reconciliation exchange.
//!
//! Every change to the shipping option or discount code yields exactly one
//! request to the pricing authority. Responses are accepted only while their
//! request is still the latest issued one; anything slower than a newer
//! request is discarded, so the held totals always belong to the most recent
//! input key. An empty cart suppresses the exchange entirely.

use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{debug, instrument};

use crate::{
    api::CommerceApi,
    errors::CheckoutError,
    events::{Event, EventSender},
    models::{CalculateTotalsRequest, SecureTotals, TotalsKey},
    services::cart::CartService,
};

/// Result of one reconciliation round.
#[derive(Debug, Clone, PartialEq)]
pub enum TotalsOutcome {
    /// Fresh authoritative totals were accepted.
    Reconciled(SecureTotals),
    /// Totals were accepted but the requested discount code was refused;
    /// the breakdown carries `discount_amount = 0` and no echoed code.
    DiscountRejected {
        totals: SecureTotals,
        rejected_code: String,
    },
    /// The response arrived after a newer request had been issued and was
    /// discarded without touching state.
    Superseded,
    /// The cart is empty; no request was made and held totals were cleared.
    EmptyCart,
}

#[derive(Default)]
struct TotalsInner {
    next_seq: u64,
    latest_request: u64,
    accepted: Option<SecureTotals>,
    accepted_key: Option<TotalsKey>,
}

pub struct TotalsService {
    api: Arc<dyn CommerceApi>,
    cart: Arc<CartService>,
    event_sender: Arc<EventSender>,
    inner: Mutex<TotalsInner>,
}

impl TotalsService {
    pub fn new(
        api: Arc<dyn CommerceApi>,
        cart: Arc<CartService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            api,
            cart,
            event_sender,
            inner: Mutex::new(TotalsInner::default()),
        }
    }

    /// Requests authoritative totals for the given key.
    ///
    /// Callers invoke this whenever the shipping option or discount code
    /// changes. The returned outcome tells the caller whether the response
    /// was accepted, superseded, or skipped for an empty cart.
    #[instrument(skip(self), fields(shipping_option = %key.shipping_option))]
    pub async fn reconcile(&self, key: TotalsKey) -> Result<TotalsOutcome, CheckoutError> {
        if self.cart.is_empty() {
            let mut inner = self.inner.lock().unwrap();
            inner.accepted = None;
            inner.accepted_key = None;
            return Ok(TotalsOutcome::EmptyCart);
        }

        let ticket = {
            let mut inner = self.inner.lock().unwrap();
            inner.next_seq += 1;
            inner.latest_request = inner.next_seq;
            inner.next_seq
        };

        let request = CalculateTotalsRequest {
            shipping_option: key.shipping_option,
            discount_code: key.discount_code.clone(),
        };

        let totals = match self.api.calculate_totals(&request).await {
            Ok(totals) => totals,
            Err(err) => {
                let inner = self.inner.lock().unwrap();
                if inner.latest_request != ticket {
                    debug!("discarding failed totals response for superseded request");
                    return Ok(TotalsOutcome::Superseded);
                }
                return Err(err);
            }
        };

        {
            let mut inner = self.inner.lock().unwrap();
            if inner.latest_request != ticket {
                debug!("discarding totals response for superseded request");
                return Ok(TotalsOutcome::Superseded);
            }
            inner.accepted = Some(totals.clone());
            inner.accepted_key = Some(key.clone());
        }

        self.event_sender
            .send_or_log(Event::TotalsReconciled {
                grand_total: totals.grand_total,
            })
            .await;

        if let Some(code) = key.discount_code {
            if totals.discount_code.as_deref() != Some(code.as_str()) {
                self.event_sender
                    .send_or_log(Event::DiscountRejected { code: code.clone() })
                    .await;
                return Ok(TotalsOutcome::DiscountRejected {
                    totals,
                    rejected_code: code,
                });
            }
        }

        Ok(TotalsOutcome::Reconciled(totals))
    }

    /// The most recently accepted authoritative totals.
    pub fn current(&self) -> Option<SecureTotals> {
        self.inner.lock().unwrap().accepted.clone()
    }

    /// The key the current totals were computed for.
    pub fn current_key(&self) -> Option<TotalsKey> {
        self.inner.lock().unwrap().accepted_key.clone()
    }

    pub fn grand_total(&self) -> Option<Decimal> {
        self.inner
            .lock()
            .unwrap()
            .accepted
            .as_ref()
            .map(|t| t.grand_total)
    }

    /// Forgets held totals. Called when the draft is destroyed.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.accepted = None;
        inner.accepted_key = None;
    }
}
