//! Cart aggregator for the active session.
//!
//! Holds the (product, quantity) lines in memory and derives the joined,
//! stock-resolved view. The derived `cart_total` is an estimate for display
//! before reconciliation; the authoritative breakdown always comes from the
//! pricing authority.

use rust_decimal::Decimal;
use std::sync::{Arc, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::CheckoutError,
    events::{Event, EventSender},
    models::{CartDetail, CartLine},
    services::catalog::CatalogService,
};

pub struct CartService {
    lines: RwLock<Vec<CartLine>>,
    catalog: Arc<CatalogService>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(catalog: Arc<CatalogService>, event_sender: Arc<EventSender>) -> Self {
        Self {
            lines: RwLock::new(Vec::new()),
            catalog,
            event_sender,
        }
    }

    /// Merges into an existing line or inserts a new one. Quantities below 1
    /// are treated as 1; stock ceilings are the caller's concern.
    #[instrument(skip(self))]
    pub async fn add_to_cart(&self, product_id: Uuid, quantity: u32) {
        let quantity = quantity.max(1);
        let event = {
            let mut lines = self.lines.write().unwrap();
            if let Some(line) = lines.iter_mut().find(|l| l.product_id == product_id) {
                line.quantity += quantity;
                Event::CartItemUpdated {
                    product_id,
                    quantity: line.quantity,
                }
            } else {
                lines.push(CartLine {
                    product_id,
                    quantity,
                });
                Event::CartItemAdded {
                    product_id,
                    quantity,
                }
            }
        };

        self.event_sender.send_or_log(event).await;
    }

    /// Sets a line's quantity. Zero or negative removes the line, making this
    /// equivalent to [`remove_from_cart`](Self::remove_from_cart).
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<(), CheckoutError> {
        if quantity <= 0 {
            self.remove_from_cart(product_id).await;
            return Ok(());
        }

        {
            let mut lines = self.lines.write().unwrap();
            let line = lines
                .iter_mut()
                .find(|l| l.product_id == product_id)
                .ok_or_else(|| {
                    CheckoutError::NotFound(format!("Product {} is not in the cart", product_id))
                })?;
            line.quantity = quantity as u32;
        }

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                product_id,
                quantity: quantity as u32,
            })
            .await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, product_id: Uuid) {
        let removed = {
            let mut lines = self.lines.write().unwrap();
            let before = lines.len();
            lines.retain(|l| l.product_id != product_id);
            lines.len() != before
        };

        if removed {
            self.event_sender
                .send_or_log(Event::CartItemRemoved { product_id })
                .await;
        }
    }

    /// Empties the cart. Used both for explicit clears and after verified
    /// payment.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) {
        let had_lines = {
            let mut lines = self.lines.write().unwrap();
            let had = !lines.is_empty();
            lines.clear();
            had
        };

        if had_lines {
            info!("Cleared cart");
            self.event_sender.send_or_log(Event::CartCleared).await;
        }
    }

    pub fn lines(&self) -> Vec<CartLine> {
        self.lines.read().unwrap().clone()
    }

    pub fn line_count(&self) -> usize {
        self.lines.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.read().unwrap().is_empty()
    }

    /// The joined, stock-resolved view. Lines whose product no longer
    /// resolves are excluded from the derived figures.
    pub async fn cart_details(&self) -> Vec<CartDetail> {
        let lines = self.lines();
        let mut details = Vec::with_capacity(lines.len());
        for line in lines {
            match self.catalog.product(line.product_id).await {
                Ok(Some(snapshot)) => details.push(CartDetail::from_parts(line, snapshot)),
                Ok(None) => {
                    warn!(
                        product_id = %line.product_id,
                        "cart line no longer resolves to a product, excluding from totals"
                    );
                }
                Err(err) => {
                    warn!(
                        product_id = %line.product_id,
                        error = %err,
                        "product lookup failed, excluding line from totals"
                    );
                }
            }
        }
        details
    }

    /// Sum of quantities over lines whose product still resolves.
    pub async fn total_items(&self) -> u32 {
        self.cart_details()
            .await
            .iter()
            .map(|d| d.quantity)
            .sum()
    }

    /// Local estimate of the cart's value. Display-only before
    /// reconciliation, and a fallback afterwards; never trusted for charges.
    pub async fn cart_total(&self) -> Decimal {
        self.cart_details()
            .await
            .iter()
            .map(|d| d.subtotal)
            .sum()
    }
}
