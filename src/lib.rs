//! Cart & checkout reconciliation core for an e-commerce storefront.
//!
//! This crate is the session-side engine behind a storefront's cart and
//! checkout: it aggregates cart lines, obtains the authoritative price
//! breakdown from the pricing backend, steps the shopper through address,
//! shipping, and payment, opens the pending order, and drives payment
//! initiation and verification against a hosted gateway widget.
//!
//! All mutable session state lives in the [`CheckoutContext`]; there are no
//! module-level globals. The embedding application constructs the context
//! once, spawns [`events::process_events`] (or its own handler) on the
//! returned receiver, and drives the flow through the context's services.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod models;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::CommerceApi;
use crate::config::AppConfig;
use crate::events::{Event, EventSender};
use crate::gateway::PaymentGateway;
use crate::services::{
    AddressService, CartService, CatalogService, CheckoutController, OrderService, PaymentService,
    TotalsService,
};

/// Explicit container for one shopping session's state and collaborators.
///
/// Everything the checkout flow touches hangs off this context: the cart,
/// the catalog snapshot cache, the address book, the reconciled totals, the
/// order slot, and the payment adapter. Collaborators receive `Arc` handles
/// from here and nowhere else.
pub struct CheckoutContext {
    pub config: Arc<AppConfig>,
    pub cart: Arc<CartService>,
    pub catalog: Arc<CatalogService>,
    pub addresses: Arc<AddressService>,
    pub totals: Arc<TotalsService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub checkout: Arc<CheckoutController>,
    pub event_sender: Arc<EventSender>,
}

impl CheckoutContext {
    /// Builds the full service graph. This is the single initialization
    /// point for session state; the returned receiver carries the domain
    /// events the services emit.
    pub fn new(
        config: AppConfig,
        api: Arc<dyn CommerceApi>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (event_sender, event_rx) = events::channel(config.event_channel_capacity);
        let event_sender = Arc::new(event_sender);

        let catalog = Arc::new(CatalogService::new(
            api.clone(),
            Duration::from_secs(config.snapshot_ttl_secs),
        ));
        let cart = Arc::new(CartService::new(catalog.clone(), event_sender.clone()));
        let addresses = Arc::new(AddressService::new(api.clone()));
        let totals = Arc::new(TotalsService::new(
            api.clone(),
            cart.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(OrderService::new(api.clone(), event_sender.clone()));
        let payments = Arc::new(PaymentService::new(
            api,
            gateway,
            event_sender.clone(),
            &config,
        ));
        let checkout = Arc::new(CheckoutController::new(
            cart.clone(),
            catalog.clone(),
            addresses.clone(),
            totals.clone(),
            orders.clone(),
            payments.clone(),
            event_sender.clone(),
        ));

        let context = Self {
            config: Arc::new(config),
            cart,
            catalog,
            addresses,
            totals,
            orders,
            payments,
            checkout,
            event_sender,
        };

        (context, event_rx)
    }
}
