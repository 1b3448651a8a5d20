//! Checkout step controller.
//!
//! A small stepper over the shared checkout draft: Address, Shipping and
//! Payment are interactive; Confirmed is terminal and reachable only through
//! a verified payment. Each step merges only the fields it owns into the
//! draft, and every change to the reconciliation inputs triggers exactly one
//! totals exchange.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use strum::Display;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::CheckoutError,
    events::{Event, EventSender},
    models::{
        Address, CheckoutDraft, OrderCreationResult, PaymentVerificationResult, ShippingOption,
        TotalsKey,
    },
    services::{
        addresses::AddressService,
        cart::CartService,
        catalog::CatalogService,
        orders::OrderService,
        payments::{PaymentOutcome, PaymentService},
        totals::{TotalsOutcome, TotalsService},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CheckoutStep {
    Address,
    Shipping,
    Payment,
    Confirmed,
}

impl CheckoutStep {
    pub fn number(self) -> u8 {
        match self {
            Self::Address => 1,
            Self::Shipping => 2,
            Self::Payment => 3,
            Self::Confirmed => 4,
        }
    }
}

/// How the address step collects its address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressEntryMode {
    /// Saved addresses exist; exactly one must be selected to advance.
    SavedList { selected: Option<Uuid> },
    /// The book is empty, or the shopper opted into the entry form.
    NewForm,
}

struct CheckoutState {
    step: CheckoutStep,
    draft: CheckoutDraft,
    address_mode: AddressEntryMode,
}

pub struct CheckoutController {
    cart: Arc<CartService>,
    catalog: Arc<CatalogService>,
    addresses: Arc<AddressService>,
    totals: Arc<TotalsService>,
    orders: Arc<OrderService>,
    payments: Arc<PaymentService>,
    event_sender: Arc<EventSender>,
    state: RwLock<Option<CheckoutState>>,
}

impl CheckoutController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cart: Arc<CartService>,
        catalog: Arc<CatalogService>,
        addresses: Arc<AddressService>,
        totals: Arc<TotalsService>,
        orders: Arc<OrderService>,
        payments: Arc<PaymentService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            cart,
            catalog,
            addresses,
            totals,
            orders,
            payments,
            event_sender,
            state: RwLock::new(None),
        }
    }

    fn read_state<T>(&self, f: impl FnOnce(&CheckoutState) -> T) -> Result<T, CheckoutError> {
        let guard = self.state.read().unwrap();
        let state = guard.as_ref().ok_or_else(|| {
            CheckoutError::InvalidOperation("Checkout has not started".to_string())
        })?;
        Ok(f(state))
    }

    fn mutate_state<T>(
        &self,
        f: impl FnOnce(&mut CheckoutState) -> Result<T, CheckoutError>,
    ) -> Result<T, CheckoutError> {
        let mut guard = self.state.write().unwrap();
        let state = guard.as_mut().ok_or_else(|| {
            CheckoutError::InvalidOperation("Checkout has not started".to_string())
        })?;
        f(state)
    }

    fn ensure_step(&self, expected: CheckoutStep) -> Result<(), CheckoutError> {
        let step = self.read_state(|s| s.step)?;
        if step != expected {
            return Err(CheckoutError::InvalidOperation(format!(
                "This action is only available at the {} step",
                expected
            )));
        }
        Ok(())
    }

    /// Starts a checkout attempt: creates the draft and runs the one-time
    /// default-address selection. Unreachable with an empty cart.
    #[instrument(skip(self))]
    pub async fn begin(&self) -> Result<CheckoutStep, CheckoutError> {
        if self.cart.is_empty() {
            return Err(CheckoutError::Validation(
                "Cannot start checkout with an empty cart".to_string(),
            ));
        }
        if self.state.read().unwrap().is_some() {
            return Err(CheckoutError::InvalidOperation(
                "Checkout is already in progress".to_string(),
            ));
        }

        let saved = self.addresses.list().await?;
        let default = saved.iter().find(|a| a.is_default).cloned();
        let address_mode = if saved.is_empty() {
            AddressEntryMode::NewForm
        } else {
            AddressEntryMode::SavedList {
                selected: default.as_ref().and_then(|a| a.id),
            }
        };

        let draft = CheckoutDraft {
            address: default,
            ..CheckoutDraft::default()
        };

        *self.state.write().unwrap() = Some(CheckoutState {
            step: CheckoutStep::Address,
            draft,
            address_mode,
        });

        self.event_sender.send_or_log(Event::CheckoutStarted).await;
        info!("Checkout started");
        Ok(CheckoutStep::Address)
    }

    /// Discards the attempt and its draft.
    pub async fn abandon(&self) {
        let was_active = self.state.write().unwrap().take().is_some();
        if was_active {
            self.orders.clear();
            self.totals.reset();
            self.event_sender
                .send_or_log(Event::CheckoutAbandoned)
                .await;
        }
    }

    pub fn step(&self) -> Option<CheckoutStep> {
        self.state.read().unwrap().as_ref().map(|s| s.step)
    }

    pub fn draft(&self) -> Option<CheckoutDraft> {
        self.state.read().unwrap().as_ref().map(|s| s.draft.clone())
    }

    pub fn address_mode(&self) -> Option<AddressEntryMode> {
        self.state
            .read()
            .unwrap()
            .as_ref()
            .map(|s| s.address_mode.clone())
    }

    /// Selects one saved address for the draft.
    #[instrument(skip(self))]
    pub async fn select_saved_address(&self, id: Uuid) -> Result<(), CheckoutError> {
        self.ensure_step(CheckoutStep::Address)?;
        let address = self
            .addresses
            .find(id)
            .await?
            .ok_or_else(|| CheckoutError::NotFound(format!("Address {} not found", id)))?;

        self.mutate_state(|state| {
            state.address_mode = AddressEntryMode::SavedList { selected: Some(id) };
            state.draft.address = Some(address);
            Ok(())
        })?;
        self.orders.clear();
        Ok(())
    }

    /// Switches the address step to the new-address form.
    pub fn use_new_address_form(&self) -> Result<(), CheckoutError> {
        self.ensure_step(CheckoutStep::Address)?;
        self.mutate_state(|state| {
            state.address_mode = AddressEntryMode::NewForm;
            state.draft.address = None;
            Ok(())
        })?;
        self.orders.clear();
        Ok(())
    }

    /// Validates, saves, and selects a newly entered address.
    #[instrument(skip(self, address))]
    pub async fn submit_new_address(&self, address: Address) -> Result<Address, CheckoutError> {
        self.ensure_step(CheckoutStep::Address)?;
        // Field-level gate: nothing reaches the network until this passes.
        address.validate()?;

        let created = self.addresses.create(address).await?;
        self.mutate_state(|state| {
            state.draft.address = Some(created.clone());
            state.address_mode = AddressEntryMode::SavedList {
                selected: created.id,
            };
            Ok(())
        })?;
        self.orders.clear();
        Ok(created)
    }

    /// Advances one step. Capped at Payment: confirmation happens only as a
    /// side effect of verified payment, never through here.
    pub fn next_step(&self) -> Result<CheckoutStep, CheckoutError> {
        self.mutate_state(|state| {
            let next = match state.step {
                CheckoutStep::Address => {
                    if state.draft.address.is_none() {
                        return Err(CheckoutError::Validation(
                            "Select or enter a shipping address to continue".to_string(),
                        ));
                    }
                    CheckoutStep::Shipping
                }
                CheckoutStep::Shipping => {
                    if state.draft.shipping_option.is_none() {
                        return Err(CheckoutError::Validation(
                            "Choose a shipping option to continue".to_string(),
                        ));
                    }
                    CheckoutStep::Payment
                }
                CheckoutStep::Payment => CheckoutStep::Payment,
                CheckoutStep::Confirmed => CheckoutStep::Confirmed,
            };
            state.step = next;
            Ok(next)
        })
    }

    /// Steps back, floored at Address. Confirmed is terminal.
    pub fn prev_step(&self) -> Result<CheckoutStep, CheckoutError> {
        self.mutate_state(|state| {
            let prev = match state.step {
                CheckoutStep::Address => CheckoutStep::Address,
                CheckoutStep::Shipping => CheckoutStep::Address,
                CheckoutStep::Payment => CheckoutStep::Shipping,
                CheckoutStep::Confirmed => CheckoutStep::Confirmed,
            };
            state.step = prev;
            Ok(prev)
        })
    }

    /// Records the shipping choice and reconciles totals for it. The fee
    /// itself is whatever the authority returns; this step never prices.
    #[instrument(skip(self))]
    pub async fn select_shipping(
        &self,
        option: ShippingOption,
    ) -> Result<TotalsOutcome, CheckoutError> {
        self.ensure_step(CheckoutStep::Shipping)?;
        let key = self.mutate_state(|state| {
            state.draft.shipping_option = Some(option);
            Ok(TotalsKey {
                shipping_option: option,
                discount_code: state.draft.discount_code.clone(),
            })
        })?;
        self.orders.clear();

        let outcome = self.totals.reconcile(key).await?;
        self.absorb_totals_outcome(&outcome)?;
        Ok(outcome)
    }

    /// Requests a discount. The code is only applied once the authority
    /// echoes it back; rejection clears it and keeps the rest of the
    /// breakdown.
    #[instrument(skip(self))]
    pub async fn apply_discount(&self, code: &str) -> Result<TotalsOutcome, CheckoutError> {
        let code = code.to_string();
        if code.trim().is_empty() {
            return Err(CheckoutError::Validation(
                "Discount code cannot be empty".to_string(),
            ));
        }

        let key = self.mutate_state(|state| {
            let shipping_option = state.draft.shipping_option.ok_or_else(|| {
                CheckoutError::Validation(
                    "Choose a shipping option before applying a discount".to_string(),
                )
            })?;
            state.draft.discount_code = Some(code.clone());
            Ok(TotalsKey {
                shipping_option,
                discount_code: Some(code),
            })
        })?;
        self.orders.clear();

        let outcome = self.totals.reconcile(key).await?;
        self.absorb_totals_outcome(&outcome)?;
        Ok(outcome)
    }

    /// Drops any discount request and reconciles without one.
    #[instrument(skip(self))]
    pub async fn clear_discount(&self) -> Result<TotalsOutcome, CheckoutError> {
        let key = self.mutate_state(|state| {
            let shipping_option = state.draft.shipping_option.ok_or_else(|| {
                CheckoutError::Validation(
                    "Choose a shipping option before changing the discount".to_string(),
                )
            })?;
            state.draft.discount_code = None;
            state.draft.discount_amount = Decimal::ZERO;
            Ok(TotalsKey {
                shipping_option,
                discount_code: None,
            })
        })?;
        self.orders.clear();

        let outcome = self.totals.reconcile(key).await?;
        self.absorb_totals_outcome(&outcome)?;
        Ok(outcome)
    }

    fn absorb_totals_outcome(&self, outcome: &TotalsOutcome) -> Result<(), CheckoutError> {
        match outcome {
            TotalsOutcome::Reconciled(totals) => self.mutate_state(|state| {
                state.draft.discount_amount = totals.discount_amount;
                Ok(())
            }),
            TotalsOutcome::DiscountRejected { .. } => self.mutate_state(|state| {
                state.draft.discount_code = None;
                state.draft.discount_amount = Decimal::ZERO;
                Ok(())
            }),
            TotalsOutcome::Superseded | TotalsOutcome::EmptyCart => Ok(()),
        }
    }

    /// Opens the pending order for the current draft. Available only at the
    /// payment step; the order service enforces the final precondition guard
    /// and the single-in-flight rule.
    #[instrument(skip(self))]
    pub async fn create_order(&self) -> Result<OrderCreationResult, CheckoutError> {
        self.ensure_step(CheckoutStep::Payment)?;
        let draft = self.read_state(|s| s.draft.clone())?;
        let totals = self.totals.current();
        self.orders.create_order(&draft, totals.as_ref()).await
    }

    /// Hands the pending order to the payment widget. Disabled until an
    /// order exists for the current draft.
    #[instrument(skip(self))]
    pub async fn start_payment(&self) -> Result<(), CheckoutError> {
        self.ensure_step(CheckoutStep::Payment)?;
        let order = self.orders.order_info().ok_or_else(|| {
            CheckoutError::InvalidOperation(
                "Create an order before starting payment".to_string(),
            )
        })?;
        self.payments.begin(&order).await
    }

    /// Awaits the widget's terminal signal for the current initiation.
    pub async fn await_payment_outcome(&self) -> Option<PaymentOutcome> {
        self.payments.next_outcome().await
    }

    /// Drives one payment attempt to its conclusion: waits for the widget,
    /// then verifies on success. Cancellation resolves to `None` with the
    /// order left pending and the step unchanged.
    pub async fn complete_payment(
        &self,
    ) -> Result<Option<PaymentVerificationResult>, CheckoutError> {
        match self.await_payment_outcome().await {
            Some(PaymentOutcome::Success { gateway_reference }) => {
                Ok(Some(self.verify_payment(&gateway_reference).await?))
            }
            Some(PaymentOutcome::Cancelled) | None => Ok(None),
        }
    }

    /// Confirms the charge server-side and finishes the attempt.
    ///
    /// On success the cart is cleared, cached catalog and address data are
    /// invalidated, the draft is destroyed, and the controller becomes
    /// Confirmed. On failure everything is left untouched: the order stays
    /// pending and retry is up to the shopper.
    #[instrument(skip(self))]
    pub async fn verify_payment(
        &self,
        gateway_reference: &str,
    ) -> Result<PaymentVerificationResult, CheckoutError> {
        let order = self.orders.order_info().ok_or_else(|| {
            CheckoutError::InvalidOperation("No pending order to verify".to_string())
        })?;

        match self.payments.verify(&order, gateway_reference).await {
            Ok(result) => {
                self.cart.clear_cart().await;
                self.catalog.invalidate().await?;
                self.addresses.invalidate();
                self.totals.reset();
                self.orders.clear();
                self.mutate_state(|state| {
                    state.step = CheckoutStep::Confirmed;
                    state.draft = CheckoutDraft::default();
                    Ok(())
                })?;
                self.event_sender
                    .send_or_log(Event::PaymentVerified {
                        order_id: order.order_id,
                    })
                    .await;
                info!(order_id = %order.order_id, "Checkout confirmed");
                Ok(result)
            }
            Err(err) => {
                self.event_sender
                    .send_or_log(Event::PaymentVerificationFailed {
                        order_id: order.order_id,
                    })
                    .await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockCommerceApi;
    use crate::config::AppConfig;
    use crate::gateway::MockPaymentGateway;
    use crate::models::SecureTotals;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn saved_address(id: Uuid, is_default: bool) -> Address {
        Address {
            id: Some(id),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            street: "12 Analytical Way".into(),
            city: "Lagos".into(),
            postal_code: "100001".into(),
            country: "NG".into(),
            phone: None,
            is_default,
        }
    }

    fn reconciled(shipping: Decimal) -> SecureTotals {
        let subtotal = dec!(100.00);
        let tax = (subtotal + shipping) * dec!(0.08);
        SecureTotals {
            subtotal,
            shipping,
            tax,
            discount_amount: Decimal::ZERO,
            grand_total: subtotal + shipping + tax,
            discount_code: None,
        }
    }

    struct Harness {
        controller: Arc<CheckoutController>,
        cart: Arc<CartService>,
    }

    fn harness(api: MockCommerceApi, gateway: MockPaymentGateway) -> Harness {
        let api: Arc<dyn crate::api::CommerceApi> = Arc::new(api);
        let (sender, _rx) = crate::events::channel(64);
        let event_sender = Arc::new(sender);
        let config = AppConfig::new("http://localhost:9000", "token", "pk_test_abc");

        let catalog = Arc::new(CatalogService::new(api.clone(), Duration::from_secs(300)));
        let cart = Arc::new(CartService::new(catalog.clone(), event_sender.clone()));
        let addresses = Arc::new(AddressService::new(api.clone()));
        let totals = Arc::new(TotalsService::new(
            api.clone(),
            cart.clone(),
            event_sender.clone(),
        ));
        let orders = Arc::new(OrderService::new(api.clone(), event_sender.clone()));
        let payments = Arc::new(PaymentService::new(
            api.clone(),
            Arc::new(gateway),
            event_sender.clone(),
            &config,
        ));
        let controller = Arc::new(CheckoutController::new(
            cart.clone(),
            catalog,
            addresses,
            totals,
            orders,
            payments,
            event_sender,
        ));

        Harness { controller, cart }
    }

    fn api_with_addresses(addresses: Vec<Address>) -> MockCommerceApi {
        let mut api = MockCommerceApi::new();
        api.expect_list_addresses()
            .returning(move || Ok(addresses.clone()));
        api
    }

    #[tokio::test]
    async fn begin_requires_a_non_empty_cart() {
        let h = harness(MockCommerceApi::new(), MockPaymentGateway::new());
        let err = h.controller.begin().await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert!(h.controller.step().is_none());
    }

    #[tokio::test]
    async fn begin_defaults_to_the_account_default_address() {
        let default_id = Uuid::new_v4();
        let api = api_with_addresses(vec![
            saved_address(Uuid::new_v4(), false),
            saved_address(default_id, true),
        ]);
        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;

        h.controller.begin().await.unwrap();
        assert_eq!(h.controller.step(), Some(CheckoutStep::Address));
        assert_eq!(
            h.controller.address_mode(),
            Some(AddressEntryMode::SavedList {
                selected: Some(default_id)
            })
        );
        let draft = h.controller.draft().unwrap();
        assert_eq!(draft.address.unwrap().id, Some(default_id));
    }

    #[tokio::test]
    async fn begin_with_empty_book_shows_the_entry_form() {
        let h = harness(api_with_addresses(vec![]), MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;

        h.controller.begin().await.unwrap();
        assert_eq!(h.controller.address_mode(), Some(AddressEntryMode::NewForm));
        assert!(h.controller.draft().unwrap().address.is_none());
    }

    #[tokio::test]
    async fn begin_twice_is_rejected() {
        let h = harness(api_with_addresses(vec![]), MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;

        h.controller.begin().await.unwrap();
        let err = h.controller.begin().await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn advancing_requires_an_address() {
        let h = harness(api_with_addresses(vec![]), MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();

        let err = h.controller.next_step().unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert_eq!(h.controller.step(), Some(CheckoutStep::Address));
    }

    #[tokio::test]
    async fn advancing_requires_a_shipping_choice() {
        let api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();

        assert_eq!(h.controller.next_step().unwrap(), CheckoutStep::Shipping);
        let err = h.controller.next_step().unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
    }

    #[tokio::test]
    async fn next_step_is_capped_at_payment() {
        let mut api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        api.expect_calculate_totals()
            .returning(|_| Ok(reconciled(dec!(15.00))));

        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();
        h.controller.next_step().unwrap();
        h.controller
            .select_shipping(ShippingOption::Standard)
            .await
            .unwrap();
        h.controller.next_step().unwrap();
        assert_eq!(h.controller.step(), Some(CheckoutStep::Payment));

        // Cannot auto-advance into Confirmed.
        assert_eq!(h.controller.next_step().unwrap(), CheckoutStep::Payment);
    }

    #[tokio::test]
    async fn prev_step_is_floored_at_address() {
        let api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();

        assert_eq!(h.controller.prev_step().unwrap(), CheckoutStep::Address);
        h.controller.next_step().unwrap();
        assert_eq!(h.controller.prev_step().unwrap(), CheckoutStep::Address);
    }

    #[tokio::test]
    async fn shipping_selection_reconciles_and_merges_partially() {
        let selected_id = Uuid::new_v4();
        let mut api = api_with_addresses(vec![saved_address(selected_id, true)]);
        api.expect_calculate_totals()
            .times(2)
            .returning(|req| match req.shipping_option {
                ShippingOption::Standard => Ok(reconciled(dec!(15.00))),
                ShippingOption::Express => Ok(reconciled(dec!(25.00))),
            });

        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();
        h.controller.next_step().unwrap();

        h.controller
            .select_shipping(ShippingOption::Standard)
            .await
            .unwrap();
        h.controller
            .select_shipping(ShippingOption::Express)
            .await
            .unwrap();

        let draft = h.controller.draft().unwrap();
        // The shipping step owns only the shipping choice; the address the
        // address step wrote is untouched.
        assert_eq!(draft.shipping_option, Some(ShippingOption::Express));
        assert_eq!(draft.address.unwrap().id, Some(selected_id));
    }

    #[tokio::test]
    async fn shipping_selection_outside_its_step_is_rejected() {
        let api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();

        let err = h
            .controller
            .select_shipping(ShippingOption::Standard)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn discount_requires_a_shipping_choice_first() {
        let api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();
        h.controller.next_step().unwrap();

        let err = h.controller.apply_discount("SAVE10").await.unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
    }

    #[tokio::test]
    async fn rejected_discount_is_cleared_from_the_draft() {
        let mut api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        // The authority never echoes the code back.
        api.expect_calculate_totals()
            .returning(|_| Ok(reconciled(dec!(15.00))));

        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();
        h.controller.next_step().unwrap();
        h.controller
            .select_shipping(ShippingOption::Standard)
            .await
            .unwrap();

        let outcome = h.controller.apply_discount("EXPIRED").await.unwrap();
        assert!(matches!(outcome, TotalsOutcome::DiscountRejected { .. }));

        let draft = h.controller.draft().unwrap();
        assert!(draft.discount_code.is_none());
        assert_eq!(draft.discount_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn create_order_requires_the_payment_step() {
        let api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();

        let err = h.controller.create_order().await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn start_payment_requires_an_order() {
        let mut api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        api.expect_calculate_totals()
            .returning(|_| Ok(reconciled(dec!(15.00))));

        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();
        h.controller.next_step().unwrap();
        h.controller
            .select_shipping(ShippingOption::Standard)
            .await
            .unwrap();
        h.controller.next_step().unwrap();

        let err = h.controller.start_payment().await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn verify_without_an_order_is_rejected() {
        let api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();

        let err = h.controller.verify_payment("GW-REF").await.unwrap_err();
        assert!(matches!(err, CheckoutError::InvalidOperation(_)));
    }

    #[tokio::test]
    async fn abandon_discards_the_draft() {
        let api = api_with_addresses(vec![saved_address(Uuid::new_v4(), true)]);
        let h = harness(api, MockPaymentGateway::new());
        h.cart.add_to_cart(Uuid::new_v4(), 1).await;
        h.controller.begin().await.unwrap();

        h.controller.abandon().await;
        assert!(h.controller.step().is_none());
        assert!(h.controller.draft().is_none());
    }
}
