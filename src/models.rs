//! Domain and wire types for the cart and checkout core.
//!
//! Monetary amounts are `Decimal` end to end; the only minor-unit integer is
//! `order_total_cents`, which arrives from the pricing authority and is handed
//! to the payment gateway untouched. Wire-facing types use camelCase field
//! names to match the storefront backend.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// One (product, quantity) pair in the active session's cart.
/// Unique by product; quantity is always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
}

/// Cached catalog read used to resolve cart lines into priced detail rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub available_stock: i32,
}

/// A cart line joined with its product snapshot.
///
/// `subtotal` is derived locally and feeds the non-authoritative cart
/// estimate only; reconciled totals always come from the pricing authority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartDetail {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub available_stock: i32,
    pub subtotal: Decimal,
}

impl CartDetail {
    pub fn from_parts(line: CartLine, snapshot: ProductSnapshot) -> Self {
        let subtotal = snapshot.price * Decimal::from(line.quantity);
        Self {
            product_id: line.product_id,
            name: snapshot.name,
            quantity: line.quantity,
            unit_price: snapshot.price,
            available_stock: snapshot.available_stock,
            subtotal,
        }
    }
}

/// Shipping or billing address as held in the account address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Postal code is required"))]
    pub postal_code: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

/// The two shipping choices the storefront offers. The authoritative fee for
/// each comes from the pricing authority, never from this enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ShippingOption {
    Standard,
    Express,
}

/// Mutable bundle of choices for one checkout attempt.
///
/// Created when checkout begins, destroyed on success or abandonment.
/// `discount_amount` mirrors the most recently accepted reconciled totals; a
/// set `discount_code` is a request until the authority echoes it back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckoutDraft {
    pub address: Option<Address>,
    pub shipping_option: Option<ShippingOption>,
    pub discount_code: Option<String>,
    pub discount_amount: Decimal,
}

impl CheckoutDraft {
    /// The reconciliation key for the draft's current inputs, if a shipping
    /// option has been chosen.
    pub fn totals_key(&self) -> Option<TotalsKey> {
        self.shipping_option.map(|shipping_option| TotalsKey {
            shipping_option,
            discount_code: self.discount_code.clone(),
        })
    }
}

/// Logical key of one totals reconciliation request. A response whose key has
/// been superseded is discarded regardless of arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TotalsKey {
    pub shipping_option: ShippingOption,
    pub discount_code: Option<String>,
}

/// Authoritative price breakdown computed by the pricing authority.
///
/// Never derived client-side, never cached across input changes. An absent
/// `discount_code` with a zero `discount_amount` means any requested code was
/// rejected server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecureTotals {
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    pub grand_total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_code: Option<String>,
}

/// Body of `POST /cart/calculate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateTotalsRequest {
    pub shipping_option: ShippingOption,
    pub discount_code: Option<String>,
}

/// Body of `POST /checkout/order`. The authority re-validates discount and
/// stock itself; the client's discount amount is deliberately not sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_address: Address,
    pub shipping_option: ShippingOption,
    pub discount_code: Option<String>,
}

/// Result of opening a pending order. Immutable once obtained; at most one
/// unverified result is held per checkout attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreationResult {
    pub order_id: Uuid,
    pub order_total: Decimal,
    pub order_total_cents: i64,
    pub user_email: String,
    pub payment_reference: String,
}

/// Body of `POST /checkout/paystack-verify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub reference: String,
    pub order_id: Uuid,
}

/// Outcome of charge confirmation for one order and gateway reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentVerificationResult {
    pub order_id: Uuid,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
