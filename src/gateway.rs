//! Boundary to the externally hosted payment widget.
//!
//! The widget collects card details itself; this crate only hands it the
//! charge parameters and receives exactly one terminal signal per attempt.

use async_trait::async_trait;
use serde::Serialize;

/// Parameters handed to the hosted widget when a charge begins.
///
/// `amount_minor` is the authoritative order total in minor currency units as
/// returned by order creation. No client-side arithmetic produces it.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayRequest {
    pub public_key: String,
    pub email: String,
    pub amount_minor: i64,
    pub reference: String,
    pub currency: String,
}

/// Terminal signal of one widget interaction. Closing the widget is a normal
/// outcome, not an error; the pending order survives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Success { reference: String },
    Closed,
}

/// The hosted payment widget. Implementations wrap the vendor's embed; tests
/// script it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens the widget for one charge attempt and resolves with its
    /// terminal outcome.
    async fn open(&self, request: GatewayRequest) -> GatewayOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_minor_units_as_integer() {
        let request = GatewayRequest {
            public_key: "pk_test_abc".into(),
            email: "ada@example.com".into(),
            amount_minor: 11340,
            reference: "PSK-REF-001".into(),
            currency: "USD".into(),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["amount_minor"], 11340);
        assert_eq!(json["reference"], "PSK-REF-001");
    }

    #[test]
    fn closed_is_not_success() {
        assert_ne!(
            GatewayOutcome::Closed,
            GatewayOutcome::Success {
                reference: "r".into()
            }
        );
    }
}
