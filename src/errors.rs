use http::StatusCode;

/// Crate-wide error type for the checkout core.
///
/// Validation failures are caught before any network call; structured backend
/// errors keep their HTTP status so callers can distinguish client mistakes
/// from authority-side failures. Discount rejection and widget cancellation
/// are outcomes, not errors, and never appear here.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Order pending: {0}")]
    OrderPending(String),

    #[error("Payment gateway is not ready")]
    GatewayNotReady,

    #[error("Payment verification failed: {0}")]
    PaymentVerification(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Cache error: {0}")]
    Cache(#[from] crate::cache::CacheError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for CheckoutError {
    fn from(err: validator::ValidationErrors) -> Self {
        CheckoutError::Validation(err.to_string())
    }
}

impl CheckoutError {
    /// Whether a retry of the same request could reasonably succeed.
    ///
    /// Only transient transport failures and authority-side 5xx qualify; the
    /// retry policy is wired to read operations exclusively, so mutating
    /// callers never consult this.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { status, .. } => status.is_server_error(),
            _ => false,
        }
    }

    /// Returns the message suitable for showing to the shopper.
    /// Internal failures collapse to a generic message to avoid leaking
    /// implementation details.
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Network problem, please check your connection and retry".to_string()
            }
            Self::Serialization(_) | Self::Cache(_) | Self::Other(_) => {
                "Something went wrong, please try again".to_string()
            }
            Self::Api { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }
}
