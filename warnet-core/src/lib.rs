pub mod clock;
pub mod payment;
pub mod notification;

pub use clock::{Clock, ManualClock, SystemClock};
pub use notification::{BroadcastPublisher, EventPublisher, FanoutPublisher};
pub use payment::{MockPaymentGateway, PaymentConfirmation, PaymentGateway, PaymentMethod, PaymentStatus};

/// Failures raised by collaborators at the edge of the core (storage, brokers, gateways).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("Payment rejected: {0}")]
    PaymentRejected(String),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
