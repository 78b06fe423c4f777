use thiserror::Error;
use tracing::warn;

use crate::expiration::UnavailableReason;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Absent, or already destroyed.
    #[error("message not found")]
    NotFound,

    #[error("message is no longer available: {0}")]
    Expired(UnavailableReason),

    #[error("viewer is not permitted by the message access policy")]
    Denied,

    /// Lost a concurrent transaction race. Re-fetch before trying again.
    #[error("message changed concurrently")]
    Conflict,

    /// Store transport or infrastructure failure. Detail is logged, never
    /// returned.
    #[error("message store unavailable")]
    StoreUnavailable,

    #[error("only the owner may do this")]
    Forbidden,

    #[error("invalid message: {0}")]
    Invalid(String),

    #[error("message has no self-destruct timer")]
    NotArmable,
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        warn!("Store call failed: {}", err);
        EngineError::StoreUnavailable
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
