use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use ephemera_types::models::{MessageRecord, MessageStatus};

use crate::error::Result;
use crate::store::{ExpectedState, RecordStore, RecordUpdate, UpdateOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Already marked expired (or otherwise not active) in the store.
    Expired,
    ViewLimitReached,
    /// `created_at + expiration_minutes` has passed.
    TimeElapsed,
}

impl UnavailableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::ViewLimitReached => "view_limit_reached",
            Self::TimeElapsed => "time_elapsed",
        }
    }
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    NotAvailable(UnavailableReason),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Decide whether `record` is still inside its time and view budget.
///
/// Fails closed. The only write it ever issues is marking an elapsed message
/// expired, guarded on the row still being active, so concurrent or repeated
/// evaluations cannot write twice or clobber another writer.
pub fn check_availability<S: RecordStore + ?Sized>(
    store: &S,
    record: &MessageRecord,
    now: DateTime<Utc>,
) -> Result<Availability> {
    if record.status != MessageStatus::Active {
        return Ok(Availability::NotAvailable(UnavailableReason::Expired));
    }

    if record.view_count >= record.view_limit {
        return Ok(Availability::NotAvailable(UnavailableReason::ViewLimitReached));
    }

    if now > record.expires_at() {
        let outcome = store.conditional_update(
            record.id,
            ExpectedState::status(MessageStatus::Active),
            RecordUpdate {
                status: Some(MessageStatus::Expired),
                ..Default::default()
            },
        )?;
        match outcome {
            UpdateOutcome::Applied => info!("Message {} expired by time", record.id),
            UpdateOutcome::Conflict => debug!("Message {} already left active state", record.id),
        }
        return Ok(Availability::NotAvailable(UnavailableReason::TimeElapsed));
    }

    Ok(Availability::Available)
}
