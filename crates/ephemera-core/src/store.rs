use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use ephemera_types::models::{MessageRecord, MessageStatus, NewMessage};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store did not answer within its own timeout. The outcome of a
    /// write that timed out is unknown.
    #[error("store timed out")]
    Timeout,

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Precondition for a conditional write. Every populated field must match the
/// stored row or the write is rejected with `UpdateOutcome::Conflict`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedState {
    pub status: MessageStatus,
    pub view_count: Option<u32>,
    /// Require `timer_armed_at` to still be unset.
    pub timer_unarmed: bool,
}

impl ExpectedState {
    /// Guard that only cares about the status column.
    pub fn status(status: MessageStatus) -> Self {
        Self {
            status,
            view_count: None,
            timer_unarmed: false,
        }
    }

    /// Guard pinned to everything a reveal decision was based on.
    pub fn observed(record: &MessageRecord) -> Self {
        Self {
            status: record.status,
            view_count: Some(record.view_count),
            timer_unarmed: record.timer_armed_at.is_none(),
        }
    }

    pub fn matches(&self, record: &MessageRecord) -> bool {
        record.status == self.status
            && self.view_count.is_none_or(|vc| vc == record.view_count)
            && (!self.timer_unarmed || record.timer_armed_at.is_none())
    }
}

/// Fields a conditional write may change. `None` leaves a column untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    pub view_count: Option<u32>,
    pub status: Option<MessageStatus>,
    pub timer_armed_at: Option<DateTime<Utc>>,
}

impl RecordUpdate {
    pub fn apply(&self, record: &mut MessageRecord) {
        if let Some(vc) = self.view_count {
            record.view_count = vc;
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(at) = self.timer_armed_at {
            record.timer_armed_at = Some(at);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Applied,
    /// The row changed (or vanished) since it was read. Re-fetch before
    /// deciding anything else.
    Conflict,
}

/// Persistent message storage.
///
/// Implementations must make `conditional_update` and `delete` atomic per
/// record across every process sharing the backend. Nothing in the core
/// holds locks of its own.
pub trait RecordStore: Send + Sync {
    fn get(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError>;

    /// Insert a message, assigning its id and `created_at` from the store's
    /// clock.
    fn create(&self, message: NewMessage) -> Result<MessageRecord, StoreError>;

    fn conditional_update(
        &self,
        id: Uuid,
        expected: ExpectedState,
        update: RecordUpdate,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Remove a message only while it still matches `expected`. Returns `true`
    /// only for the call that removed the row; a mismatch or an absent row
    /// gives `false`.
    fn delete_if(&self, id: Uuid, expected: ExpectedState) -> Result<bool, StoreError>;

    /// Remove a message. Returns `true` only for the call that actually
    /// removed the row; deleting an absent row succeeds with `false`.
    fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Ids whose armed deadline has passed or whose absolute expiry has
    /// passed while still active.
    fn overdue_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError>;
}
