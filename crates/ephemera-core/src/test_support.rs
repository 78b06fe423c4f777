use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use ephemera_types::models::{MessageRecord, MessageStatus, NewMessage};

use crate::memory::MemoryStore;
use crate::store::{ExpectedState, RecordStore, RecordUpdate, StoreError, UpdateOutcome};

/// Active, unrestricted, single-view message created at `created_at`.
pub(crate) fn sample_record(created_at: DateTime<Utc>) -> MessageRecord {
    MessageRecord {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        body: "the launch code is 0000".into(),
        created_at,
        expiration_minutes: 60,
        view_limit: 1,
        view_count: 0,
        status: MessageStatus::Active,
        self_destruct: false,
        self_destruct_timer_seconds: None,
        timer_armed_at: None,
        allowed_recipients: BTreeSet::new(),
        allowed_domains: BTreeSet::new(),
        attachments: vec![],
    }
}

pub(crate) fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `MemoryStore` with injectable faults.
#[derive(Default)]
pub(crate) struct FaultyStore {
    pub inner: MemoryStore,
    /// Every read of this id fails.
    pub unreadable: Option<Uuid>,
    /// Conditional writes time out without touching the row.
    pub writes_time_out: bool,
    /// Served once by the next `get` in place of the live row.
    pub stale: Mutex<Option<MessageRecord>>,
    /// Conditional writes attempted, successful or not.
    pub updates: AtomicUsize,
}

impl RecordStore for FaultyStore {
    fn get(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError> {
        if self.unreadable == Some(id) {
            return Err(StoreError::Backend("corrupt attachments column".into()));
        }
        if let Some(stale) = self.stale.lock().unwrap().take() {
            return Ok(Some(stale));
        }
        self.inner.get(id)
    }

    fn create(&self, message: NewMessage) -> Result<MessageRecord, StoreError> {
        self.inner.create(message)
    }

    fn conditional_update(
        &self,
        id: Uuid,
        expected: ExpectedState,
        update: RecordUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.writes_time_out {
            return Err(StoreError::Timeout);
        }
        self.inner.conditional_update(id, expected, update)
    }

    fn delete_if(&self, id: Uuid, expected: ExpectedState) -> Result<bool, StoreError> {
        self.inner.delete_if(id, expected)
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }

    fn overdue_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        self.inner.overdue_ids(now)
    }
}
