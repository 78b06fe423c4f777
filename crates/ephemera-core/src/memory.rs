use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use ephemera_types::models::{MessageRecord, MessageStatus, NewMessage};

use crate::store::{ExpectedState, RecordStore, RecordUpdate, StoreError, UpdateOutcome};

/// In-process store. Each call takes the map lock once, so a conditional
/// update is a single atomic compare-and-set. Only meaningful when every
/// viewer is served by this process.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, MessageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record verbatim, bypassing id and timestamp assignment.
    pub fn insert(&self, record: MessageRecord) -> Result<(), StoreError> {
        self.lock()?.insert(record.id, record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, MessageRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|e| StoreError::Backend(format!("memory store lock poisoned: {}", e)))
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    fn create(&self, message: NewMessage) -> Result<MessageRecord, StoreError> {
        let record = message.into_record(Uuid::new_v4(), Utc::now());
        self.lock()?.insert(record.id, record.clone());
        Ok(record)
    }

    fn conditional_update(
        &self,
        id: Uuid,
        expected: ExpectedState,
        update: RecordUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut map = self.lock()?;
        match map.get_mut(&id) {
            Some(record) if expected.matches(record) => {
                update.apply(record);
                Ok(UpdateOutcome::Applied)
            }
            _ => Ok(UpdateOutcome::Conflict),
        }
    }

    fn delete_if(&self, id: Uuid, expected: ExpectedState) -> Result<bool, StoreError> {
        let mut map = self.lock()?;
        if !map.get(&id).is_some_and(|record| expected.matches(record)) {
            return Ok(false);
        }
        Ok(map.remove(&id).is_some())
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.lock()?.remove(&id).is_some())
    }

    fn overdue_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let map = self.lock()?;
        Ok(map
            .values()
            .filter(|r| {
                r.destruct_deadline().is_some_and(|deadline| now > deadline)
                    || (r.status == MessageStatus::Active && now > r.expires_at())
            })
            .map(|r| r.id)
            .collect())
    }
}
