use chrono::{DateTime, Utc};
use rusqlite::ErrorCode;
use tracing::warn;
use uuid::Uuid;

use ephemera_core::{ExpectedState, RecordStore, RecordUpdate, StoreError, UpdateOutcome};
use ephemera_types::models::{MessageRecord, NewMessage};

use crate::Database;

/// SQLITE_BUSY / SQLITE_LOCKED after `busy_timeout` elapsed is the store
/// timing out; everything else is a backend failure.
fn store_error(err: anyhow::Error) -> StoreError {
    match err.downcast_ref::<rusqlite::Error>() {
        Some(rusqlite::Error::SqliteFailure(e, _))
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            StoreError::Timeout
        }
        _ => StoreError::Backend(format!("{:#}", err)),
    }
}

impl RecordStore for Database {
    fn get(&self, id: Uuid) -> Result<Option<MessageRecord>, StoreError> {
        self.get_message(&id.to_string()).map_err(store_error)
    }

    fn create(&self, message: NewMessage) -> Result<MessageRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.insert_message(&id, &message).map_err(store_error)?;
        self.get_message_fresh(&id)
            .map_err(store_error)?
            .ok_or_else(|| StoreError::Backend(format!("message {} vanished after insert", id)))
    }

    fn conditional_update(
        &self,
        id: Uuid,
        expected: ExpectedState,
        update: RecordUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let applied = self
            .update_message_if(&id.to_string(), expected, update)
            .map_err(store_error)?;
        Ok(if applied {
            UpdateOutcome::Applied
        } else {
            UpdateOutcome::Conflict
        })
    }

    fn delete_if(&self, id: Uuid, expected: ExpectedState) -> Result<bool, StoreError> {
        self.delete_message_if(&id.to_string(), expected).map_err(store_error)
    }

    fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        self.delete_message(&id.to_string()).map_err(store_error)
    }

    fn overdue_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, StoreError> {
        let ids = self.overdue_message_ids(now).map_err(store_error)?;
        Ok(ids
            .into_iter()
            .filter_map(|raw| match raw.parse() {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!("Skipping corrupt message id '{}': {}", raw, e);
                    None
                }
            })
            .collect())
    }
}
