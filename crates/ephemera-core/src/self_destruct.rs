use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ephemera_types::models::{MessageRecord, MessageStatus};

use crate::error::{EngineError, Result};
use crate::expiration::{Availability, check_availability};
use crate::reveal::MAX_CONFLICT_ROUNDS;
use crate::store::{ExpectedState, RecordStore, RecordUpdate, UpdateOutcome};

/// Delete `record` if its armed deadline has passed.
///
/// Returns `true` when the message is gone, whether this call removed it or
/// another caller got there first. Every read path calls this before
/// trusting a record, so deletion never depends on a viewer's countdown.
pub fn enforce_deadline<S: RecordStore + ?Sized>(
    store: &S,
    record: &MessageRecord,
    now: DateTime<Utc>,
) -> Result<bool> {
    match record.destruct_deadline() {
        Some(deadline) if now > deadline => {
            if store.delete(record.id)? {
                info!("Message {} self-destructed (deadline {})", record.id, deadline);
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Arm the self-destruct countdown for `id` and return its deadline.
///
/// Arming happens at most once: if the timer is already armed the persisted
/// deadline is returned unchanged.
pub fn arm_self_destruct<S: RecordStore + ?Sized>(
    store: &S,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    for _ in 0..MAX_CONFLICT_ROUNDS {
        let record = store.get(id)?.ok_or(EngineError::NotFound)?;

        if enforce_deadline(store, &record, now)? {
            return Err(EngineError::NotFound);
        }
        let Some(timer) = record.destruct_timer() else {
            return Err(EngineError::NotArmable);
        };
        if let Some(deadline) = record.destruct_deadline() {
            return Ok(deadline);
        }
        if let Availability::NotAvailable(reason) = check_availability(store, &record, now)? {
            return Err(EngineError::Expired(reason));
        }

        let expected = ExpectedState {
            status: MessageStatus::Active,
            view_count: None,
            timer_unarmed: true,
        };
        let update = RecordUpdate {
            timer_armed_at: Some(now),
            ..Default::default()
        };
        match store.conditional_update(id, expected, update)? {
            UpdateOutcome::Applied => {
                let deadline = now + timer;
                info!("Self-destruct armed for {} (deadline {})", id, deadline);
                return Ok(deadline);
            }
            UpdateOutcome::Conflict => debug!("Arming {} raced another writer, re-reading", id),
        }
    }

    warn!("Gave up arming {} after {} conflicting rounds", id, MAX_CONFLICT_ROUNDS);
    Err(EngineError::Conflict)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub destroyed: usize,
    pub expired: usize,
    /// Ids the pass could not act on. They are retried on the next pass.
    pub failed: usize,
}

/// One server-side pass over overdue messages: delete everything past its
/// armed deadline and mark time-elapsed messages expired.
///
/// Each id is re-read before acting, so a sweep racing live viewers only ever
/// applies the same guarded writes they would. A failure on one id is logged
/// and counted; it never stops the rest of the pass.
pub fn sweep<S: RecordStore + ?Sized>(store: &S, now: DateTime<Utc>) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    for id in store.overdue_ids(now)? {
        match sweep_one(store, id, now) {
            Ok(Swept::Destroyed) => report.destroyed += 1,
            Ok(Swept::Expired) => report.expired += 1,
            Ok(Swept::Untouched) => {}
            Err(e) => {
                warn!("Sweep skipped message {}: {}", id, e);
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

enum Swept {
    Destroyed,
    Expired,
    Untouched,
}

fn sweep_one<S: RecordStore + ?Sized>(store: &S, id: Uuid, now: DateTime<Utc>) -> Result<Swept> {
    let Some(record) = store.get(id)? else {
        return Ok(Swept::Untouched);
    };

    if enforce_deadline(store, &record, now)? {
        return Ok(Swept::Destroyed);
    }

    let was_active = record.status == MessageStatus::Active;
    if !check_availability(store, &record, now)?.is_available() && was_active {
        return Ok(Swept::Expired);
    }
    Ok(Swept::Untouched)
}
