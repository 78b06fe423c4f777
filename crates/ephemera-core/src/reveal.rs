use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use ephemera_types::models::{Attachment, MessageRecord, MessageStatus};

use crate::access::evaluate_access;
use crate::error::{EngineError, Result};
use crate::expiration::{Availability, check_availability};
use crate::self_destruct::enforce_deadline;
use crate::store::{ExpectedState, RecordStore, RecordUpdate, UpdateOutcome};

/// Upper bound on re-evaluations after losing a conditional write. Every lost
/// round means another writer consumed budget, so this is only reached under
/// pathological contention.
pub const MAX_CONFLICT_ROUNDS: usize = 64;

/// Who is asking. The email is untrusted input.
#[derive(Debug, Clone, Default)]
pub struct ViewerContext {
    pub email: Option<String>,
}

impl ViewerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
        }
    }
}

/// A granted reveal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revelation {
    pub body: String,
    pub attachments: Vec<Attachment>,
    /// Persisted self-destruct deadline, when the message runs on a timer.
    pub expiry_deadline: Option<DateTime<Utc>>,
    pub views_remaining: u32,
    /// The reveal itself deleted the message.
    pub destroyed: bool,
}

/// Reveal message `id` to `viewer`, consuming one unit of view budget.
///
/// The consume step is a single conditional write pinned to the state every
/// gate was evaluated against. Losing that write sends the caller back to a
/// fresh read and a full re-evaluation; the stale read is never reused. Store
/// failures are returned as-is and never retried here, since a timed-out
/// write may already have consumed budget.
pub fn reveal<S: RecordStore + ?Sized>(
    store: &S,
    id: Uuid,
    viewer: &ViewerContext,
    now: DateTime<Utc>,
) -> Result<Revelation> {
    for round in 1..=MAX_CONFLICT_ROUNDS {
        let record = store.get(id)?.ok_or(EngineError::NotFound)?;

        match attempt(store, record, viewer, now)? {
            Some(revelation) => return Ok(revelation),
            None => debug!("Reveal of {} lost round {}, re-evaluating", id, round),
        }
    }

    warn!("Reveal of {} gave up after {} conflicting rounds", id, MAX_CONFLICT_ROUNDS);
    Err(EngineError::Conflict)
}

/// One gated attempt against a freshly read record. `Ok(None)` means the
/// conditional write lost a race.
fn attempt<S: RecordStore + ?Sized>(
    store: &S,
    record: MessageRecord,
    viewer: &ViewerContext,
    now: DateTime<Utc>,
) -> Result<Option<Revelation>> {
    if enforce_deadline(store, &record, now)? {
        return Err(EngineError::NotFound);
    }

    if let Availability::NotAvailable(reason) = check_availability(store, &record, now)? {
        return Err(EngineError::Expired(reason));
    }

    if !evaluate_access(&record, viewer.email.as_deref()).is_granted() {
        return Err(EngineError::Denied);
    }

    if record.destroys_on_reveal() {
        // Only the caller whose delete removed the row is granted, and only
        // while the row is still the one the gates above passed.
        if !store.delete_if(record.id, ExpectedState::observed(&record))? {
            return Ok(None);
        }
        info!("Message {} revealed and destroyed", record.id);
        return Ok(Some(Revelation {
            body: record.body,
            attachments: record.attachments,
            expiry_deadline: None,
            views_remaining: 0,
            destroyed: true,
        }));
    }

    let view_count = record.view_count + 1;
    let status = if view_count >= record.view_limit {
        MessageStatus::Expired
    } else {
        MessageStatus::Active
    };
    let arms_timer = record.destruct_timer().is_some() && record.timer_armed_at.is_none();
    let update = RecordUpdate {
        view_count: Some(view_count),
        status: Some(status),
        timer_armed_at: arms_timer.then_some(now),
    };

    match store.conditional_update(record.id, ExpectedState::observed(&record), update)? {
        UpdateOutcome::Applied => {
            let mut record = record;
            update.apply(&mut record);
            if arms_timer {
                info!(
                    "Self-destruct armed for {} on first reveal (deadline {:?})",
                    record.id,
                    record.destruct_deadline()
                );
            }
            debug!("Message {} revealed ({}/{})", record.id, record.view_count, record.view_limit);
            Ok(Some(Revelation {
                expiry_deadline: record.destruct_deadline(),
                views_remaining: record.views_remaining(),
                body: record.body,
                attachments: record.attachments,
                destroyed: false,
            }))
        }
        UpdateOutcome::Conflict => Ok(None),
    }
}
