use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use ephemera_types::api::{CreateMessageRequest, ExpirationInput};
use ephemera_types::models::{MessageRecord, NewMessage};

use crate::access::{AccessDecision, evaluate_access, normalize_email};
use crate::error::{EngineError, Result};
use crate::expiration::{Availability, check_availability};
use crate::self_destruct::enforce_deadline;
use crate::store::RecordStore;

pub const DEFAULT_VIEW_LIMIT: u32 = 1;
pub const DEFAULT_EXPIRATION_MINUTES: u32 = 60;
/// 30 days.
pub const MAX_EXPIRATION_MINUTES: u32 = 43_200;

/// Validate an owner's request and insert it.
pub fn create_message<S: RecordStore + ?Sized>(
    store: &S,
    owner_id: Uuid,
    req: CreateMessageRequest,
) -> Result<MessageRecord> {
    let message = validate(owner_id, req)?;
    let record = store.create(message)?;
    info!(
        "Message {} created by {} ({} views, {} min)",
        record.id, owner_id, record.view_limit, record.expiration_minutes
    );
    Ok(record)
}

/// Owner-only delete. Supersedes every other state, including an armed
/// timer.
pub fn delete_message<S: RecordStore + ?Sized>(
    store: &S,
    id: Uuid,
    requester_id: Uuid,
) -> Result<()> {
    let record = store.get(id)?.ok_or(EngineError::NotFound)?;
    if record.owner_id != requester_id {
        return Err(EngineError::Forbidden);
    }
    if store.delete(id)? {
        info!("Message {} deleted by owner", id);
    }
    Ok(())
}

/// Read a message for display without consuming budget. Past-deadline
/// messages are deleted on the way.
pub fn preview<S: RecordStore + ?Sized>(
    store: &S,
    id: Uuid,
    now: DateTime<Utc>,
) -> Result<(MessageRecord, Availability)> {
    let record = store.get(id)?.ok_or(EngineError::NotFound)?;
    if enforce_deadline(store, &record, now)? {
        return Err(EngineError::NotFound);
    }
    let availability = check_availability(store, &record, now)?;
    Ok((record, availability))
}

/// Access pre-check for a viewer. Reveal repeats this check inside its own
/// transaction, so a grant here promises nothing.
pub fn check_access<S: RecordStore + ?Sized>(
    store: &S,
    id: Uuid,
    viewer_email: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AccessDecision> {
    let (record, availability) = preview(store, id, now)?;
    if let Availability::NotAvailable(reason) = availability {
        return Err(EngineError::Expired(reason));
    }
    Ok(evaluate_access(&record, viewer_email))
}

fn validate(owner_id: Uuid, req: CreateMessageRequest) -> Result<NewMessage> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(EngineError::Invalid("message body is empty".into()));
    }

    let view_limit = req.view_limit.unwrap_or(DEFAULT_VIEW_LIMIT);
    if view_limit == 0 {
        return Err(EngineError::Invalid("view limit must be at least 1".into()));
    }

    let expiration_minutes = match req.expiration {
        None => DEFAULT_EXPIRATION_MINUTES,
        Some(ExpirationInput::Minutes(m)) => m,
        Some(ExpirationInput::Text(text)) => parse_duration_minutes(&text)?,
    };
    if expiration_minutes == 0 {
        return Err(EngineError::Invalid("duration must be greater than 0".into()));
    }
    if expiration_minutes > MAX_EXPIRATION_MINUTES {
        return Err(EngineError::Invalid("duration cannot exceed 30 days".into()));
    }

    let self_destruct_timer_seconds = if req.self_destruct {
        req.self_destruct_timer_seconds
    } else {
        None
    };
    if self_destruct_timer_seconds == Some(0) {
        return Err(EngineError::Invalid("self-destruct timer must be at least 1 second".into()));
    }

    let allowed_recipients = req
        .allowed_recipients
        .iter()
        .map(|raw| normalize_recipient(raw))
        .collect::<Result<BTreeSet<_>>>()?;
    let allowed_domains = req
        .allowed_domains
        .iter()
        .map(|raw| normalize_domain(raw))
        .collect::<Result<BTreeSet<_>>>()?;

    Ok(NewMessage {
        owner_id,
        body: body.to_string(),
        expiration_minutes,
        view_limit,
        self_destruct: req.self_destruct,
        self_destruct_timer_seconds,
        allowed_recipients,
        allowed_domains,
        attachments: req.attachments,
    })
}

fn normalize_recipient(raw: &str) -> Result<String> {
    let invalid = || EngineError::Invalid(format!("invalid recipient email: {}", raw.trim()));
    let email = normalize_email(raw).ok_or_else(invalid)?;
    let domain = email.split_once('@').map(|(_, d)| d).unwrap_or_default();
    if email.chars().any(char::is_whitespace) || !is_hostname(domain) {
        return Err(invalid());
    }
    Ok(email)
}

/// Domains are stored as `@example.com`. A bare `example.com` is accepted.
fn normalize_domain(raw: &str) -> Result<String> {
    let lowered = raw.trim().to_lowercase();
    let host = lowered.strip_prefix('@').unwrap_or(&lowered);
    if host.contains('@') || host.chars().any(char::is_whitespace) || !is_hostname(host) {
        return Err(EngineError::Invalid(format!("invalid domain: {}", raw.trim())));
    }
    Ok(format!("@{}", host))
}

fn is_hostname(host: &str) -> bool {
    host.contains('.') && host.split('.').all(|label| !label.is_empty())
}

/// Parse durations like `"1d 5h 30m"`, `"90m"` or `"2h"` into minutes.
/// Each unit may appear once, in day-hour-minute order.
pub fn parse_duration_minutes(input: &str) -> Result<u32> {
    let invalid = || EngineError::Invalid("please use format: 1d 5h 30m".into());

    let mut total: u64 = 0;
    let mut last_unit = 0u8;
    let mut digits = String::new();

    for c in input.trim().chars() {
        match c {
            '0'..='9' => digits.push(c),
            c if c.is_whitespace() && digits.is_empty() => {}
            'd' | 'D' | 'h' | 'H' | 'm' | 'M' => {
                let (rank, factor) = match c.to_ascii_lowercase() {
                    'd' => (1, 24 * 60),
                    'h' => (2, 60),
                    _ => (3, 1),
                };
                if digits.is_empty() || rank <= last_unit {
                    return Err(invalid());
                }
                let value: u64 = digits.parse().map_err(|_| invalid())?;
                total = total.saturating_add(value.saturating_mul(factor));
                last_unit = rank;
                digits.clear();
            }
            _ => return Err(invalid()),
        }
    }

    if !digits.is_empty() || last_unit == 0 {
        return Err(invalid());
    }

    Ok(u32::try_from(total).unwrap_or(u32::MAX))
}
