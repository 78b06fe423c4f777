use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of a stored message.
///
/// `Destroyed` is never written to a store: a destroyed message is a message
/// whose row is gone. It exists so callers can name that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Active,
    Expired,
    Destroyed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Destroyed => "destroyed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            "destroyed" => Some(Self::Destroyed),
            _ => None,
        }
    }
}

/// Attachment metadata. The bytes live in an external object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub body: String,
    /// Assigned by the store on insert, never rewritten.
    pub created_at: DateTime<Utc>,
    pub expiration_minutes: u32,
    pub view_limit: u32,
    pub view_count: u32,
    pub status: MessageStatus,
    pub self_destruct: bool,
    pub self_destruct_timer_seconds: Option<u32>,
    pub timer_armed_at: Option<DateTime<Utc>>,
    pub allowed_recipients: BTreeSet<String>,
    pub allowed_domains: BTreeSet<String>,
    pub attachments: Vec<Attachment>,
}

impl MessageRecord {
    /// Absolute instant after which the message is no longer readable.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.created_at + Duration::minutes(i64::from(self.expiration_minutes))
    }

    pub fn views_remaining(&self) -> u32 {
        self.view_limit.saturating_sub(self.view_count)
    }

    /// Self-destruct on reveal with no countdown: the reveal itself deletes.
    pub fn destroys_on_reveal(&self) -> bool {
        self.self_destruct && self.self_destruct_timer_seconds.is_none()
    }

    /// Countdown length, only when the message self-destructs on a timer.
    pub fn destruct_timer(&self) -> Option<Duration> {
        if !self.self_destruct {
            return None;
        }
        self.self_destruct_timer_seconds
            .map(|secs| Duration::seconds(i64::from(secs)))
    }

    /// Persisted deletion deadline, present once the timer has been armed.
    pub fn destruct_deadline(&self) -> Option<DateTime<Utc>> {
        let armed_at = self.timer_armed_at?;
        self.destruct_timer().map(|timer| armed_at + timer)
    }

    pub fn has_access_policy(&self) -> bool {
        !self.allowed_recipients.is_empty() || !self.allowed_domains.is_empty()
    }
}

/// A validated message ready to be inserted. The store assigns `id` and
/// `created_at`; everything else is fixed here.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub owner_id: Uuid,
    pub body: String,
    pub expiration_minutes: u32,
    pub view_limit: u32,
    pub self_destruct: bool,
    pub self_destruct_timer_seconds: Option<u32>,
    pub allowed_recipients: BTreeSet<String>,
    pub allowed_domains: BTreeSet<String>,
    pub attachments: Vec<Attachment>,
}

impl NewMessage {
    /// Materialise the record a store would hold right after insertion.
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            id,
            owner_id: self.owner_id,
            body: self.body,
            created_at,
            expiration_minutes: self.expiration_minutes,
            view_limit: self.view_limit,
            view_count: 0,
            status: MessageStatus::Active,
            self_destruct: self.self_destruct,
            self_destruct_timer_seconds: self.self_destruct_timer_seconds,
            timer_armed_at: None,
            allowed_recipients: self.allowed_recipients,
            allowed_domains: self.allowed_domains,
            attachments: self.attachments,
        }
    }
}
