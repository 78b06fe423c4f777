//! Database row types. These map directly to SQLite rows and are converted
//! into `ephemera_types` models at the edge so the schema can evolve on its
//! own.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use ephemera_types::models::{MessageRecord, MessageStatus};

pub struct MessageRow {
    pub id: String,
    pub owner_id: String,
    pub body: String,
    pub created_at: String,
    pub expiration_minutes: i64,
    pub view_limit: i64,
    pub view_count: i64,
    pub status: String,
    pub self_destruct: bool,
    pub self_destruct_timer_seconds: Option<i64>,
    pub timer_armed_at: Option<String>,
    pub allowed_recipients: String,
    pub allowed_domains: String,
    pub attachments: String,
}

impl MessageRow {
    pub fn into_record(self) -> Result<MessageRecord> {
        let id = self.id.parse().with_context(|| format!("corrupt message id '{}'", self.id))?;
        Ok(MessageRecord {
            id,
            owner_id: self
                .owner_id
                .parse()
                .with_context(|| format!("corrupt owner_id on message '{}'", self.id))?,
            body: self.body,
            created_at: parse_timestamp(&self.created_at)?,
            expiration_minutes: u32::try_from(self.expiration_minutes)?,
            view_limit: u32::try_from(self.view_limit)?,
            view_count: u32::try_from(self.view_count)?,
            status: MessageStatus::parse(&self.status).ok_or_else(|| {
                anyhow!("corrupt status '{}' on message '{}'", self.status, self.id)
            })?,
            self_destruct: self.self_destruct,
            self_destruct_timer_seconds: self
                .self_destruct_timer_seconds
                .map(u32::try_from)
                .transpose()?,
            timer_armed_at: self.timer_armed_at.as_deref().map(parse_timestamp).transpose()?,
            allowed_recipients: serde_json::from_str(&self.allowed_recipients)?,
            allowed_domains: serde_json::from_str(&self.allowed_domains)?,
            attachments: serde_json::from_str(&self.attachments)?,
        })
    }
}

/// Timestamps are stored as RFC 3339 with millisecond precision, which is
/// also what SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ')` produces, so text
/// comparison orders them correctly.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by hand may use SQLite's "YYYY-MM-DD HH:MM:SS" form.
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}
