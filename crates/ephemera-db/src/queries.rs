use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use ephemera_core::{ExpectedState, RecordUpdate};
use ephemera_types::models::{MessageRecord, NewMessage};

use crate::Database;
use crate::models::{MessageRow, format_timestamp};

const MESSAGE_COLUMNS: &str = "id, owner_id, body, created_at, expiration_minutes, view_limit, \
     view_count, status, self_destruct, self_destruct_timer_seconds, timer_armed_at, \
     allowed_recipients, allowed_domains, attachments";

impl Database {
    // -- Messages --

    /// Insert a message. `created_at` comes from SQLite's clock, not ours.
    pub fn insert_message(&self, id: &str, message: &NewMessage) -> Result<()> {
        let recipients = serde_json::to_string(&message.allowed_recipients)?;
        let domains = serde_json::to_string(&message.allowed_domains)?;
        let attachments = serde_json::to_string(&message.attachments)?;

        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO messages (id, owner_id, body, expiration_minutes, view_limit,
                    self_destruct, self_destruct_timer_seconds,
                    allowed_recipients, allowed_domains, attachments)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    id,
                    message.owner_id.to_string(),
                    &message.body,
                    message.expiration_minutes,
                    message.view_limit,
                    message.self_destruct,
                    message.self_destruct_timer_seconds,
                    recipients,
                    domains,
                    attachments,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRecord>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Read through the writer connection, for read-after-write on insert.
    pub fn get_message_fresh(&self, id: &str) -> Result<Option<MessageRecord>> {
        self.with_conn_mut(|conn| query_message(conn, id))
    }

    /// Compare-and-set on a single row. Returns whether the row matched
    /// `expected` and was updated; the check and the write are one statement.
    pub fn update_message_if(
        &self,
        id: &str,
        expected: ExpectedState,
        update: RecordUpdate,
    ) -> Result<bool> {
        let armed_at = update.timer_armed_at.map(format_timestamp);

        let changed = self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "UPDATE messages SET
                    view_count     = COALESCE(?1, view_count),
                    status         = COALESCE(?2, status),
                    timer_armed_at = COALESCE(?3, timer_armed_at)
                 WHERE id = ?4
                   AND status = ?5
                   AND (?6 IS NULL OR view_count = ?6)
                   AND (?7 = 0 OR timer_armed_at IS NULL)",
                params![
                    update.view_count,
                    update.status.map(|s| s.as_str()),
                    armed_at,
                    id,
                    expected.status.as_str(),
                    expected.view_count,
                    expected.timer_unarmed,
                ],
            )?)
        })?;

        Ok(changed == 1)
    }

    /// Delete a row only while it still matches `expected`, in one statement.
    pub fn delete_message_if(&self, id: &str, expected: ExpectedState) -> Result<bool> {
        let changed = self.with_conn_mut(|conn| {
            Ok(conn.execute(
                "DELETE FROM messages
                 WHERE id = ?1
                   AND status = ?2
                   AND (?3 IS NULL OR view_count = ?3)
                   AND (?4 = 0 OR timer_armed_at IS NULL)",
                params![
                    id,
                    expected.status.as_str(),
                    expected.view_count,
                    expected.timer_unarmed,
                ],
            )?)
        })?;
        Ok(changed == 1)
    }

    /// Returns `true` if this call removed the row.
    pub fn delete_message(&self, id: &str) -> Result<bool> {
        let changed = self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM messages WHERE id = ?1", [id])?)
        })?;
        Ok(changed > 0)
    }

    /// Messages past their armed self-destruct deadline, or past their
    /// absolute expiry while still marked active.
    pub fn overdue_message_ids(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let now = format_timestamp(now);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM messages
                 WHERE (self_destruct = 1
                        AND timer_armed_at IS NOT NULL
                        AND self_destruct_timer_seconds IS NOT NULL
                        AND strftime('%Y-%m-%dT%H:%M:%fZ', timer_armed_at,
                                     '+' || self_destruct_timer_seconds || ' seconds') < ?1)
                    OR (status = 'active'
                        AND strftime('%Y-%m-%dT%H:%M:%fZ', created_at,
                                     '+' || expiration_minutes || ' minutes') < ?1)",
            )?;
            let ids = stmt
                .query_map([&now], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRecord>> {
    let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
    let row = conn.query_row(&sql, [id], map_row).optional()?;
    row.map(MessageRow::into_record).transpose()
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        body: row.get(2)?,
        created_at: row.get(3)?,
        expiration_minutes: row.get(4)?,
        view_limit: row.get(5)?,
        view_count: row.get(6)?,
        status: row.get(7)?,
        self_destruct: row.get(8)?,
        self_destruct_timer_seconds: row.get(9)?,
        timer_armed_at: row.get(10)?,
        allowed_recipients: row.get(11)?,
        allowed_domains: row.get(12)?,
        attachments: row.get(13)?,
    })
}
