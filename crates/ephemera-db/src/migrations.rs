use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (messages)");
        conn.execute_batch(
            "
            CREATE TABLE messages (
                id                          TEXT PRIMARY KEY,
                owner_id                    TEXT NOT NULL,
                body                        TEXT NOT NULL,
                created_at                  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                expiration_minutes          INTEGER NOT NULL CHECK (expiration_minutes > 0),
                view_limit                  INTEGER NOT NULL CHECK (view_limit >= 1),
                view_count                  INTEGER NOT NULL DEFAULT 0
                                            CHECK (view_count >= 0 AND view_count <= view_limit),
                status                      TEXT NOT NULL DEFAULT 'active'
                                            CHECK (status IN ('active', 'expired')),
                self_destruct               INTEGER NOT NULL DEFAULT 0,
                self_destruct_timer_seconds INTEGER,
                timer_armed_at              TEXT,
                allowed_recipients          TEXT NOT NULL DEFAULT '[]',
                allowed_domains             TEXT NOT NULL DEFAULT '[]',
                attachments                 TEXT NOT NULL DEFAULT '[]'
            );

            CREATE INDEX idx_messages_owner
                ON messages(owner_id, created_at);

            CREATE INDEX idx_messages_armed
                ON messages(timer_armed_at) WHERE timer_armed_at IS NOT NULL;

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
