use rusqlite::{Connection, Result};

/// Idempotent schema init — safe to call on every process start.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_short_term_table(conn)?;
    create_long_term_table(conn)?;
    create_fts_index(conn)?;
    Ok(())
}

fn create_short_term_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS short_term_messages (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id    TEXT NOT NULL,
            thread_id    TEXT NOT NULL,
            seq          INTEGER NOT NULL,
            role         TEXT NOT NULL,
            content      TEXT NOT NULL,
            tool_calls   TEXT,
            tool_call_id TEXT,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_st_thread ON short_term_messages(thread_id, seq);",
    )
}

fn create_long_term_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS long_term_memory (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id    TEXT NOT NULL,
            thread_id    TEXT NOT NULL,
            content      TEXT NOT NULL,
            memory_type  TEXT NOT NULL DEFAULT 'long_term',
            tags         TEXT NOT NULL DEFAULT '',
            importance   REAL NOT NULL DEFAULT 0.5,
            access_count INTEGER NOT NULL DEFAULT 0,
            expires_at   TEXT,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_lt_thread ON long_term_memory(tenant_id, thread_id);
        CREATE INDEX IF NOT EXISTS idx_lt_expires ON long_term_memory(expires_at);",
    )
}

/// content='' external-content table, synced manually on write — see
/// conductor-memory's store.rs for the INSERT/DELETE pairing.
fn create_fts_index(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE VIRTUAL TABLE IF NOT EXISTS long_term_fts
            USING fts5(content, tags, content='long_term_memory', content_rowid='id');",
    )
}
