use rusqlite::Connection;

use crate::error::Result;

/// Idempotent schema init — safe to call on every process start.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS tenants (
            tenant_id   TEXT PRIMARY KEY,
            status      TEXT NOT NULL DEFAULT 'active',
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS assistants (
            assistant_id TEXT PRIMARY KEY,
            tenant_id    TEXT NOT NULL,
            status       TEXT NOT NULL DEFAULT 'active',
            name         TEXT NOT NULL,
            occupation   TEXT,
            personality  TEXT,
            industry     TEXT,
            voice_id     TEXT,
            FOREIGN KEY (tenant_id) REFERENCES tenants(tenant_id)
        );
        CREATE INDEX IF NOT EXISTS idx_assistants_tenant ON assistants(tenant_id);

        CREATE TABLE IF NOT EXISTS threads (
            thread_id               TEXT PRIMARY KEY,
            tenant_id               TEXT NOT NULL,
            assistant_id            TEXT,
            status                  TEXT NOT NULL DEFAULT 'idle',
            customer_name           TEXT,
            customer_phone          TEXT,
            last_awakening_at       TEXT,
            awakening_attempt_count INTEGER NOT NULL DEFAULT 0,
            created_at              TEXT NOT NULL,
            FOREIGN KEY (tenant_id) REFERENCES tenants(tenant_id)
        );
        CREATE INDEX IF NOT EXISTS idx_threads_tenant ON threads(tenant_id);
        CREATE INDEX IF NOT EXISTS idx_threads_awakening
            ON threads(status, awakening_attempt_count, last_awakening_at);

        CREATE TABLE IF NOT EXISTS operators (
            operator_id TEXT PRIMARY KEY,
            tenant_id   TEXT NOT NULL,
            role        TEXT NOT NULL DEFAULT 'operator',
            tokens_used_today INTEGER NOT NULL DEFAULT 0,
            tokens_reset_date TEXT,
            max_tokens_per_day INTEGER
        );
        ",
    )?;
    Ok(())
}
