use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use conductor_core::config::MemoryConfig;
use conductor_core::types::{Message, MessageContent, MessageRole};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{MemoryError, Result};
use crate::types::{ContextBundle, LongTermEntry, MemoryType};

/// Summarization is delegated to whatever calls into the tool & LLM gateway
/// so this crate never depends on it directly (§4.1 summarization protocol).
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        tenant_id: &str,
        thread_id: &str,
        messages: &[Message],
    ) -> std::result::Result<String, String>;
}

/// Maintains the short-term buffer and long-term summary store for every
/// thread. Cheap to clone: all state lives behind `Arc`.
#[derive(Clone)]
pub struct MemoryStore {
    db: Arc<Mutex<rusqlite::Connection>>,
    config: MemoryConfig,
    summarizer: Arc<dyn Summarizer>,
    /// Threads with a summarization task currently in flight (§4.1: "at most
    /// one summarization may be in-flight per thread").
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl MemoryStore {
    pub fn new(
        db: Arc<Mutex<rusqlite::Connection>>,
        config: MemoryConfig,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            db,
            config,
            summarizer,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Appends messages, trims to `N_SHORT` from the tail, and fires an
    /// asynchronous summarization task if the new length crosses `N_SUMMARY`.
    #[instrument(skip(self, messages))]
    pub fn append(
        &self,
        tenant_id: &str,
        thread_id: &str,
        messages: &[Message],
    ) -> Result<usize> {
        let conn = self.db.lock().unwrap();
        let mut next_seq: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM short_term_messages WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for msg in messages {
            next_seq += 1;
            let content = serde_json::to_string(&msg.content)?;
            let tool_calls = msg
                .tool_calls
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            conn.execute(
                "INSERT INTO short_term_messages
                    (tenant_id, thread_id, seq, role, content, tool_calls, tool_call_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    tenant_id,
                    thread_id,
                    next_seq,
                    msg.role.to_string(),
                    content,
                    tool_calls,
                    msg.tool_call_id,
                    msg.created_at.to_rfc3339(),
                ],
            )?;
        }

        // Trim to N_SHORT, preserving the tail (newest) per §4.1's trim semantics.
        conn.execute(
            "DELETE FROM short_term_messages
             WHERE thread_id = ?1 AND seq <= (
                 SELECT MAX(seq) - ?2 FROM short_term_messages WHERE thread_id = ?1
             )",
            params![thread_id, self.config.n_short as i64],
        )?;

        let new_length: i64 = conn.query_row(
            "SELECT COUNT(*) FROM short_term_messages WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        drop(conn);

        let new_length = new_length as usize;
        if new_length >= self.config.n_summary {
            self.maybe_trigger_summarization(tenant_id, thread_id);
        }
        Ok(new_length)
    }

    fn maybe_trigger_summarization(&self, tenant_id: &str, thread_id: &str) {
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            if !in_flight.insert(thread_id.to_string()) {
                debug!(thread_id, "summarization already in flight, skipping");
                return;
            }
        }
        let store = self.clone();
        let tenant_id = tenant_id.to_string();
        let thread_id = thread_id.to_string();
        tokio::spawn(async move {
            let result = store.run_summarization(&tenant_id, &thread_id).await;
            if let Err(e) = result {
                warn!(thread_id = %thread_id, error = %e, "summarization failed, buffer left untouched");
            }
            store.in_flight.lock().unwrap().remove(&thread_id);
        });
    }

    async fn run_summarization(&self, tenant_id: &str, thread_id: &str) -> Result<()> {
        let messages = self.get_recent(thread_id, None)?;
        let summary = self
            .summarizer
            .summarize(tenant_id, thread_id, &messages)
            .await
            .map_err(MemoryError::WriteError)?;

        let expires_at = Utc::now() + chrono::Duration::days(self.config.long_term_ttl_days);
        self.store_summary(
            tenant_id,
            thread_id,
            &summary,
            MemoryType::LongTerm,
            None,
            None,
            Some(expires_at),
        )?;
        self.shrink_context(thread_id)?;
        info!(thread_id, "summarization committed");
        Ok(())
    }

    /// Oldest → newest, bounded by `limit` (defaults to N_SHORT).
    pub fn get_recent(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        let limit = limit.unwrap_or(self.config.n_short).min(self.config.n_short);
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT role, content, tool_calls, tool_call_id, created_at
             FROM short_term_messages WHERE thread_id = ?1
             ORDER BY seq DESC LIMIT ?2",
        )?;
        let mut rows: Vec<Message> = stmt
            .query_map(params![thread_id, limit as i64], row_to_message)?
            .collect::<std::result::Result<_, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    #[instrument(skip(self, content))]
    pub fn store_summary(
        &self,
        tenant_id: &str,
        thread_id: &str,
        content: &str,
        memory_type: MemoryType,
        tags: Option<&str>,
        importance: Option<f64>,
        expires_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<i64> {
        let conn = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let tags = tags.unwrap_or("");
        let importance = importance.unwrap_or(0.5);
        conn.execute(
            "INSERT INTO long_term_memory
                (tenant_id, thread_id, content, memory_type, tags, importance,
                 access_count, expires_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
            params![
                tenant_id,
                thread_id,
                content,
                memory_type.to_string(),
                tags,
                importance,
                expires_at.map(|d| d.to_rfc3339()),
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO long_term_fts(rowid, content, tags) VALUES (?1, ?2, ?3)",
            params![id, content, tags],
        )?;
        Ok(id)
    }

    /// Supplemental: direct episodic writes bypassing the summarization pipeline.
    pub fn add_episodic_memory(
        &self,
        tenant_id: &str,
        thread_id: &str,
        content: &str,
        tags: Option<&str>,
    ) -> Result<i64> {
        self.store_summary(
            tenant_id,
            thread_id,
            content,
            MemoryType::Episodic,
            tags,
            None,
            None,
        )
    }

    /// With `query_text`, ranks long-term entries by FTS5 relevance; without
    /// it, returns the most recent by creation time.
    pub fn retrieve_context(
        &self,
        tenant_id: &str,
        thread_id: &str,
        query_text: Option<&str>,
        limit: usize,
    ) -> Result<ContextBundle> {
        let short_term = self.get_recent(thread_id, None)?;
        let conn = self.db.lock().unwrap();
        let long_term = if let Some(query) = query_text {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.tenant_id, m.thread_id, m.content, m.memory_type, m.tags,
                        m.importance, m.access_count, m.expires_at, m.created_at, m.updated_at
                 FROM long_term_memory m
                 JOIN long_term_fts f ON m.id = f.rowid
                 WHERE m.tenant_id = ?1 AND m.thread_id = ?2 AND long_term_fts MATCH ?3
                 ORDER BY rank LIMIT ?4",
            )?;
            stmt.query_map(params![tenant_id, thread_id, query, limit as i64], row_to_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, tenant_id, thread_id, content, memory_type, tags,
                        importance, access_count, expires_at, created_at, updated_at
                 FROM long_term_memory
                 WHERE tenant_id = ?1 AND thread_id = ?2
                 ORDER BY created_at DESC LIMIT ?3",
            )?;
            stmt.query_map(params![tenant_id, thread_id, limit as i64], row_to_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        Ok(ContextBundle {
            short_term,
            long_term,
        })
    }

    /// Erases short-term entries now reflected in a freshly written summary.
    pub fn shrink_context(&self, thread_id: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "DELETE FROM short_term_messages WHERE thread_id = ?1",
            params![thread_id],
        )?;
        Ok(())
    }

    /// Removes long-term entries past expiry. Returns the number deleted.
    pub fn delete_expired(&self) -> Result<usize> {
        let conn = self.db.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        let ids: Vec<i64> = {
            let mut stmt =
                conn.prepare("SELECT id FROM long_term_memory WHERE expires_at IS NOT NULL AND expires_at < ?1")?;
            stmt.query_map(params![now], |row| row.get(0))?
                .collect::<std::result::Result<_, _>>()?
        };
        for id in &ids {
            conn.execute(
                "INSERT INTO long_term_fts(long_term_fts, rowid) VALUES('delete', ?1)",
                params![id],
            )?;
        }
        conn.execute(
            "DELETE FROM long_term_memory WHERE expires_at IS NOT NULL AND expires_at < ?1",
            params![now],
        )?;
        Ok(ids.len())
    }

    /// Maintenance sweep: logs failures without propagating (§4.1 SUPPLEMENTAL).
    pub async fn cleanup_expired_memories(&self) {
        match self.delete_expired() {
            Ok(n) if n > 0 => info!(deleted = n, "expired long-term entries cleaned up"),
            Ok(_) => {}
            Err(e) => error!(error = %e, "cleanup_expired_memories failed"),
        }
    }

    /// User-initiated deletion; fails if absent or tenant-mismatched.
    pub fn delete_episodic(&self, tenant_id: &str, thread_id: &str, entry_id: i64) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let owner: Option<String> = conn
            .query_row(
                "SELECT tenant_id FROM long_term_memory WHERE id = ?1 AND thread_id = ?2",
                params![entry_id, thread_id],
                |row| row.get(0),
            )
            .optional()?;
        match owner {
            Some(owner_tenant) if owner_tenant == tenant_id => {
                conn.execute(
                    "INSERT INTO long_term_fts(long_term_fts, rowid) VALUES('delete', ?1)",
                    params![entry_id],
                )?;
                conn.execute("DELETE FROM long_term_memory WHERE id = ?1", params![entry_id])?;
                Ok(())
            }
            _ => Err(MemoryError::NotFound(format!(
                "entry {entry_id} in thread {thread_id}"
            ))),
        }
    }
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let role_str: String = row.get(0)?;
    let content_str: String = row.get(1)?;
    let tool_calls_str: Option<String> = row.get(2)?;
    let created_str: String = row.get(4)?;
    Ok(Message {
        role: role_str.parse().unwrap_or(MessageRole::User),
        content: serde_json::from_str::<MessageContent>(&content_str)
            .unwrap_or(MessageContent::Text(content_str)),
        tool_calls: tool_calls_str.and_then(|s| serde_json::from_str(&s).ok()),
        tool_call_id: row.get(3)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LongTermEntry> {
    let memory_type_str: String = row.get(4)?;
    let expires_str: Option<String> = row.get(8)?;
    let created_str: String = row.get(9)?;
    let updated_str: String = row.get(10)?;
    Ok(LongTermEntry {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        thread_id: row.get(2)?,
        content: row.get(3)?,
        memory_type: memory_type_str.parse().unwrap_or(MemoryType::LongTerm),
        tags: row.get(5)?,
        importance: row.get(6)?,
        access_count: row.get(7)?,
        expires_at: expires_str
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubSummarizer;

    #[async_trait]
    impl Summarizer for StubSummarizer {
        async fn summarize(
            &self,
            _tenant_id: &str,
            _thread_id: &str,
            messages: &[Message],
        ) -> std::result::Result<String, String> {
            Ok(format!("summary of {} messages", messages.len()))
        }
    }

    fn store() -> MemoryStore {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        MemoryStore::new(
            Arc::new(Mutex::new(conn)),
            MemoryConfig {
                n_short: 5,
                n_summary: 4,
                short_term_ttl_secs: 3600,
                long_term_ttl_days: 30,
            },
            Arc::new(StubSummarizer),
        )
    }

    #[test]
    fn append_trims_to_n_short_preserving_tail() {
        let s = store();
        let msgs: Vec<Message> = (0..8).map(|i| Message::user(format!("m{i}"))).collect();
        let new_len = s.append("t1", "th1", &msgs).unwrap();
        assert_eq!(new_len, 5);
        let recent = s.get_recent("th1", None).unwrap();
        let texts: Vec<_> = recent.iter().map(|m| m.content.as_text()).collect();
        assert_eq!(texts, vec!["m3", "m4", "m5", "m6", "m7"]);
    }

    #[test]
    fn store_and_retrieve_long_term_by_keyword() {
        let s = store();
        s.store_summary(
            "t1",
            "th1",
            "customer asked about refund policy",
            MemoryType::LongTerm,
            None,
            None,
            None,
        )
        .unwrap();
        let bundle = s.retrieve_context("t1", "th1", Some("refund"), 5).unwrap();
        assert_eq!(bundle.long_term.len(), 1);
        assert!(bundle.long_term[0].content.contains("refund"));
    }

    #[test]
    fn delete_expired_removes_only_past_entries() {
        let s = store();
        s.store_summary(
            "t1",
            "th1",
            "stale",
            MemoryType::LongTerm,
            None,
            None,
            Some(Utc::now() - chrono::Duration::days(1)),
        )
        .unwrap();
        s.store_summary(
            "t1",
            "th1",
            "fresh",
            MemoryType::LongTerm,
            None,
            None,
            Some(Utc::now() + chrono::Duration::days(1)),
        )
        .unwrap();
        let deleted = s.delete_expired().unwrap();
        assert_eq!(deleted, 1);
    }

    #[test]
    fn delete_episodic_rejects_tenant_mismatch() {
        let s = store();
        let id = s
            .add_episodic_memory("t1", "th1", "fact", None)
            .unwrap();
        let result = s.delete_episodic("t2", "th1", id);
        assert!(matches!(result, Err(MemoryError::NotFound(_))));
    }
}
