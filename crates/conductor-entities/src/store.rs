use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use conductor_core::types::{AssistantId, EntityStatus, ThreadId, ThreadStatus};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, instrument, warn};

use crate::error::{EntitiesError, Result};
use crate::types::{Assistant, Tenant, Thread, ThreadAwakeningRecord};

/// Max cached entries per entity kind before an oldest-half eviction sweep.
const CACHE_MAX: usize = 512;

/// Cache-first, database-fallback store for Tenant/Assistant/Thread (§5:
/// "Cache invalidation for entities... write-through... cache-first with
/// database fallback").
pub struct EntityStore {
    db: Arc<Mutex<rusqlite::Connection>>,
    tenant_cache: Mutex<HashMap<String, Tenant>>,
    tenant_order: Mutex<Vec<String>>,
    assistant_cache: Mutex<HashMap<String, Assistant>>,
    assistant_order: Mutex<Vec<String>>,
    thread_cache: Mutex<HashMap<String, Thread>>,
    thread_order: Mutex<Vec<String>>,
}

impl EntityStore {
    pub fn new(db: Arc<Mutex<rusqlite::Connection>>) -> Self {
        Self {
            db,
            tenant_cache: Mutex::new(HashMap::new()),
            tenant_order: Mutex::new(Vec::new()),
            assistant_cache: Mutex::new(HashMap::new()),
            assistant_order: Mutex::new(Vec::new()),
            thread_cache: Mutex::new(HashMap::new()),
            thread_order: Mutex::new(Vec::new()),
        }
    }

    // ── Tenant ───────────────────────────────────────────────────────────

    #[instrument(skip(self))]
    pub fn sync_tenant(&self, tenant_id: &str) -> Result<Tenant> {
        let now = Utc::now();
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO tenants (tenant_id, status, created_at, updated_at)
             VALUES (?1, 'active', ?2, ?2)
             ON CONFLICT(tenant_id) DO UPDATE SET updated_at = ?2",
            params![tenant_id, now.to_rfc3339()],
        )?;
        let tenant = Tenant {
            tenant_id: tenant_id.to_string(),
            status: EntityStatus::Active,
            created_at: now,
            updated_at: now,
        };
        evict_and_insert(
            &self.tenant_cache,
            &self.tenant_order,
            tenant_id.to_string(),
            tenant.clone(),
        );
        Ok(tenant)
    }

    pub fn get_tenant(&self, tenant_id: &str) -> Result<Tenant> {
        if let Some(t) = self.tenant_cache.lock().unwrap().get(tenant_id).cloned() {
            debug!(tenant_id, "tenant cache hit");
            return Ok(t);
        }
        let conn = self.db.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT tenant_id, status, created_at, updated_at FROM tenants WHERE tenant_id = ?1",
                params![tenant_id],
                row_to_tenant,
            )
            .optional()?;
        drop(conn);
        match row {
            Some(t) => {
                evict_and_insert(
                    &self.tenant_cache,
                    &self.tenant_order,
                    tenant_id.to_string(),
                    t.clone(),
                );
                Ok(t)
            }
            None => Err(EntitiesError::TenantNotFound(tenant_id.to_string())),
        }
    }

    /// Fails with TenantDisabled if the tenant is INACTIVE.
    pub fn require_active_tenant(&self, tenant_id: &str) -> Result<Tenant> {
        let tenant = self.get_tenant(tenant_id)?;
        if !tenant.status.is_active() {
            return Err(EntitiesError::TenantDisabled(tenant_id.to_string()));
        }
        Ok(tenant)
    }

    // ── Assistant ────────────────────────────────────────────────────────

    #[instrument(skip(self, assistant))]
    pub fn upsert_assistant(&self, assistant: Assistant) -> Result<Assistant> {
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO assistants
                (assistant_id, tenant_id, status, name, occupation, personality, industry, voice_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(assistant_id) DO UPDATE SET
                tenant_id=?2, status=?3, name=?4, occupation=?5,
                personality=?6, industry=?7, voice_id=?8",
            params![
                assistant.assistant_id.as_str(),
                assistant.tenant_id,
                assistant.status.to_string(),
                assistant.name,
                assistant.occupation,
                assistant.personality,
                assistant.industry,
                assistant.voice_id,
            ],
        )?;
        drop(conn);
        evict_and_insert(
            &self.assistant_cache,
            &self.assistant_order,
            assistant.assistant_id.as_str().to_string(),
            assistant.clone(),
        );
        Ok(assistant)
    }

    pub fn get_assistant(&self, assistant_id: &str) -> Result<Assistant> {
        if let Some(a) = self
            .assistant_cache
            .lock()
            .unwrap()
            .get(assistant_id)
            .cloned()
        {
            return Ok(a);
        }
        let conn = self.db.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT assistant_id, tenant_id, status, name, occupation, personality, industry, voice_id
                 FROM assistants WHERE assistant_id = ?1",
                params![assistant_id],
                row_to_assistant,
            )
            .optional()?;
        drop(conn);
        match row {
            Some(a) => {
                evict_and_insert(
                    &self.assistant_cache,
                    &self.assistant_order,
                    assistant_id.to_string(),
                    a.clone(),
                );
                Ok(a)
            }
            None => Err(EntitiesError::AssistantNotFound(assistant_id.to_string())),
        }
    }

    /// Verifies the assistant exists, is ACTIVE, and belongs to `tenant_id`
    /// (the WGE permission prelude, §4.4).
    pub fn require_active_assistant_in_tenant(
        &self,
        assistant_id: &str,
        tenant_id: &str,
    ) -> Result<Assistant> {
        let assistant = self.get_assistant(assistant_id)?;
        if assistant.tenant_id != tenant_id {
            return Err(EntitiesError::TenantMismatch {
                expected: tenant_id.to_string(),
                actual: assistant.tenant_id,
            });
        }
        if !assistant.status.is_active() {
            return Err(EntitiesError::AssistantInactive(assistant_id.to_string()));
        }
        Ok(assistant)
    }

    // ── Thread ───────────────────────────────────────────────────────────

    #[instrument(skip(self))]
    pub fn create_thread(
        &self,
        tenant_id: &str,
        assistant_id: Option<&AssistantId>,
        customer_name: Option<&str>,
        customer_phone: Option<&str>,
    ) -> Result<Thread> {
        let thread = Thread {
            thread_id: ThreadId::new(),
            tenant_id: tenant_id.to_string(),
            assistant_id: assistant_id.cloned(),
            status: ThreadStatus::Idle,
            customer_name: customer_name.map(String::from),
            customer_phone: customer_phone.map(String::from),
            last_awakening_at: None,
            awakening_attempt_count: 0,
            created_at: Utc::now(),
        };
        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO threads
                (thread_id, tenant_id, assistant_id, status, customer_name,
                 customer_phone, last_awakening_at, awakening_attempt_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, 0, ?7)",
            params![
                thread.thread_id.as_str(),
                thread.tenant_id,
                thread.assistant_id.as_ref().map(|a| a.as_str().to_string()),
                thread.status.to_string(),
                thread.customer_name,
                thread.customer_phone,
                thread.created_at.to_rfc3339(),
            ],
        )?;
        drop(conn);
        self.cache_thread(thread.clone());
        Ok(thread)
    }

    pub fn get_thread(&self, thread_id: &str) -> Result<Thread> {
        if let Some(t) = self.thread_cache.lock().unwrap().get(thread_id).cloned() {
            return Ok(t);
        }
        let conn = self.db.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT thread_id, tenant_id, assistant_id, status, customer_name,
                        customer_phone, last_awakening_at, awakening_attempt_count, created_at
                 FROM threads WHERE thread_id = ?1",
                params![thread_id],
                row_to_thread,
            )
            .optional()?;
        drop(conn);
        match row {
            Some(t) => {
                self.cache_thread(t.clone());
                Ok(t)
            }
            None => Err(EntitiesError::ThreadNotFound(thread_id.to_string())),
        }
    }

    /// WGE permission prelude (§4.4): verify thread exists, not BUSY, owned by
    /// `tenant_id`; bind the assistant if unbound; transition to BUSY.
    /// Returns the thread as it stood *before* the transition, with the
    /// binding applied, so the caller can read the (possibly newly bound)
    /// assistant id.
    #[instrument(skip(self))]
    pub fn try_acquire_busy(
        &self,
        thread_id: &str,
        tenant_id: &str,
        assistant_id: &AssistantId,
    ) -> Result<Thread> {
        let conn = self.db.lock().unwrap();
        let mut thread = conn
            .query_row(
                "SELECT thread_id, tenant_id, assistant_id, status, customer_name,
                        customer_phone, last_awakening_at, awakening_attempt_count, created_at
                 FROM threads WHERE thread_id = ?1",
                params![thread_id],
                row_to_thread,
            )
            .optional()?
            .ok_or_else(|| EntitiesError::ThreadNotFound(thread_id.to_string()))?;

        if thread.tenant_id != tenant_id {
            return Err(EntitiesError::TenantMismatch {
                expected: tenant_id.to_string(),
                actual: thread.tenant_id,
            });
        }
        if thread.status == ThreadStatus::Busy {
            return Err(EntitiesError::ThreadBusy(thread_id.to_string()));
        }

        let bind = thread.assistant_id.is_none();
        if bind {
            thread.assistant_id = Some(assistant_id.clone());
        }
        thread.status = ThreadStatus::Busy;

        conn.execute(
            "UPDATE threads SET status = 'busy', assistant_id = ?2 WHERE thread_id = ?1",
            params![thread_id, thread.assistant_id.as_ref().unwrap().as_str()],
        )?;
        drop(conn);
        self.cache_thread(thread.clone());
        info!(thread_id, bound_assistant = bind, "thread acquired BUSY");
        Ok(thread)
    }

    /// Release BUSY back to ACTIVE (success) or FAILED (error), per §4.4.
    pub fn release_busy(&self, thread_id: &str, failed: bool) -> Result<()> {
        let status = if failed {
            ThreadStatus::Failed
        } else {
            ThreadStatus::Active
        };
        let conn = self.db.lock().unwrap();
        conn.execute(
            "UPDATE threads SET status = ?2 WHERE thread_id = ?1",
            params![thread_id, status.to_string()],
        )?;
        drop(conn);
        self.thread_cache.lock().unwrap().remove(thread_id);
        if failed {
            warn!(thread_id, "workflow failed, thread marked FAILED");
        }
        Ok(())
    }

    /// Record a successfully delivered awakening (§4.5a).
    pub fn record_awakening(&self, thread_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.db.lock().unwrap();
        conn.execute(
            "UPDATE threads SET awakening_attempt_count = awakening_attempt_count + 1,
                last_awakening_at = ?2 WHERE thread_id = ?1",
            params![thread_id, now],
        )?;
        drop(conn);
        self.thread_cache.lock().unwrap().remove(thread_id);
        Ok(())
    }

    /// Threads eligible for the awakening scan (§4.5a), capped at `batch_size`.
    pub fn list_awakening_eligible(
        &self,
        batch_size: usize,
        retry_interval_secs: i64,
        max_attempts: u32,
    ) -> Result<Vec<ThreadAwakeningRecord>> {
        let cutoff = (Utc::now() - chrono::Duration::seconds(retry_interval_secs)).to_rfc3339();
        let conn = self.db.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT t.thread_id, t.tenant_id, t.assistant_id, t.awakening_attempt_count,
                    t.last_awakening_at
             FROM threads t
             JOIN assistants a ON a.assistant_id = t.assistant_id
             WHERE t.assistant_id IS NOT NULL
               AND a.status = 'active'
               AND t.awakening_attempt_count < ?1
               AND (t.last_awakening_at IS NULL OR t.last_awakening_at < ?2)
             ORDER BY t.last_awakening_at IS NOT NULL, t.last_awakening_at ASC
             LIMIT ?3",
        )?;
        let rows = stmt
            .query_map(params![max_attempts, cutoff, batch_size as i64], |row| {
                Ok(ThreadAwakeningRecord {
                    thread_id: ThreadId(row.get::<_, String>(0)?),
                    tenant_id: row.get(1)?,
                    assistant_id: AssistantId(row.get::<_, String>(2)?),
                    awakening_attempt_count: row.get::<_, i64>(3)? as u32,
                    last_awakening_at: row
                        .get::<_, Option<String>>(4)?
                        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                        .map(|dt| dt.with_timezone(&Utc)),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn cache_thread(&self, thread: Thread) {
        evict_and_insert(
            &self.thread_cache,
            &self.thread_order,
            thread.thread_id.as_str().to_string(),
            thread,
        );
    }
}

fn evict_and_insert<V: Clone>(
    cache: &Mutex<HashMap<String, V>>,
    order: &Mutex<Vec<String>>,
    key: String,
    value: V,
) {
    let mut cache = cache.lock().unwrap();
    let mut order = order.lock().unwrap();
    if cache.contains_key(&key) {
        cache.insert(key, value);
        return;
    }
    if cache.len() >= CACHE_MAX {
        let evict_count = CACHE_MAX / 2;
        for k in order.drain(..evict_count) {
            cache.remove(&k);
        }
    }
    order.push(key.clone());
    cache.insert(key, value);
}

fn row_to_tenant(row: &rusqlite::Row) -> rusqlite::Result<Tenant> {
    let status_str: String = row.get(1)?;
    let created_str: String = row.get(2)?;
    let updated_str: String = row.get(3)?;
    Ok(Tenant {
        tenant_id: row.get(0)?,
        status: status_str.parse().unwrap_or(EntityStatus::Active),
        created_at: DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        updated_at: DateTime::parse_from_rfc3339(&updated_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_assistant(row: &rusqlite::Row) -> rusqlite::Result<Assistant> {
    let status_str: String = row.get(2)?;
    Ok(Assistant {
        assistant_id: AssistantId(row.get(0)?),
        tenant_id: row.get(1)?,
        status: status_str.parse().unwrap_or(EntityStatus::Active),
        name: row.get(3)?,
        occupation: row.get(4)?,
        personality: row.get(5)?,
        industry: row.get(6)?,
        voice_id: row.get(7)?,
    })
}

fn row_to_thread(row: &rusqlite::Row) -> rusqlite::Result<Thread> {
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(8)?;
    let last_awakening: Option<String> = row.get(6)?;
    Ok(Thread {
        thread_id: ThreadId(row.get(0)?),
        tenant_id: row.get(1)?,
        assistant_id: row.get::<_, Option<String>>(2)?.map(AssistantId),
        status: status_str.parse().unwrap_or(ThreadStatus::Idle),
        customer_name: row.get(4)?,
        customer_phone: row.get(5)?,
        last_awakening_at: last_awakening
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)),
        awakening_attempt_count: row.get::<_, i64>(7)? as u32,
        created_at: DateTime::parse_from_rfc3339(&created_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> EntityStore {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        EntityStore::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn create_thread_starts_idle() {
        let s = store();
        s.sync_tenant("t1").unwrap();
        let thread = s.create_thread("t1", None, None, None).unwrap();
        assert_eq!(thread.status, ThreadStatus::Idle);
        assert_eq!(thread.awakening_attempt_count, 0);
    }

    #[test]
    fn acquire_busy_rejects_second_caller() {
        let s = store();
        s.sync_tenant("t1").unwrap();
        let assistant = s
            .upsert_assistant(Assistant {
                assistant_id: AssistantId::new(),
                tenant_id: "t1".into(),
                status: EntityStatus::Active,
                name: "Aria".into(),
                occupation: None,
                personality: None,
                industry: None,
                voice_id: None,
            })
            .unwrap();
        let thread = s.create_thread("t1", None, None, None).unwrap();

        s.try_acquire_busy(thread.thread_id.as_str(), "t1", &assistant.assistant_id)
            .unwrap();
        let second = s.try_acquire_busy(thread.thread_id.as_str(), "t1", &assistant.assistant_id);
        assert!(matches!(second, Err(EntitiesError::ThreadBusy(_))));
    }

    #[test]
    fn release_busy_transitions_to_active_or_failed() {
        let s = store();
        s.sync_tenant("t1").unwrap();
        let assistant = s
            .upsert_assistant(Assistant {
                assistant_id: AssistantId::new(),
                tenant_id: "t1".into(),
                status: EntityStatus::Active,
                name: "Aria".into(),
                occupation: None,
                personality: None,
                industry: None,
                voice_id: None,
            })
            .unwrap();
        let thread = s.create_thread("t1", None, None, None).unwrap();
        s.try_acquire_busy(thread.thread_id.as_str(), "t1", &assistant.assistant_id)
            .unwrap();
        s.release_busy(thread.thread_id.as_str(), false).unwrap();
        let reloaded = s.get_thread(thread.thread_id.as_str()).unwrap();
        assert_eq!(reloaded.status, ThreadStatus::Active);
    }

    #[test]
    fn tenant_mismatch_rejected() {
        let s = store();
        s.sync_tenant("t1").unwrap();
        s.sync_tenant("t2").unwrap();
        let assistant = s
            .upsert_assistant(Assistant {
                assistant_id: AssistantId::new(),
                tenant_id: "t1".into(),
                status: EntityStatus::Active,
                name: "Aria".into(),
                occupation: None,
                personality: None,
                industry: None,
                voice_id: None,
            })
            .unwrap();
        let thread = s.create_thread("t1", None, None, None).unwrap();
        let result = s.try_acquire_busy(thread.thread_id.as_str(), "t2", &assistant.assistant_id);
        assert!(matches!(result, Err(EntitiesError::TenantMismatch { .. })));
    }
}
