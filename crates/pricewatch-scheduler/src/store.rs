//! SQLite-backed job store: the single source of truth for job lifecycle.
//!
//! Every state change is one conditional statement, so the store's own
//! atomicity is what keeps concurrent pollers, confirmations and
//! cancellations consistent. Nothing about a job is cached in memory.

use chrono::{DateTime, SecondsFormat, Utc};
use pricewatch_core::error::{PriceWatchError, Result};
use pricewatch_core::types::{Job, JobId, JobStatus, Snapshot};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::policy::validate_target_price;

/// Durable job store.
pub struct JobStore {
    conn: Mutex<Connection>,
}

/// Shared SELECT column list for job queries.
const JOB_SELECT: &str = "SELECT id, token, title, url, image, current_price, target_price, proposed_target, status, recipient, notification_count, created_at, stopped_at FROM jobs";

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Fixed-width timestamps keep `ORDER BY created_at` chronological.
fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
    let status: String = row.get(8)?;
    let status = status.parse::<JobStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let created_at: String = row.get(11)?;
    let stopped_at: Option<String> = row.get(12)?;
    Ok(Job {
        id: row.get(0)?,
        token: row.get(1)?,
        title: row.get(2)?,
        url: row.get(3)?,
        image: row.get(4)?,
        current_price: row.get(5)?,
        target_price: row.get(6)?,
        proposed_target: row.get(7)?,
        status,
        recipient: row.get(9)?,
        notification_count: row.get(10)?,
        created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
        stopped_at: stopped_at.as_deref().and_then(parse_ts),
    })
}

fn store_err(ctx: &'static str) -> impl Fn(rusqlite::Error) -> PriceWatchError {
    move |e| PriceWatchError::Store(format!("{ctx}: {e}"))
}

impl JobStore {
    /// Open or create the job database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(store_err("DB open"))?;

        // WAL + busy timeout so the bot, web front and pollers never see "database is locked"
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(store_err("DB pragma"))?;

        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        tracing::debug!("🗄️ Job store opened at {}", path.display());
        Ok(store)
    }

    /// In-memory store (tests, dry runs).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err("DB open"))?;
        let store = Self { conn: Mutex::new(conn) };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                token TEXT UNIQUE NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                image TEXT,
                current_price REAL,
                target_price REAL,
                proposed_target REAL,
                status TEXT NOT NULL DEFAULT 'pending',   -- pending | active | stopped
                recipient TEXT,
                notification_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                stopped_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_recipient ON jobs(recipient, created_at);
            ",
            )
            .map_err(store_err("Migration"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PriceWatchError::Store(format!("Lock: {e}")))
    }

    fn get_locked(conn: &Connection, id: JobId) -> Result<Option<Job>> {
        conn.query_row(&format!("{JOB_SELECT} WHERE id = ?1"), [id], row_to_job)
            .optional()
            .map_err(store_err("Get job"))
    }

    fn status_locked(conn: &Connection, id: JobId) -> Result<Option<JobStatus>> {
        Ok(Self::get_locked(conn, id)?.map(|job| job.status))
    }

    fn query_jobs(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Job>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql).map_err(store_err("Prepare"))?;
        let rows = stmt
            .query_map(params, row_to_job)
            .map_err(store_err("Query"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(store_err("Read row"))
    }

    // ─── Lifecycle ──────────────────────────────────────────────

    /// Insert a pending job and return it (id + fresh token).
    pub fn create_pending(
        &self,
        title: &str,
        url: &str,
        image: Option<&str>,
        current_price: Option<f64>,
        proposed_target: Option<f64>,
    ) -> Result<Job> {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO jobs (token, title, url, image, current_price, proposed_target, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7)",
            params![
                token,
                title,
                url,
                image,
                current_price,
                proposed_target,
                now_ts(),
            ],
        )
        .map_err(store_err("Create job"))?;
        let id = conn.last_insert_rowid();
        tracing::info!("📝 Job #{id} pending: {title}");
        Self::get_locked(&conn, id)?
            .ok_or_else(|| PriceWatchError::NotFound(format!("job #{id}")))
    }

    /// pending → active. Sets recipient and target, resets the notification count.
    ///
    /// Only one concurrent caller can win; the rest get `InvalidTransition`
    /// with `from = active`. Edges come from `JobStatus::can_transition_to`.
    pub fn activate(&self, id: JobId, recipient: &str, target_price: f64) -> Result<Job> {
        let target_price = validate_target_price(target_price)?;
        let conn = self.lock()?;
        let from = Self::status_locked(&conn, id)?
            .ok_or_else(|| PriceWatchError::NotFound(format!("job #{id}")))?;
        if !from.can_transition_to(JobStatus::Active) {
            return Err(PriceWatchError::InvalidTransition {
                id,
                from,
                to: JobStatus::Active,
            });
        }
        // The connection lock is held, so the status read above still holds
        conn.execute(
            "UPDATE jobs SET status = 'active', recipient = ?2, target_price = ?3, notification_count = 0
             WHERE id = ?1 AND status = 'pending'",
            params![id, recipient, target_price],
        )
        .map_err(store_err("Activate"))?;
        tracing::info!("✅ Job #{id} active for {recipient} (target {target_price})");
        Self::get_locked(&conn, id)?
            .ok_or_else(|| PriceWatchError::NotFound(format!("job #{id}")))
    }

    /// → stopped. Returns `true` if this call made the transition, `false`
    /// if the job was already stopped.
    pub fn mark_stopped(&self, id: JobId) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn
            .execute(
                "UPDATE jobs SET status = 'stopped', stopped_at = ?2
                 WHERE id = ?1 AND status != 'stopped'",
                params![id, now_ts()],
            )
            .map_err(store_err("Stop"))?;
        if changed == 0 {
            return match Self::status_locked(&conn, id)? {
                None => Err(PriceWatchError::NotFound(format!("job #{id}"))),
                Some(_) => Ok(false),
            };
        }
        tracing::info!("🛑 Job #{id} stopped");
        Ok(true)
    }

    /// Bump the notification count of an active job.
    ///
    /// Returns `None` when the job is no longer active, so a cancellation
    /// that lands between the poller's status check and this call wins.
    pub fn increment_notification(&self, id: JobId) -> Result<Option<u32>> {
        self.lock()?
            .query_row(
                "UPDATE jobs SET notification_count = notification_count + 1
                 WHERE id = ?1 AND status = 'active'
                 RETURNING notification_count",
                [id],
                |row| row.get(0),
            )
            .optional()
            .map_err(store_err("Increment notification"))
    }

    /// Store the latest observed price and refresh title/image. Active jobs only.
    pub fn record_observation(&self, id: JobId, snapshot: &Snapshot) -> Result<bool> {
        let title = Some(snapshot.title.trim()).filter(|t| !t.is_empty());
        let changed = self
            .lock()?
            .execute(
                "UPDATE jobs SET current_price = ?2, title = COALESCE(?3, title), image = COALESCE(?4, image)
                 WHERE id = ?1 AND status = 'active'",
                params![id, snapshot.price, title, snapshot.image],
            )
            .map_err(store_err("Record observation"))?;
        Ok(changed > 0)
    }

    /// Run raw SQL against the live connection (tests inject failures with it).
    #[cfg(test)]
    pub(crate) fn execute_for_test(&self, sql: &str) -> Result<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(store_err("Test SQL"))
    }

    // ─── Queries ────────────────────────────────────────────────

    pub fn get(&self, id: JobId) -> Result<Option<Job>> {
        Self::get_locked(&*self.lock()?, id)
    }

    pub fn find_by_token(&self, token: &str) -> Result<Job> {
        self.lock()?
            .query_row(&format!("{JOB_SELECT} WHERE token = ?1"), [token], row_to_job)
            .optional()
            .map_err(store_err("Find by token"))?
            .ok_or_else(|| PriceWatchError::NotFound(format!("token {token}")))
    }

    /// Snapshot of all active jobs, oldest first.
    pub fn list_active(&self) -> Result<Vec<Job>> {
        self.query_jobs(
            &format!("{JOB_SELECT} WHERE status = 'active' ORDER BY id"),
            [],
        )
    }

    /// All jobs of a recipient, most recent first.
    pub fn list_by_recipient(&self, recipient: &str) -> Result<Vec<Job>> {
        self.query_jobs(
            &format!("{JOB_SELECT} WHERE recipient = ?1 ORDER BY created_at DESC, id DESC"),
            [recipient],
        )
    }

    /// Most recent active job of a recipient.
    pub fn latest_active_for(&self, recipient: &str) -> Result<Option<Job>> {
        Ok(self
            .query_jobs(
                &format!(
                    "{JOB_SELECT} WHERE recipient = ?1 AND status = 'active' ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                [recipient],
            )?
            .into_iter()
            .next())
    }

    /// Most recently submitted job still waiting for confirmation.
    pub fn latest_pending(&self) -> Result<Option<Job>> {
        Ok(self
            .query_jobs(
                &format!("{JOB_SELECT} WHERE status = 'pending' ORDER BY created_at DESC, id DESC LIMIT 1"),
                [],
            )?
            .into_iter()
            .next())
    }
}
