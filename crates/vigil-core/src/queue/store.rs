//! Insight storage trait and the SQLite implementation.
//!
//! One store holds one workspace's entries. Rows are never deleted; a
//! resolved entry stays on disk as an audit record.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::dedup::fingerprint;
use super::priority::rank_order;
use crate::error::{VigilError, VigilResult};
use crate::types::{
    DeliveryTrigger, QueueEntry, Resolution, ResolveOutcome, ScheduledInsight, Signal,
};

/// Trait for per-workspace insight storage.
///
/// Each call is atomic with respect to every other call on the same store.
pub trait InsightStore: Send + Sync {
    /// Persist a new entry.
    fn insert(&self, entry: &QueueEntry) -> VigilResult<()>;

    /// Persist a new entry unless an open entry with the same category and
    /// content fingerprint, detected at or after `since`, already exists.
    /// Returns the existing entry's id when the insert was skipped.
    fn insert_unique(
        &self,
        entry: &QueueEntry,
        since: Option<DateTime<Utc>>,
    ) -> VigilResult<Option<Uuid>>;

    /// Get an entry by id.
    fn get(&self, id: Uuid) -> VigilResult<Option<QueueEntry>>;

    /// Highest-ranked open entry with `surface_at <= now` whose idle gate
    /// is met. With `mark_delivered`, the entry is marked delivered in the
    /// same step and returned in its updated form.
    fn next_eligible(
        &self,
        now: DateTime<Utc>,
        idle_seconds: u64,
        mark_delivered: bool,
    ) -> VigilResult<Option<QueueEntry>>;

    /// Record an outcome against an entry.
    fn resolve(
        &self,
        id: Uuid,
        resolution: Resolution,
        at: DateTime<Utc>,
    ) -> VigilResult<ResolveOutcome>;

    /// Entries in insertion order.
    fn list(&self, include_resolved: bool) -> VigilResult<Vec<QueueEntry>>;

    /// Number of open entries.
    fn pending_count(&self) -> VigilResult<usize>;
}

/// SQLite-backed insight store
pub struct SqliteInsightStore {
    conn: Mutex<Connection>,
}

const ENTRY_COLUMNS: &str = "id, workspace_id, signal_data, surface_at, resolved, resolved_at, \
     resolution, delivered_at, delivery_trigger, min_idle_seconds, context_tags, expanded_content, \
     confidence";

impl SqliteInsightStore {
    /// Open (or create) a store at the given path
    pub fn open(path: impl AsRef<Path>) -> VigilResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store
    pub fn in_memory() -> VigilResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> VigilResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VigilError::internal("insight store lock poisoned"))
    }

    fn init_schema(&self) -> VigilResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                workspace_id TEXT NOT NULL,
                category TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                base_priority INTEGER NOT NULL,
                confidence REAL NOT NULL,
                detected_at TEXT NOT NULL,
                surface_at TEXT NOT NULL,
                signal_data TEXT NOT NULL,
                delivery_trigger TEXT NOT NULL,
                min_idle_seconds INTEGER NOT NULL DEFAULT 0,
                context_tags TEXT NOT NULL,
                expanded_content TEXT NOT NULL,
                resolved INTEGER NOT NULL DEFAULT 0,
                resolved_at TEXT,
                resolution TEXT,
                delivered_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_entries_open ON queue_entries(resolved, surface_at);
            CREATE INDEX IF NOT EXISTS idx_entries_fingerprint ON queue_entries(category, fingerprint);
        "#,
        )?;
        Ok(())
    }

    fn insert_locked(conn: &Connection, entry: &QueueEntry) -> VigilResult<()> {
        let signal = &entry.insight.signal;
        let category: &'static str = signal.category().into();
        conn.execute(
            r#"INSERT INTO queue_entries
               (id, workspace_id, category, fingerprint, base_priority, confidence, detected_at,
                surface_at, signal_data, delivery_trigger, min_idle_seconds, context_tags,
                expanded_content, resolved, resolved_at, resolution, delivered_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"#,
            params![
                entry.id.to_string(),
                entry.workspace_id,
                category,
                fingerprint(signal.category(), &signal.content),
                signal.base_priority as i64,
                signal.confidence,
                ts(signal.detected_at),
                ts(entry.insight.surface_at),
                serde_json::to_string(signal)?,
                entry.delivery_trigger.as_str(),
                entry.min_idle_seconds as i64,
                serde_json::to_string(&entry.context_tags)?,
                entry.expanded_content,
                entry.insight.resolved as i32,
                entry.insight.resolved_at.map(ts),
                entry.insight.resolution.map(|r| r.as_str()),
                entry.insight.delivered_at.map(ts),
            ],
        )?;
        Ok(())
    }

    fn get_locked(conn: &Connection, id: Uuid) -> VigilResult<Option<QueueEntry>> {
        let sql = format!("SELECT {} FROM queue_entries WHERE id = ?1", ENTRY_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        stmt.query_row(params![id.to_string()], |row| Ok(Self::row_to_entry(row)))
            .optional()?
            .transpose()
    }

    fn row_to_entry(row: &rusqlite::Row<'_>) -> VigilResult<QueueEntry> {
        let id: String = row.get(0)?;
        let workspace_id: String = row.get(1)?;
        let signal_data: String = row.get(2)?;
        let surface_at: String = row.get(3)?;
        let resolved: i32 = row.get(4)?;
        let resolved_at: Option<String> = row.get(5)?;
        let resolution: Option<String> = row.get(6)?;
        let delivered_at: Option<String> = row.get(7)?;
        let delivery_trigger: String = row.get(8)?;
        let min_idle_seconds: i64 = row.get(9)?;
        let context_tags: String = row.get(10)?;
        let expanded_content: String = row.get(11)?;
        let confidence: f64 = row.get(12)?;

        let mut signal: Signal = serde_json::from_str(&signal_data)?;
        // The REAL column is exact; JSON floats may not round-trip bit for bit.
        signal.confidence = confidence;
        let resolution = resolution
            .map(|r| {
                Resolution::parse(&r)
                    .ok_or_else(|| VigilError::corrupted(format!("unknown resolution '{}'", r)))
            })
            .transpose()?;
        let delivery_trigger = DeliveryTrigger::parse(&delivery_trigger).ok_or_else(|| {
            VigilError::corrupted(format!("unknown delivery trigger '{}'", delivery_trigger))
        })?;

        Ok(QueueEntry {
            id: Uuid::parse_str(&id).map_err(|e| VigilError::parse(e.to_string()))?,
            workspace_id,
            insight: ScheduledInsight {
                signal,
                surface_at: parse_ts(&surface_at)?,
                resolved: resolved != 0,
                resolved_at: resolved_at.as_deref().map(parse_ts).transpose()?,
                resolution,
                delivered_at: delivered_at.as_deref().map(parse_ts).transpose()?,
            },
            delivery_trigger,
            min_idle_seconds: min_idle_seconds.max(0) as u64,
            context_tags: serde_json::from_str(&context_tags)?,
            expanded_content,
        })
    }

    fn query_entries(
        conn: &Connection,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> VigilResult<Vec<QueueEntry>> {
        let sql = format!(
            "SELECT {} FROM queue_entries {} ORDER BY seq ASC",
            ENTRY_COLUMNS, filter
        );
        let mut stmt = conn.prepare(&sql)?;
        let results = stmt.query_map(args, |row| Ok(Self::row_to_entry(row)))?;

        results
            .map(|r| r.map_err(|e| e.into()).and_then(|inner| inner))
            .collect()
    }
}

impl InsightStore for SqliteInsightStore {
    fn insert(&self, entry: &QueueEntry) -> VigilResult<()> {
        let conn = self.conn()?;
        Self::insert_locked(&conn, entry)
    }

    fn insert_unique(
        &self,
        entry: &QueueEntry,
        since: Option<DateTime<Utc>>,
    ) -> VigilResult<Option<Uuid>> {
        let conn = self.conn()?;
        let category: &'static str = entry.category().into();
        let since = since.map(ts).unwrap_or_default();
        let existing: Option<String> = conn
            .query_row(
                r#"SELECT id FROM queue_entries
                   WHERE resolved = 0 AND category = ?1 AND fingerprint = ?2 AND detected_at >= ?3
                   ORDER BY seq ASC LIMIT 1"#,
                params![category, fingerprint(entry.category(), entry.content()), since],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(id) => Ok(Some(
                Uuid::parse_str(&id).map_err(|e| VigilError::parse(e.to_string()))?,
            )),
            None => {
                Self::insert_locked(&conn, entry)?;
                Ok(None)
            }
        }
    }

    fn get(&self, id: Uuid) -> VigilResult<Option<QueueEntry>> {
        let conn = self.conn()?;
        Self::get_locked(&conn, id)
    }

    fn next_eligible(
        &self,
        now: DateTime<Utc>,
        idle_seconds: u64,
        mark_delivered: bool,
    ) -> VigilResult<Option<QueueEntry>> {
        let conn = self.conn()?;
        let idle = i64::try_from(idle_seconds).unwrap_or(i64::MAX);
        let candidates = Self::query_entries(
            &conn,
            "WHERE resolved = 0 AND surface_at <= ?1 AND min_idle_seconds <= ?2",
            &[&ts(now), &idle],
        )?;

        // Candidates arrive in insertion order, so `min_by` keeps the
        // earliest-inserted entry among exact ties.
        let Some(mut best) = candidates.into_iter().min_by(rank_order) else {
            return Ok(None);
        };

        if mark_delivered {
            conn.execute(
                r#"UPDATE queue_entries
                   SET resolution = 'delivered', delivered_at = COALESCE(delivered_at, ?2)
                   WHERE id = ?1 AND resolved = 0"#,
                params![best.id.to_string(), ts(now)],
            )?;
            best.insight.resolution = Some(Resolution::Delivered);
            best.insight.delivered_at.get_or_insert(now);
        }
        Ok(Some(best))
    }

    fn resolve(
        &self,
        id: Uuid,
        resolution: Resolution,
        at: DateTime<Utc>,
    ) -> VigilResult<ResolveOutcome> {
        let conn = self.conn()?;
        let state: Option<i32> = conn
            .query_row(
                "SELECT resolved FROM queue_entries WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match state {
            None => Ok(ResolveOutcome::NotFound),
            Some(resolved) if resolved != 0 => Ok(ResolveOutcome::AlreadyResolved),
            Some(_) if !resolution.is_terminal() => {
                conn.execute(
                    r#"UPDATE queue_entries
                       SET resolution = 'delivered', delivered_at = COALESCE(delivered_at, ?2)
                       WHERE id = ?1"#,
                    params![id.to_string(), ts(at)],
                )?;
                Ok(ResolveOutcome::MarkedDelivered)
            }
            Some(_) => {
                conn.execute(
                    r#"UPDATE queue_entries
                       SET resolved = 1, resolved_at = ?2, resolution = ?3
                       WHERE id = ?1"#,
                    params![id.to_string(), ts(at), resolution.as_str()],
                )?;
                Ok(ResolveOutcome::Resolved)
            }
        }
    }

    fn list(&self, include_resolved: bool) -> VigilResult<Vec<QueueEntry>> {
        let conn = self.conn()?;
        let filter = if include_resolved { "" } else { "WHERE resolved = 0" };
        Self::query_entries(&conn, filter, &[])
    }

    fn pending_count(&self) -> VigilResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue_entries WHERE resolved = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }
}

/// Fixed-width RFC 3339 so that text comparison orders instants.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> VigilResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VigilError::timestamp(format!("{}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SignalCategory, SignalSource};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 9, 0, 0).unwrap()
    }

    fn entry(category: SignalCategory, content: &str, confidence: f64, offset_mins: i64) -> QueueEntry {
        let detected = t0() + Duration::minutes(offset_mins);
        let signal = Signal::new(category, content, &SignalSource::new("c"), detected, confidence)
            .with_context(format!("... {} ...", content));
        QueueEntry::new("ws", ScheduledInsight::new(signal, detected))
    }

    #[test]
    fn test_insert_and_get() {
        let store = SqliteInsightStore::in_memory().unwrap();
        let e = entry(SignalCategory::Commitment, "send the deck", 0.9, 0)
            .with_tags(vec!["sales".to_string()]);
        store.insert(&e).unwrap();

        let loaded = store.get(e.id).unwrap().unwrap();
        assert_eq!(loaded, e);
        assert!(store.get(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_next_eligible_ranking() {
        let store = SqliteInsightStore::in_memory().unwrap();
        let low = entry(SignalCategory::ContextDecay, "the old plan", 0.95, 0);
        let high_weak = entry(SignalCategory::Contradiction, "I meant B", 0.70, 1);
        let high_strong = entry(SignalCategory::Contradiction, "I meant C", 0.80, 2);
        for e in [&low, &high_weak, &high_strong] {
            store.insert(e).unwrap();
        }

        let now = t0() + Duration::hours(1);
        let next = store.next_eligible(now, 0, false).unwrap().unwrap();
        assert_eq!(next.id, high_strong.id);

        store.resolve(high_strong.id, Resolution::Dismissed, now).unwrap();
        assert_eq!(store.next_eligible(now, 0, false).unwrap().unwrap().id, high_weak.id);
    }

    #[test]
    fn test_next_eligible_gates() {
        let store = SqliteInsightStore::in_memory().unwrap();
        let e = entry(SignalCategory::FollowUp, "the contract", 0.8, 0)
            .with_trigger(DeliveryTrigger::Idle, 30);
        let mut future = entry(SignalCategory::Contradiction, "I meant later", 0.9, 0);
        future.insight.surface_at = t0() + Duration::days(1);
        store.insert(&e).unwrap();
        store.insert(&future).unwrap();

        assert!(store.next_eligible(t0(), 10, false).unwrap().is_none());
        assert_eq!(store.next_eligible(t0(), 30, false).unwrap().unwrap().id, e.id);
    }

    #[test]
    fn test_marking_delivered_keeps_entry_open() {
        let store = SqliteInsightStore::in_memory().unwrap();
        let e = entry(SignalCategory::Commitment, "send the deck", 0.9, 0);
        store.insert(&e).unwrap();

        let delivered = store.next_eligible(t0(), 0, true).unwrap().unwrap();
        assert_eq!(delivered.resolution(), Some(Resolution::Delivered));
        assert_eq!(delivered.insight.delivered_at, Some(t0()));
        assert!(!delivered.is_resolved());

        let again = store.next_eligible(t0() + Duration::minutes(5), 0, true).unwrap().unwrap();
        assert_eq!(again.insight.delivered_at, Some(t0()));
        assert_eq!(store.pending_count().unwrap(), 1);
    }

    #[test]
    fn test_resolve_outcomes() {
        let store = SqliteInsightStore::in_memory().unwrap();
        let e = entry(SignalCategory::Commitment, "send the deck", 0.9, 0);
        store.insert(&e).unwrap();

        assert_eq!(
            store.resolve(e.id, Resolution::Delivered, t0()).unwrap(),
            ResolveOutcome::MarkedDelivered
        );
        assert_eq!(
            store.resolve(e.id, Resolution::Engaged, t0()).unwrap(),
            ResolveOutcome::Resolved
        );
        assert_eq!(
            store.resolve(e.id, Resolution::Dismissed, t0()).unwrap(),
            ResolveOutcome::AlreadyResolved
        );
        assert_eq!(
            store.resolve(Uuid::new_v4(), Resolution::Dismissed, t0()).unwrap(),
            ResolveOutcome::NotFound
        );

        let stored = store.get(e.id).unwrap().unwrap();
        assert!(stored.is_resolved());
        assert_eq!(stored.resolution(), Some(Resolution::Engaged));
        assert_eq!(stored.insight.resolved_at, Some(t0()));
        assert!(store.next_eligible(t0(), 0, false).unwrap().is_none());
    }

    #[test]
    fn test_list_keeps_resolved_rows() {
        let store = SqliteInsightStore::in_memory().unwrap();
        let a = entry(SignalCategory::Commitment, "send the deck", 0.9, 0);
        let b = entry(SignalCategory::FollowUp, "the contract", 0.8, 1);
        store.insert(&a).unwrap();
        store.insert(&b).unwrap();
        store.resolve(a.id, Resolution::Dismissed, t0()).unwrap();

        assert_eq!(store.list(false).unwrap().len(), 1);
        let all = store.list(true).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a.id);
        assert_eq!(store.pending_count().unwrap(), 1);
    }

    #[test]
    fn test_insert_unique() {
        let store = SqliteInsightStore::in_memory().unwrap();
        let a = entry(SignalCategory::Commitment, "Send the deck", 0.9, 0);
        let b = entry(SignalCategory::Commitment, "send  the deck", 0.8, 5);
        let other = entry(SignalCategory::FollowUp, "send the deck", 0.8, 5);

        assert_eq!(store.insert_unique(&a, None).unwrap(), None);
        assert_eq!(store.insert_unique(&b, None).unwrap(), Some(a.id));
        assert_eq!(store.insert_unique(&other, None).unwrap(), None);

        store.resolve(a.id, Resolution::Dismissed, t0()).unwrap();
        assert_eq!(store.insert_unique(&b, None).unwrap(), None);
        assert_eq!(store.pending_count().unwrap(), 2);
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ws.db");
        let e = entry(SignalCategory::PeopleWaiting, "Dana is waiting on me", 0.85, 0);
        {
            let store = SqliteInsightStore::open(&path).unwrap();
            store.insert(&e).unwrap();
        }
        let reopened = SqliteInsightStore::open(&path).unwrap();
        assert_eq!(reopened.get(e.id).unwrap().unwrap(), e);
    }
}
