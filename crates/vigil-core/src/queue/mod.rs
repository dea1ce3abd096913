//! Per-workspace insight queue.
//!
//! Each workspace gets its own store ("lane"). Operations on one lane are
//! serialised by that store, so an enqueue or resolve is visible to the
//! next read of the same workspace, and different workspaces never wait
//! on each other.

mod dedup;
mod priority;
mod store;

pub use dedup::{fingerprint, CrossPassDedup};
pub use priority::{entry_score, priority_score, rank, rank_order};
pub use store::{InsightStore, SqliteInsightStore};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::{VigilError, VigilResult};
use crate::types::{EngagementLevel, QueueEntry, Resolution, ResolveOutcome};

const LANE_EXTENSION: &str = "db";

/// Priority-ranked store of scheduled insights, one lane per workspace.
pub struct InsightQueue {
    data_dir: Option<PathBuf>,
    dedup: Option<CrossPassDedup>,
    lanes: RwLock<HashMap<String, Arc<dyn InsightStore>>>,
}

impl InsightQueue {
    /// Create a queue. With a data directory, lanes already on disk are
    /// opened immediately.
    pub fn new(config: &QueueConfig) -> VigilResult<Self> {
        let queue = Self {
            data_dir: config.data_dir.clone(),
            dedup: config.cross_pass_dedup.then(CrossPassDedup::new),
            lanes: RwLock::new(HashMap::new()),
        };
        if let Some(dir) = &queue.data_dir {
            queue.open_existing(dir)?;
        }
        Ok(queue)
    }

    /// A queue whose lanes all live in memory.
    pub fn in_memory() -> Self {
        Self {
            data_dir: None,
            dedup: None,
            lanes: RwLock::new(HashMap::new()),
        }
    }

    /// Builder method to set the cross-pass dedup policy.
    pub fn with_dedup(mut self, policy: Option<CrossPassDedup>) -> Self {
        self.dedup = policy;
        self
    }

    fn open_existing(&self, dir: &Path) -> VigilResult<()> {
        std::fs::create_dir_all(dir)?;
        let mut lanes = self
            .lanes
            .write()
            .map_err(|_| VigilError::internal("queue lane map lock poisoned"))?;

        for dirent in std::fs::read_dir(dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(LANE_EXTENSION) {
                continue;
            }
            let Some(workspace_id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(workspace_from_file_stem)
            else {
                continue;
            };
            let store = SqliteInsightStore::open(&path)?;
            lanes.insert(workspace_id, Arc::new(store));
        }

        info!(dir = %dir.display(), lanes = lanes.len(), "Opened insight queue");
        Ok(())
    }

    /// Workspaces that currently have a lane.
    pub fn workspaces(&self) -> VigilResult<Vec<String>> {
        let lanes = self
            .lanes
            .read()
            .map_err(|_| VigilError::internal("queue lane map lock poisoned"))?;
        let mut ids: Vec<String> = lanes.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn existing_lane(&self, workspace_id: &str) -> VigilResult<Option<Arc<dyn InsightStore>>> {
        let lanes = self
            .lanes
            .read()
            .map_err(|_| VigilError::internal("queue lane map lock poisoned"))?;
        Ok(lanes.get(workspace_id).cloned())
    }

    fn lane(&self, workspace_id: &str) -> VigilResult<Arc<dyn InsightStore>> {
        if workspace_id.trim().is_empty() {
            return Err(VigilError::missing_field("workspace_id"));
        }
        if let Some(lane) = self.existing_lane(workspace_id)? {
            return Ok(lane);
        }

        let mut lanes = self
            .lanes
            .write()
            .map_err(|_| VigilError::internal("queue lane map lock poisoned"))?;
        if let Some(lane) = lanes.get(workspace_id) {
            return Ok(lane.clone());
        }

        let store: Arc<dyn InsightStore> = match &self.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let path = dir.join(format!("{}.{}", hex::encode(workspace_id), LANE_EXTENSION));
                Arc::new(SqliteInsightStore::open(path)?)
            }
            None => Arc::new(SqliteInsightStore::in_memory()?),
        };
        debug!(workspace_id, "Created queue lane");
        lanes.insert(workspace_id.to_string(), store.clone());
        Ok(store)
    }

    fn all_lanes(&self) -> VigilResult<Vec<Arc<dyn InsightStore>>> {
        let lanes = self
            .lanes
            .read()
            .map_err(|_| VigilError::internal("queue lane map lock poisoned"))?;
        Ok(lanes.values().cloned().collect())
    }

    /// Add an entry to its workspace lane.
    ///
    /// Returns `None` when the cross-pass dedup policy is on and an open
    /// entry already covers the same fact.
    pub fn enqueue(&self, entry: QueueEntry) -> VigilResult<Option<QueueEntry>> {
        let lane = self.lane(&entry.workspace_id)?;
        match &self.dedup {
            Some(policy) => {
                if let Some(existing) = policy.apply(lane.as_ref(), &entry)? {
                    debug!(
                        workspace_id = %entry.workspace_id,
                        existing = %existing,
                        category = %entry.category(),
                        "Skipped duplicate insight"
                    );
                    return Ok(None);
                }
            }
            None => lane.insert(&entry)?,
        }
        Ok(Some(entry))
    }

    /// Highest-ranked eligible entry, marked delivered.
    ///
    /// Nothing is returned while engagement is deep or focus mode is on.
    pub fn next_eligible(
        &self,
        workspace_id: &str,
        now: DateTime<Utc>,
        idle_seconds: u64,
        engagement: EngagementLevel,
        focus_mode_active: bool,
    ) -> VigilResult<Option<QueueEntry>> {
        self.select(workspace_id, now, idle_seconds, engagement, focus_mode_active, true)
    }

    /// Same selection as [`next_eligible`](Self::next_eligible) without
    /// marking anything.
    pub fn peek(
        &self,
        workspace_id: &str,
        now: DateTime<Utc>,
        idle_seconds: u64,
        engagement: EngagementLevel,
        focus_mode_active: bool,
    ) -> VigilResult<Option<QueueEntry>> {
        self.select(workspace_id, now, idle_seconds, engagement, focus_mode_active, false)
    }

    fn select(
        &self,
        workspace_id: &str,
        now: DateTime<Utc>,
        idle_seconds: u64,
        engagement: EngagementLevel,
        focus_mode_active: bool,
        mark_delivered: bool,
    ) -> VigilResult<Option<QueueEntry>> {
        if focus_mode_active || engagement == EngagementLevel::Deep {
            return Ok(None);
        }
        match self.existing_lane(workspace_id)? {
            Some(lane) => lane.next_eligible(now, idle_seconds, mark_delivered),
            None => Ok(None),
        }
    }

    /// Record an outcome for an entry in any workspace.
    pub fn resolve(
        &self,
        entry_id: Uuid,
        resolution: Resolution,
        at: DateTime<Utc>,
    ) -> VigilResult<ResolveOutcome> {
        for lane in self.all_lanes()? {
            let outcome = lane.resolve(entry_id, resolution, at)?;
            if outcome != ResolveOutcome::NotFound {
                return Ok(outcome);
            }
        }
        Ok(ResolveOutcome::NotFound)
    }

    /// Record an outcome for an entry known to live in `workspace_id`.
    pub fn resolve_in(
        &self,
        workspace_id: &str,
        entry_id: Uuid,
        resolution: Resolution,
        at: DateTime<Utc>,
    ) -> VigilResult<ResolveOutcome> {
        match self.existing_lane(workspace_id)? {
            Some(lane) => lane.resolve(entry_id, resolution, at),
            None => Ok(ResolveOutcome::NotFound),
        }
    }

    /// Look an entry up in any workspace.
    pub fn get(&self, entry_id: Uuid) -> VigilResult<Option<QueueEntry>> {
        for lane in self.all_lanes()? {
            if let Some(entry) = lane.get(entry_id)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Entries of one workspace, best-ranked first.
    pub fn list(&self, workspace_id: &str, include_resolved: bool) -> VigilResult<Vec<QueueEntry>> {
        let mut entries = match self.existing_lane(workspace_id)? {
            Some(lane) => lane.list(include_resolved)?,
            None => Vec::new(),
        };
        rank(&mut entries);
        Ok(entries)
    }

    /// Open entries in one workspace.
    pub fn pending_count(&self, workspace_id: &str) -> VigilResult<usize> {
        match self.existing_lane(workspace_id)? {
            Some(lane) => lane.pending_count(),
            None => Ok(0),
        }
    }
}

fn workspace_from_file_stem(stem: &str) -> Option<String> {
    hex::decode(stem)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduling::schedule;
    use crate::types::{DeliveryTrigger, Signal, SignalCategory, SignalSource};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 7, 10, 0, 0).unwrap()
    }

    fn entry(workspace: &str, category: SignalCategory, content: &str) -> QueueEntry {
        let signal = Signal::new(category, content, &SignalSource::new("c"), t0(), 0.8);
        QueueEntry::new(workspace, schedule(signal))
    }

    #[test]
    fn test_workspaces_are_isolated() {
        let queue = InsightQueue::in_memory();
        let a = entry("ws-a", SignalCategory::Contradiction, "I meant B");
        let b = entry("ws-b", SignalCategory::Contradiction, "I meant C");
        queue.enqueue(a.clone()).unwrap();
        queue.enqueue(b.clone()).unwrap();

        let next = queue
            .peek("ws-a", t0(), 0, EngagementLevel::Idle, false)
            .unwrap()
            .unwrap();
        assert_eq!(next.id, a.id);
        assert_eq!(queue.pending_count("ws-b").unwrap(), 1);
        assert!(queue
            .peek("ws-missing", t0(), 0, EngagementLevel::Idle, false)
            .unwrap()
            .is_none());
        assert_eq!(queue.workspaces().unwrap(), vec!["ws-a", "ws-b"]);
    }

    #[test]
    fn test_deep_engagement_and_focus_suppress() {
        let queue = InsightQueue::in_memory();
        queue
            .enqueue(entry("ws", SignalCategory::Contradiction, "I meant B"))
            .unwrap();

        assert!(queue
            .next_eligible("ws", t0(), 100, EngagementLevel::Deep, false)
            .unwrap()
            .is_none());
        assert!(queue
            .peek("ws", t0(), 100, EngagementLevel::Away, true)
            .unwrap()
            .is_none());
        assert!(queue
            .peek("ws", t0(), 100, EngagementLevel::Active, false)
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_peek_has_no_side_effects() {
        let queue = InsightQueue::in_memory();
        let e = entry("ws", SignalCategory::PatternBreak, "skipped the standup");
        queue.enqueue(e.clone()).unwrap();

        let peeked = queue.peek("ws", t0(), 0, EngagementLevel::Idle, false).unwrap().unwrap();
        assert_eq!(peeked.resolution(), None);
        assert_eq!(queue.get(e.id).unwrap().unwrap().resolution(), None);

        let next = queue
            .next_eligible("ws", t0(), 0, EngagementLevel::Idle, false)
            .unwrap()
            .unwrap();
        assert_eq!(next.resolution(), Some(Resolution::Delivered));
        assert_eq!(
            queue.get(e.id).unwrap().unwrap().resolution(),
            Some(Resolution::Delivered)
        );
    }

    #[test]
    fn test_resolve_is_visible_immediately() {
        let queue = InsightQueue::in_memory();
        let e = entry("ws", SignalCategory::Contradiction, "I meant B");
        queue.enqueue(e.clone()).unwrap();

        assert_eq!(
            queue.resolve(e.id, Resolution::Dismissed, t0()).unwrap(),
            ResolveOutcome::Resolved
        );
        assert!(queue
            .peek("ws", t0(), 0, EngagementLevel::Idle, false)
            .unwrap()
            .is_none());
        assert_eq!(
            queue.resolve(e.id, Resolution::Engaged, t0()).unwrap(),
            ResolveOutcome::AlreadyResolved
        );
        assert_eq!(
            queue.resolve(Uuid::new_v4(), Resolution::Engaged, t0()).unwrap(),
            ResolveOutcome::NotFound
        );
        assert_eq!(
            queue.resolve_in("other", e.id, Resolution::Engaged, t0()).unwrap(),
            ResolveOutcome::NotFound
        );
    }

    #[test]
    fn test_surface_time_respected() {
        let queue = InsightQueue::in_memory();
        let e = entry("ws", SignalCategory::Commitment, "send the deck")
            .with_trigger(DeliveryTrigger::Idle, 30);
        queue.enqueue(e.clone()).unwrap();

        let early = t0() + Duration::days(1);
        assert!(queue.peek("ws", early, 60, EngagementLevel::Idle, false).unwrap().is_none());
        let due = t0() + Duration::days(2);
        assert!(queue.peek("ws", due, 10, EngagementLevel::Idle, false).unwrap().is_none());
        assert!(queue.peek("ws", due, 30, EngagementLevel::Idle, false).unwrap().is_some());
    }

    #[test]
    fn test_cross_pass_duplicates_kept_by_default() {
        let queue = InsightQueue::in_memory();
        assert!(queue
            .enqueue(entry("ws", SignalCategory::FollowUp, "the contract"))
            .unwrap()
            .is_some());
        assert!(queue
            .enqueue(entry("ws", SignalCategory::FollowUp, "the contract"))
            .unwrap()
            .is_some());
        assert_eq!(queue.pending_count("ws").unwrap(), 2);

        let deduped = InsightQueue::in_memory().with_dedup(Some(CrossPassDedup::new()));
        deduped
            .enqueue(entry("ws", SignalCategory::FollowUp, "the contract"))
            .unwrap();
        assert!(deduped
            .enqueue(entry("ws", SignalCategory::FollowUp, "The contract"))
            .unwrap()
            .is_none());
        assert_eq!(deduped.pending_count("ws").unwrap(), 1);
    }

    #[test]
    fn test_list_is_ranked() {
        let queue = InsightQueue::in_memory();
        let low = entry("ws", SignalCategory::ContextDecay, "the old plan");
        let high = entry("ws", SignalCategory::Contradiction, "I meant B");
        queue.enqueue(low.clone()).unwrap();
        queue.enqueue(high.clone()).unwrap();

        let listed = queue.list("ws", false).unwrap();
        assert_eq!(listed[0].id, high.id);
        assert_eq!(listed[1].id, low.id);
    }

    #[test]
    fn test_empty_workspace_rejected() {
        let queue = InsightQueue::in_memory();
        assert!(queue
            .enqueue(entry("  ", SignalCategory::FollowUp, "the contract"))
            .is_err());
    }

    #[test]
    fn test_file_lanes_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = QueueConfig {
            data_dir: Some(dir.path().to_path_buf()),
            ..QueueConfig::default()
        };
        let e = entry("team/alpha", SignalCategory::Contradiction, "I meant B");
        {
            let queue = InsightQueue::new(&config).unwrap();
            queue.enqueue(e.clone()).unwrap();
        }

        let reopened = InsightQueue::new(&config).unwrap();
        assert_eq!(reopened.workspaces().unwrap(), vec!["team/alpha"]);
        assert_eq!(reopened.get(e.id).unwrap().unwrap().id, e.id);
        assert_eq!(reopened.pending_count("team/alpha").unwrap(), 1);
    }
}
