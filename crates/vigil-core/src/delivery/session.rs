//! Async controller around the bubble state machine.
//!
//! A session owns its engagement tracker, machine and timers. The poll
//! loop and the post-handoff timer both stop when the session is shut
//! down or dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engagement::EngagementTracker;
use super::machine::{BubbleState, DeliveryMachine};
use super::source::{ConversationHandoff, InsightSource};
use crate::config::DeliveryConfig;
use crate::error::{VigilError, VigilResult};
use crate::types::{CheckRequest, EngagementLevel, QueueEntry, Resolution, ResolveOutcome};

struct Inner {
    machine: DeliveryMachine,
    tracker: EngagementTracker,
    handoff_timer: Option<JoinHandle<()>>,
}

struct Shared {
    workspace_id: String,
    config: DeliveryConfig,
    source: Arc<dyn InsightSource>,
    handoff: Arc<dyn ConversationHandoff>,
    focus: watch::Receiver<bool>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<BubbleState>,
    cancel: CancellationToken,
}

/// One user's delivery session for one workspace.
///
/// Must be started from within a tokio runtime.
pub struct BubbleSession {
    shared: Arc<Shared>,
    poll_task: Option<JoinHandle<()>>,
}

impl BubbleSession {
    /// Start a session and its poll loop.
    ///
    /// `focus` is the externally owned focus-mode flag.
    pub fn start(
        workspace_id: impl Into<String>,
        config: DeliveryConfig,
        source: Arc<dyn InsightSource>,
        handoff: Arc<dyn ConversationHandoff>,
        focus: watch::Receiver<bool>,
    ) -> Self {
        let workspace_id = workspace_id.into();
        let mut machine = DeliveryMachine::new();
        if *focus.borrow() {
            machine.set_focus(true);
        }
        let tracker = EngagementTracker::from_config(&config, Instant::now());
        let (state_tx, _) = watch::channel(machine.state());

        let shared = Arc::new(Shared {
            workspace_id,
            config,
            source,
            handoff,
            focus,
            inner: Mutex::new(Inner {
                machine,
                tracker,
                handoff_timer: None,
            }),
            state_tx,
            cancel: CancellationToken::new(),
        });

        info!(workspace_id = %shared.workspace_id, "Bubble session started");
        let poll_task = tokio::spawn(poll_loop(shared.clone()));
        Self {
            shared,
            poll_task: Some(poll_task),
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.shared.workspace_id
    }

    /// Current bubble state.
    pub fn state(&self) -> BubbleState {
        *self.shared.state_tx.borrow()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<BubbleState> {
        self.shared.state_tx.subscribe()
    }

    /// The entry currently held, if any.
    pub async fn held(&self) -> Option<QueueEntry> {
        self.shared.inner.lock().await.machine.held().cloned()
    }

    pub async fn record_keystroke(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.tracker.record_keystroke(Instant::now());
    }

    pub async fn record_activity(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.tracker.record_activity(Instant::now());
    }

    pub async fn engagement(&self) -> EngagementLevel {
        self.shared.inner.lock().await.tracker.level(Instant::now())
    }

    /// Open the held insight and reveal its expanded content.
    ///
    /// The entry is marked delivered at the source; a failure to do so is
    /// logged and does not undo the expansion.
    pub async fn expand(&self) -> VigilResult<QueueEntry> {
        let entry = {
            let mut inner = self.shared.inner.lock().await;
            inner.machine.expand()?;
            self.shared.publish(&inner);
            inner
                .machine
                .held()
                .cloned()
                .ok_or_else(|| VigilError::internal("expanded bubble holds no insight"))?
        };

        if let Err(e) = self.shared.source.resolve(entry.id, Resolution::Delivered).await {
            warn!(entry_id = %entry.id, error = %e, "Failed to mark insight delivered");
        }
        Ok(entry)
    }

    /// Dismiss the open insight.
    ///
    /// The bubble returns to idle either way; an error means the source
    /// did not record the dismissal.
    pub async fn dismiss(&self) -> VigilResult<ResolveOutcome> {
        let id = {
            let mut inner = self.shared.inner.lock().await;
            let id = inner.machine.dismiss()?;
            self.shared.publish(&inner);
            id
        };
        self.shared.source.resolve(id, Resolution::Dismissed).await
    }

    /// Ask for more: resolve as engaged, open a conversation, and return
    /// to idle after the handoff delay.
    pub async fn tell_me_more(&self) -> VigilResult<()> {
        let entry = {
            let mut inner = self.shared.inner.lock().await;
            let entry = inner.machine.tell_me_more()?;
            self.shared.publish(&inner);
            entry
        };

        let resolved = self.shared.source.resolve(entry.id, Resolution::Engaged).await;
        let handed_off = self.shared.handoff.open_conversation(&entry).await;
        self.schedule_return_to_idle().await;

        resolved?;
        handed_off
    }

    async fn schedule_return_to_idle(&self) {
        let shared = self.shared.clone();
        let delay = Duration::from_millis(shared.config.handoff_delay_ms);
        let timer = tokio::spawn(async move {
            tokio::select! {
                _ = shared.cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let mut inner = shared.inner.lock().await;
                    match inner.machine.handoff_complete() {
                        Ok(()) => shared.publish(&inner),
                        Err(e) => debug!(error = %e, "Handoff timer fired outside connected state"),
                    }
                }
            }
        });

        let mut inner = self.shared.inner.lock().await;
        if let Some(previous) = inner.handoff_timer.replace(timer) {
            previous.abort();
        }
    }

    /// Stop the poll loop and any pending handoff timer.
    pub async fn shutdown(mut self) {
        self.shared.cancel.cancel();
        if let Some(task) = self.poll_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Poll loop ended abnormally");
            }
        }
        if let Some(timer) = self.shared.inner.lock().await.handoff_timer.take() {
            timer.abort();
        }
        info!(workspace_id = %self.shared.workspace_id, "Bubble session stopped");
    }
}

impl Drop for BubbleSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl Shared {
    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.machine.state());
    }

    async fn apply_focus(&self, active: bool) {
        let mut inner = self.inner.lock().await;
        inner.machine.set_focus(active);
        self.publish(&inner);
        debug!(workspace_id = %self.workspace_id, active, state = %inner.machine.state(), "Focus mode changed");
    }

    /// Build a check request if the bubble may take an offer right now.
    async fn check_request(&self, session_start: bool) -> Option<CheckRequest> {
        let inner = self.inner.lock().await;
        if !inner.machine.accepts_offers() || *self.focus.borrow() {
            return None;
        }
        let now = Instant::now();
        let engagement = inner.tracker.level(now);
        let allowed = if session_start {
            matches!(engagement, EngagementLevel::Idle | EngagementLevel::Away)
        } else {
            engagement != EngagementLevel::Deep
        };
        if !allowed {
            debug!(workspace_id = %self.workspace_id, %engagement, session_start, "Skipping insight check");
            return None;
        }
        Some(CheckRequest::new(
            self.workspace_id.clone(),
            inner.tracker.idle_seconds(now),
            engagement,
        ))
    }

    async fn check_and_offer(&self, session_start: bool) {
        let Some(request) = self.check_request(session_start).await else {
            return;
        };

        let response = match self.source.check(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(workspace_id = %self.workspace_id, error = %e, "Insight check failed");
                return;
            }
        };
        let Some(entry) = response.insight else {
            return;
        };

        let mut inner = self.inner.lock().await;
        if !inner.machine.accepts_offers() || *self.focus.borrow() {
            return;
        }
        let engagement = inner.tracker.level(Instant::now());
        let entry_id = entry.id;
        let category = entry.category();
        match inner.machine.offer(entry, engagement) {
            Ok(true) => {
                self.publish(&inner);
                info!(workspace_id = %self.workspace_id, %entry_id, %category, "Holding insight");
            }
            Ok(false) => debug!(%entry_id, "User is typing; insight not offered"),
            Err(e) => debug!(error = %e, "Insight offer rejected"),
        }
    }
}

async fn poll_loop(shared: Arc<Shared>) {
    if shared.config.session_start_check {
        tokio::select! {
            _ = shared.cancel.cancelled() => return,
            _ = shared.check_and_offer(true) => {}
        }
    }

    let period = Duration::from_secs(shared.config.poll_interval_secs.max(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut focus = shared.focus.clone();
    let mut focus_open = true;

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => break,
            changed = focus.changed(), if focus_open => match changed {
                Ok(()) => {
                    let active = *focus.borrow_and_update();
                    shared.apply_focus(active).await;
                }
                Err(_) => focus_open = false,
            },
            _ = ticker.tick() => shared.check_and_offer(false).await,
        }
    }
    debug!(workspace_id = %shared.workspace_id, "Poll loop stopped");
}
