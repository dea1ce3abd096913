//! Collaborator seams for the delivery controller.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::VigilResult;
use crate::types::{CheckRequest, CheckResponse, QueueEntry, Resolution, ResolveOutcome};

/// Where a session gets its insights from: the in-process engine or a
/// remote queue server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InsightSource: Send + Sync {
    /// Is there something to show right now?
    async fn check(&self, request: CheckRequest) -> VigilResult<CheckResponse>;

    /// Record an outcome for an entry.
    async fn resolve(&self, entry_id: Uuid, outcome: Resolution) -> VigilResult<ResolveOutcome>;
}

/// Opens a full conversation seeded with an insight.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationHandoff: Send + Sync {
    async fn open_conversation(&self, entry: &QueueEntry) -> VigilResult<()>;
}
