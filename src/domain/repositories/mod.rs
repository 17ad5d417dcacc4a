use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::models::{Broadcast, BroadcastContact, BroadcastStatus, ContactStatus};

/// Per-status contact tallies for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactStatusCounts {
    pub pending: u64,
    pub running: u64,
    pub success: u64,
    pub failed: u64,
}

impl ContactStatusCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.running + self.success + self.failed
    }
}

#[async_trait]
pub trait BroadcastRepository: Send + Sync {
    async fn insert(&self, broadcast: &Broadcast) -> anyhow::Result<()>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Broadcast>>;

    async fn update_status(&self, id: Uuid, status: BroadcastStatus) -> anyhow::Result<()>;

    /// Conditional status transition; returns false when the broadcast is not
    /// currently in `from`. Used for idempotent claims.
    async fn transition(
        &self,
        id: Uuid,
        from: BroadcastStatus,
        to: BroadcastStatus,
    ) -> anyhow::Result<bool>;

    /// Broadcasts in Pending or Running state, oldest first.
    async fn find_dispatchable(&self) -> anyhow::Result<Vec<Broadcast>>;

    /// The most recently created broadcast, if any.
    async fn find_most_recent(&self) -> anyhow::Result<Option<Broadcast>>;

    /// Removes the broadcast together with its contact rows.
    async fn delete(&self, id: Uuid) -> anyhow::Result<()>;
}

#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn insert_batch(&self, contacts: &[BroadcastContact]) -> anyhow::Result<()>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<BroadcastContact>>;

    /// Up to `limit` Pending contacts of one broadcast, in insertion order.
    async fn pending_batch(
        &self,
        broadcast_id: Uuid,
        limit: u32,
    ) -> anyhow::Result<Vec<BroadcastContact>>;

    /// Atomic Pending -> Running transition. Returns false when the contact
    /// was not Pending, i.e. another cycle already claimed it.
    async fn claim_running(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn mark_success(&self, id: Uuid, send_at: DateTime<Utc>) -> anyhow::Result<()>;

    async fn mark_failed(&self, id: Uuid, reason: &str) -> anyhow::Result<()>;

    async fn mark_pending(&self, id: Uuid) -> anyhow::Result<()>;

    /// Crash recovery: reverts every Running contact to Pending and returns
    /// the ids of the owning broadcasts. A send whose status update did not
    /// persist before the interruption will be retried, so delivery is
    /// at-least-once, not exactly-once.
    async fn reset_orphaned_running(&self) -> anyhow::Result<Vec<Uuid>>;

    /// Re-queues a broadcast's Failed contacts; returns how many changed.
    async fn reset_failed(&self, broadcast_id: Uuid) -> anyhow::Result<u64>;

    /// True while any contact of the broadcast is still Pending or Running.
    async fn has_unfinished(&self, broadcast_id: Uuid) -> anyhow::Result<bool>;

    async fn list_by_broadcast(
        &self,
        broadcast_id: Uuid,
    ) -> anyhow::Result<Vec<BroadcastContact>>;

    async fn status_counts(&self, broadcast_id: Uuid) -> anyhow::Result<ContactStatusCounts>;

    async fn count_by_status(
        &self,
        broadcast_id: Uuid,
        status: ContactStatus,
    ) -> anyhow::Result<u64>;
}
