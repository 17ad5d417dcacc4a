use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    models::{Broadcast, BroadcastContact, BroadcastStatus, ContactStatus},
    repositories::{
        BroadcastRepository, ContactRepository, ContactStatusCounts,
    },
};

#[derive(Default)]
pub struct InMemoryBroadcastRepository {
    broadcasts: Arc<RwLock<HashMap<Uuid, Broadcast>>>,
}

impl InMemoryBroadcastRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BroadcastRepository for InMemoryBroadcastRepository {
    async fn insert(&self, broadcast: &Broadcast) -> anyhow::Result<()> {
        let mut broadcasts = self.broadcasts.write().await;
        broadcasts.insert(broadcast.id, broadcast.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Broadcast>> {
        let broadcasts = self.broadcasts.read().await;
        Ok(broadcasts.get(&id).cloned())
    }

    async fn update_status(&self, id: Uuid, status: BroadcastStatus) -> anyhow::Result<()> {
        let mut broadcasts = self.broadcasts.write().await;
        if let Some(broadcast) = broadcasts.get_mut(&id) {
            broadcast.status = status;
            broadcast.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BroadcastStatus,
        to: BroadcastStatus,
    ) -> anyhow::Result<bool> {
        let mut broadcasts = self.broadcasts.write().await;
        match broadcasts.get_mut(&id) {
            Some(broadcast) if broadcast.status == from => {
                broadcast.status = to;
                broadcast.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_dispatchable(&self) -> anyhow::Result<Vec<Broadcast>> {
        let broadcasts = self.broadcasts.read().await;
        let mut eligible: Vec<Broadcast> = broadcasts
            .values()
            .filter(|b| {
                matches!(b.status, BroadcastStatus::Pending | BroadcastStatus::Running)
            })
            .cloned()
            .collect();
        eligible.sort_by_key(|b| b.created_at);
        Ok(eligible)
    }

    async fn find_most_recent(&self) -> anyhow::Result<Option<Broadcast>> {
        let broadcasts = self.broadcasts.read().await;
        Ok(broadcasts
            .values()
            .max_by_key(|b| b.created_at)
            .cloned())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<()> {
        let mut broadcasts = self.broadcasts.write().await;
        broadcasts.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryContactRepository {
    contacts: Arc<RwLock<HashMap<Uuid, BroadcastContact>>>,
}

impl InMemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ContactRepository for InMemoryContactRepository {
    async fn insert_batch(&self, batch: &[BroadcastContact]) -> anyhow::Result<()> {
        let mut contacts = self.contacts.write().await;
        for contact in batch {
            contacts.insert(contact.id, contact.clone());
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<BroadcastContact>> {
        let contacts = self.contacts.read().await;
        Ok(contacts.get(&id).cloned())
    }

    async fn pending_batch(
        &self,
        broadcast_id: Uuid,
        limit: u32,
    ) -> anyhow::Result<Vec<BroadcastContact>> {
        let contacts = self.contacts.read().await;
        let mut pending: Vec<BroadcastContact> = contacts
            .values()
            .filter(|c| c.broadcast_id == broadcast_id && c.status == ContactStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|c| c.position);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn claim_running(&self, id: Uuid) -> anyhow::Result<bool> {
        let mut contacts = self.contacts.write().await;
        match contacts.get_mut(&id) {
            Some(contact) if contact.status == ContactStatus::Pending => {
                contact.status = ContactStatus::Running;
                contact.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_success(&self, id: Uuid, send_at: DateTime<Utc>) -> anyhow::Result<()> {
        let mut contacts = self.contacts.write().await;
        if let Some(contact) = contacts.get_mut(&id) {
            contact.status = ContactStatus::Success;
            contact.error = None;
            contact.send_at = Some(send_at);
            contact.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> anyhow::Result<()> {
        let mut contacts = self.contacts.write().await;
        if let Some(contact) = contacts.get_mut(&id) {
            contact.status = ContactStatus::Failed;
            contact.error = Some(reason.to_string());
            contact.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_pending(&self, id: Uuid) -> anyhow::Result<()> {
        let mut contacts = self.contacts.write().await;
        if let Some(contact) = contacts.get_mut(&id) {
            contact.status = ContactStatus::Pending;
            contact.error = None;
            contact.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn reset_orphaned_running(&self) -> anyhow::Result<Vec<Uuid>> {
        let mut contacts = self.contacts.write().await;
        let mut affected = Vec::new();
        for contact in contacts.values_mut() {
            if contact.status == ContactStatus::Running {
                contact.status = ContactStatus::Pending;
                contact.updated_at = Utc::now();
                if !affected.contains(&contact.broadcast_id) {
                    affected.push(contact.broadcast_id);
                }
            }
        }
        Ok(affected)
    }

    async fn reset_failed(&self, broadcast_id: Uuid) -> anyhow::Result<u64> {
        let mut contacts = self.contacts.write().await;
        let mut requeued = 0;
        for contact in contacts.values_mut() {
            if contact.broadcast_id == broadcast_id && contact.status == ContactStatus::Failed {
                contact.status = ContactStatus::Pending;
                contact.error = None;
                contact.updated_at = Utc::now();
                requeued += 1;
            }
        }
        Ok(requeued)
    }

    async fn has_unfinished(&self, broadcast_id: Uuid) -> anyhow::Result<bool> {
        let contacts = self.contacts.read().await;
        Ok(contacts.values().any(|c| {
            c.broadcast_id == broadcast_id
                && matches!(c.status, ContactStatus::Pending | ContactStatus::Running)
        }))
    }

    async fn list_by_broadcast(
        &self,
        broadcast_id: Uuid,
    ) -> anyhow::Result<Vec<BroadcastContact>> {
        let contacts = self.contacts.read().await;
        let mut rows: Vec<BroadcastContact> = contacts
            .values()
            .filter(|c| c.broadcast_id == broadcast_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.position);
        Ok(rows)
    }

    async fn status_counts(&self, broadcast_id: Uuid) -> anyhow::Result<ContactStatusCounts> {
        let contacts = self.contacts.read().await;
        let mut counts = ContactStatusCounts::default();
        for contact in contacts.values().filter(|c| c.broadcast_id == broadcast_id) {
            match contact.status {
                ContactStatus::Pending => counts.pending += 1,
                ContactStatus::Running => counts.running += 1,
                ContactStatus::Success => counts.success += 1,
                ContactStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn count_by_status(
        &self,
        broadcast_id: Uuid,
        status: ContactStatus,
    ) -> anyhow::Result<u64> {
        let contacts = self.contacts.read().await;
        Ok(contacts
            .values()
            .filter(|c| c.broadcast_id == broadcast_id && c.status == status)
            .count() as u64)
    }
}
