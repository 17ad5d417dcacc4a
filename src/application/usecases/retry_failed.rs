use std::sync::Arc;

use uuid::Uuid;

use crate::domain::{
    models::BroadcastStatus,
    repositories::{BroadcastRepository, ContactRepository},
};

/// Re-queues a broadcast's failed contacts. The broadcast itself goes back to
/// Pending so the next scheduled check picks it up.
pub struct RetryFailedUseCase {
    broadcasts: Arc<dyn BroadcastRepository>,
    contacts: Arc<dyn ContactRepository>,
}

pub struct RetryFailedRequest {
    pub broadcast_id: Uuid,
}

pub struct RetryFailedResponse {
    pub requeued: u64,
}

impl RetryFailedUseCase {
    pub fn new(
        broadcasts: Arc<dyn BroadcastRepository>,
        contacts: Arc<dyn ContactRepository>,
    ) -> Self {
        Self { broadcasts, contacts }
    }

    pub async fn execute(&self, request: RetryFailedRequest) -> anyhow::Result<RetryFailedResponse> {
        let broadcast = self
            .broadcasts
            .get(request.broadcast_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("broadcast not found"))?;

        if matches!(broadcast.status, BroadcastStatus::Running) {
            anyhow::bail!("broadcast is still running");
        }

        let requeued = self.contacts.reset_failed(request.broadcast_id).await?;
        if requeued > 0 {
            self.broadcasts
                .update_status(request.broadcast_id, BroadcastStatus::Pending)
                .await?;
        }

        Ok(RetryFailedResponse { requeued })
    }
}
