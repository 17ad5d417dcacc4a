use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl ContactStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContactStatus::Pending => "pending",
            ContactStatus::Running => "running",
            ContactStatus::Success => "success",
            ContactStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ContactStatus::Pending),
            "running" => Some(ContactStatus::Running),
            "success" => Some(ContactStatus::Success),
            "failed" => Some(ContactStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ContactStatus::Success | ContactStatus::Failed)
    }
}

/// One recipient row inside a broadcast. `position` preserves insertion order
/// so pending batches are pulled in the order the recipients were added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastContact {
    pub id: Uuid,
    pub broadcast_id: Uuid,
    pub position: u32,
    pub number: String,
    pub name: Option<String>,
    pub status: ContactStatus,
    pub error: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub send_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BroadcastContact {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.number)
    }
}
