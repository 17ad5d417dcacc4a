use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::SmartPauseWindow;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastStatus {
    Pending,
    Running,
    Paused,
    Cancelled,
    Success,
}

impl BroadcastStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastStatus::Pending => "pending",
            BroadcastStatus::Running => "running",
            BroadcastStatus::Paused => "paused",
            BroadcastStatus::Cancelled => "cancelled",
            BroadcastStatus::Success => "success",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(BroadcastStatus::Pending),
            "running" => Some(BroadcastStatus::Running),
            "paused" => Some(BroadcastStatus::Paused),
            "cancelled" => Some(BroadcastStatus::Cancelled),
            "success" => Some(BroadcastStatus::Success),
            _ => None,
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BroadcastStatus::Cancelled | BroadcastStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Document,
    Location,
    Poll,
    VCard,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::Document => "document",
            MessageKind::Location => "location",
            MessageKind::Poll => "poll",
            MessageKind::VCard => "vcard",
        }
    }
}

/// One payload variant per sendable message kind. The variant carried by a
/// broadcast decides which delivery operation the dispatcher invokes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    Text {
        body: String,
    },
    Image {
        file: MediaFile,
        caption: Option<String>,
    },
    Video {
        file: MediaFile,
        caption: Option<String>,
    },
    Document {
        file: MediaFile,
        caption: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        label: Option<String>,
    },
    Poll {
        question: String,
        options: Vec<String>,
        allow_multiple: bool,
    },
    VCard {
        contact_ids: Vec<String>,
    },
}

impl MessagePayload {
    pub fn kind(&self) -> MessageKind {
        match self {
            MessagePayload::Text { .. } => MessageKind::Text,
            MessagePayload::Image { .. } => MessageKind::Image,
            MessagePayload::Video { .. } => MessageKind::Video,
            MessagePayload::Document { .. } => MessageKind::Document,
            MessagePayload::Location { .. } => MessageKind::Location,
            MessagePayload::Poll { .. } => MessageKind::Poll,
            MessagePayload::VCard { .. } => MessageKind::VCard,
        }
    }

    /// Template text subject to rendering: the body for text messages, the
    /// caption for media. Location/poll/vcard payloads carry none.
    pub fn template_text(&self) -> Option<&str> {
        match self {
            MessagePayload::Text { body } => Some(body.as_str()),
            MessagePayload::Image { caption, .. }
            | MessagePayload::Video { caption, .. }
            | MessagePayload::Document { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }
}

/// Reference to an already-uploaded media asset, opaque to the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaFile {
    pub reference: String,
    pub mime_type: String,
    pub file_name: Option<String>,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: Uuid,
    pub name: Option<String>,
    pub message: MessagePayload,
    pub is_typing: bool,
    pub validate_numbers: bool,
    /// Some(t) means the broadcast must not start before `t`.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub smart_pause: Option<SmartPauseWindow>,
    pub status: BroadcastStatus,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
