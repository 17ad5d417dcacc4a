use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    application::services::duplicate_guard,
    domain::{
        errors::DomainError,
        models::{Broadcast, BroadcastContact, BroadcastStatus, ContactStatus, MessagePayload},
        repositories::{BroadcastRepository, ContactRepository},
        value_objects::SmartPauseWindow,
    },
};

pub struct CreateBroadcastUseCase {
    broadcasts: Arc<dyn BroadcastRepository>,
    contacts: Arc<dyn ContactRepository>,
}

pub struct CreateBroadcastRequest {
    pub name: Option<String>,
    pub message: MessagePayload,
    pub recipients: Vec<Recipient>,
    pub is_typing: bool,
    pub validate_numbers: bool,
    pub scheduled_at: Option<chrono::DateTime<Utc>>,
    pub smart_pause: Option<SmartPauseWindow>,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
}

pub struct Recipient {
    pub number: String,
    pub name: Option<String>,
}

pub struct CreateBroadcastResponse {
    pub broadcast_id: Uuid,
    /// Advisory: the message text matches the previous broadcast's. The
    /// broadcast is created regardless; callers decide what to show the user.
    pub duplicate_of_previous: bool,
}

impl CreateBroadcastUseCase {
    pub fn new(
        broadcasts: Arc<dyn BroadcastRepository>,
        contacts: Arc<dyn ContactRepository>,
    ) -> Self {
        Self { broadcasts, contacts }
    }

    pub async fn execute(
        &self,
        request: CreateBroadcastRequest,
    ) -> anyhow::Result<CreateBroadcastResponse> {
        validate(&request)?;

        let duplicate_of_previous = match self.broadcasts.find_most_recent().await? {
            Some(previous) => duplicate_guard::is_duplicate(&request.message, &previous),
            None => false,
        };

        let now = Utc::now();
        let broadcast = Broadcast {
            id: Uuid::new_v4(),
            name: request.name,
            message: request.message,
            is_typing: request.is_typing,
            validate_numbers: request.validate_numbers,
            scheduled_at: request.scheduled_at,
            smart_pause: request.smart_pause,
            status: BroadcastStatus::Pending,
            delay_min_ms: request.delay_min_ms,
            delay_max_ms: request.delay_max_ms,
            created_at: now,
            updated_at: now,
        };

        // each contact inherits the broadcast's start time as its own
        // earliest send instant
        let contact_scheduled_at = request.scheduled_at.or(Some(now));
        let rows: Vec<BroadcastContact> = request
            .recipients
            .into_iter()
            .enumerate()
            .map(|(position, recipient)| BroadcastContact {
                id: Uuid::new_v4(),
                broadcast_id: broadcast.id,
                position: position as u32,
                number: recipient.number,
                name: recipient.name,
                status: ContactStatus::Pending,
                error: None,
                scheduled_at: contact_scheduled_at,
                send_at: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        self.broadcasts.insert(&broadcast).await?;
        self.contacts.insert_batch(&rows).await?;

        Ok(CreateBroadcastResponse {
            broadcast_id: broadcast.id,
            duplicate_of_previous,
        })
    }
}

fn validate(request: &CreateBroadcastRequest) -> Result<(), DomainError> {
    if request.recipients.is_empty() {
        return Err(DomainError::Validation("broadcast needs at least one recipient".into()));
    }
    if request.recipients.iter().any(|r| r.number.trim().is_empty()) {
        return Err(DomainError::Validation("recipient number must not be empty".into()));
    }
    if request.delay_min_ms > request.delay_max_ms {
        return Err(DomainError::Validation("delay_min_ms exceeds delay_max_ms".into()));
    }
    if let MessagePayload::Text { body } = &request.message {
        if body.trim().is_empty() {
            return Err(DomainError::Validation("text message body must not be empty".into()));
        }
    }
    if let MessagePayload::Poll { options, .. } = &request.message {
        if options.len() < 2 {
            return Err(DomainError::Validation("poll needs at least two options".into()));
        }
    }
    Ok(())
}
