use std::time::Duration;

use async_trait::async_trait;

use crate::domain::models::{MediaFile, MessagePayload};

/// Boundary to the host messaging platform. Implementations live outside the
/// engine; the dispatcher only ever sees this trait.
///
/// Errors returned from any operation never escape the dispatch loop: the
/// dispatcher records them as a FAILED outcome for the contact in flight.
#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// Whether the recipient is registered on the platform.
    async fn contact_exists(&self, number: &str) -> anyhow::Result<bool>;

    /// Best-effort typing indicator; callers ignore failures.
    async fn set_typing(&self, number: &str, duration: Duration) -> anyhow::Result<()>;

    async fn send_text(&self, number: &str, body: &str) -> anyhow::Result<()>;

    async fn send_image(
        &self,
        number: &str,
        file: &MediaFile,
        caption: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn send_video(
        &self,
        number: &str,
        file: &MediaFile,
        caption: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn send_document(
        &self,
        number: &str,
        file: &MediaFile,
        caption: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn send_location(
        &self,
        number: &str,
        latitude: f64,
        longitude: f64,
        label: Option<&str>,
    ) -> anyhow::Result<()>;

    async fn send_poll(
        &self,
        number: &str,
        question: &str,
        options: &[String],
        allow_multiple: bool,
    ) -> anyhow::Result<()>;

    async fn send_vcard(&self, number: &str, contact_ids: &[String]) -> anyhow::Result<()>;
}

/// Routes a payload to the matching adapter operation. The match is
/// exhaustive, so a new payload variant will not compile without a send path.
pub async fn deliver(
    adapter: &dyn DeliveryAdapter,
    number: &str,
    payload: &MessagePayload,
) -> anyhow::Result<()> {
    match payload {
        MessagePayload::Text { body } => adapter.send_text(number, body).await,
        MessagePayload::Image { file, caption } => {
            adapter.send_image(number, file, caption.as_deref()).await
        }
        MessagePayload::Video { file, caption } => {
            adapter.send_video(number, file, caption.as_deref()).await
        }
        MessagePayload::Document { file, caption } => {
            adapter.send_document(number, file, caption.as_deref()).await
        }
        MessagePayload::Location {
            latitude,
            longitude,
            label,
        } => {
            adapter
                .send_location(number, *latitude, *longitude, label.as_deref())
                .await
        }
        MessagePayload::Poll {
            question,
            options,
            allow_multiple,
        } => {
            adapter
                .send_poll(number, question, options, *allow_multiple)
                .await
        }
        MessagePayload::VCard { contact_ids } => adapter.send_vcard(number, contact_ids).await,
    }
}
