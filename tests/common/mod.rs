#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use broadcast_engine::application::services::delivery::DeliveryAdapter;
use broadcast_engine::domain::models::MediaFile;

pub type AfterSendHook =
    Box<dyn FnMut(usize) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

#[derive(Debug, Clone)]
pub struct SendCall {
    pub number: String,
    pub body: String,
    pub at: Instant,
}

/// Scripted stand-in for the host messaging platform. Sends succeed unless a
/// number is scripted to fail; `after_send` fires once per completed send with
/// the running send count, which lets tests inject pause/cancel at exact
/// points in a batch.
#[derive(Default)]
pub struct FakeDeliveryAdapter {
    pub calls: Mutex<Vec<SendCall>>,
    pub fail_with: Mutex<HashMap<String, String>>,
    pub hanging: Mutex<HashSet<String>>,
    pub unregistered: Mutex<HashSet<String>>,
    pub typing_calls: AtomicUsize,
    pub typing_fails: Mutex<bool>,
    pub after_send: tokio::sync::Mutex<Option<AfterSendHook>>,
}

impl FakeDeliveryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_number(&self, number: &str, reason: &str) {
        self.fail_with
            .lock()
            .unwrap()
            .insert(number.to_string(), reason.to_string());
    }

    pub fn clear_failures(&self) {
        self.fail_with.lock().unwrap().clear();
    }

    /// Sends to this number never resolve; used to exercise the send timeout.
    pub fn hang_number(&self, number: &str) {
        self.hanging.lock().unwrap().insert(number.to_string());
    }

    pub fn mark_unregistered(&self, number: &str) {
        self.unregistered.lock().unwrap().insert(number.to_string());
    }

    pub async fn set_after_send(&self, hook: AfterSendHook) {
        *self.after_send.lock().await = Some(hook);
    }

    pub fn calls(&self) -> Vec<SendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_numbers(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.number).collect()
    }

    async fn complete_send(&self, number: &str, body: &str) -> anyhow::Result<()> {
        let outcome = self.fail_with.lock().unwrap().get(number).cloned();

        self.calls.lock().unwrap().push(SendCall {
            number: number.to_string(),
            body: body.to_string(),
            at: Instant::now(),
        });
        let count = self.calls.lock().unwrap().len();

        let mut hook = self.after_send.lock().await;
        if let Some(hook) = hook.as_mut() {
            hook(count).await;
        }
        drop(hook);

        let hangs = self.hanging.lock().unwrap().contains(number);
        if hangs {
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
        }

        match outcome {
            Some(reason) => Err(anyhow::anyhow!(reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DeliveryAdapter for FakeDeliveryAdapter {
    async fn contact_exists(&self, number: &str) -> anyhow::Result<bool> {
        Ok(!self.unregistered.lock().unwrap().contains(number))
    }

    async fn set_typing(&self, _number: &str, _duration: Duration) -> anyhow::Result<()> {
        self.typing_calls.fetch_add(1, Ordering::SeqCst);
        if *self.typing_fails.lock().unwrap() {
            anyhow::bail!("typing indicator unavailable");
        }
        Ok(())
    }

    async fn send_text(&self, number: &str, body: &str) -> anyhow::Result<()> {
        self.complete_send(number, body).await
    }

    async fn send_image(
        &self,
        number: &str,
        _file: &MediaFile,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        self.complete_send(number, caption.unwrap_or("")).await
    }

    async fn send_video(
        &self,
        number: &str,
        _file: &MediaFile,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        self.complete_send(number, caption.unwrap_or("")).await
    }

    async fn send_document(
        &self,
        number: &str,
        _file: &MediaFile,
        caption: Option<&str>,
    ) -> anyhow::Result<()> {
        self.complete_send(number, caption.unwrap_or("")).await
    }

    async fn send_location(
        &self,
        number: &str,
        _latitude: f64,
        _longitude: f64,
        label: Option<&str>,
    ) -> anyhow::Result<()> {
        self.complete_send(number, label.unwrap_or("")).await
    }

    async fn send_poll(
        &self,
        number: &str,
        question: &str,
        _options: &[String],
        _allow_multiple: bool,
    ) -> anyhow::Result<()> {
        self.complete_send(number, question).await
    }

    async fn send_vcard(&self, number: &str, _contact_ids: &[String]) -> anyhow::Result<()> {
        self.complete_send(number, "").await
    }
}
