use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    application::services::{
        delivery::{DeliveryAdapter, deliver},
        renderer,
        schedule_gate::{self, ScheduleDecision},
    },
    config::DispatcherConfig,
    domain::{
        models::{Broadcast, BroadcastContact, BroadcastStatus},
        repositories::{BroadcastRepository, ContactRepository},
    },
};

enum SendOutcome {
    Delivered,
    Rejected(String),
}

/// Drives broadcasts through their lifecycle: claims pending contact batches,
/// renders and sends one message at a time, records outcomes, and reacts to
/// pause/cancel between contacts.
///
/// All durable state lives in the repositories. The only in-memory state is
/// the set of broadcasts with a cycle currently in flight, which exists so a
/// manual `check_scheduled` call cannot start a second cycle for a broadcast
/// the periodic tick is already advancing.
pub struct BroadcastDispatcher {
    broadcasts: Arc<dyn BroadcastRepository>,
    contacts: Arc<dyn ContactRepository>,
    adapter: Arc<dyn DeliveryAdapter>,
    config: DispatcherConfig,
    in_flight: Mutex<HashSet<Uuid>>,
}

impl BroadcastDispatcher {
    pub fn new(
        broadcasts: Arc<dyn BroadcastRepository>,
        contacts: Arc<dyn ContactRepository>,
        adapter: Arc<dyn DeliveryAdapter>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            broadcasts,
            contacts,
            adapter,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Crash recovery sweep. Any contact left Running by an interrupted
    /// session is reverted to Pending, and its broadcast returns from Running
    /// to Pending so the next tick picks it up again. Safe to call more than
    /// once.
    pub async fn init(&self) -> anyhow::Result<()> {
        let orphaned = self.contacts.reset_orphaned_running().await?;
        for broadcast_id in &orphaned {
            self.broadcasts
                .transition(*broadcast_id, BroadcastStatus::Running, BroadcastStatus::Pending)
                .await?;
        }
        if !orphaned.is_empty() {
            info!(broadcasts = orphaned.len(), "recovered orphaned running contacts");
        }
        Ok(())
    }

    /// One scheduling pass: every Pending/Running broadcast that the schedule
    /// gate lets through and that has no cycle in flight gets one dispatch
    /// cycle. Cycle errors are logged, never propagated, so one broken
    /// broadcast cannot stall the rest.
    pub async fn check_scheduled(&self) -> anyhow::Result<()> {
        let candidates = self.broadcasts.find_dispatchable().await?;

        for broadcast in candidates {
            match schedule_gate::can_dispatch_now(&broadcast, Utc::now()) {
                ScheduleDecision::Deferred(next) => {
                    debug!(broadcast_id = %broadcast.id, next_eligible = %next, "dispatch deferred");
                    continue;
                }
                ScheduleDecision::Allowed => {}
            }

            let Some(guard) = self.try_begin(broadcast.id) else {
                continue;
            };
            if let Err(err) = self.dispatch_cycle(&broadcast).await {
                warn!(broadcast_id = %broadcast.id, error = %err, "dispatch cycle failed");
            }
            drop(guard);
        }

        Ok(())
    }

    /// Runs the crash-recovery sweep once, then checks for dispatchable
    /// broadcasts on every tick until the task is dropped.
    pub async fn run(&self) -> anyhow::Result<()> {
        self.init().await?;
        let mut ticker = tokio::time::interval(self.config.tick_interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.check_scheduled().await {
                warn!(error = %err, "scheduled check failed");
            }
        }
    }

    /// Halts a broadcast after the contact currently in flight, keeping the
    /// remaining contacts Pending. Resumable.
    pub async fn pause(&self, broadcast_id: Uuid) -> anyhow::Result<()> {
        let broadcast = self.require(broadcast_id).await?;
        if broadcast.status.is_terminal() {
            anyhow::bail!("broadcast already finished");
        }
        self.broadcasts
            .update_status(broadcast_id, BroadcastStatus::Paused)
            .await?;
        info!(broadcast_id = %broadcast_id, "broadcast paused");
        Ok(())
    }

    /// Same interruption semantics as pause, but terminal.
    pub async fn cancel(&self, broadcast_id: Uuid) -> anyhow::Result<()> {
        let broadcast = self.require(broadcast_id).await?;
        if broadcast.status.is_terminal() {
            anyhow::bail!("broadcast already finished");
        }
        self.broadcasts
            .update_status(broadcast_id, BroadcastStatus::Cancelled)
            .await?;
        info!(broadcast_id = %broadcast_id, "broadcast cancelled");
        Ok(())
    }

    /// Makes a paused broadcast eligible again for the next scheduled check.
    pub async fn resume(&self, broadcast_id: Uuid) -> anyhow::Result<()> {
        self.require(broadcast_id).await?;
        let resumed = self
            .broadcasts
            .transition(broadcast_id, BroadcastStatus::Paused, BroadcastStatus::Pending)
            .await?;
        if !resumed {
            anyhow::bail!("broadcast is not paused");
        }
        info!(broadcast_id = %broadcast_id, "broadcast resumed");
        Ok(())
    }

    async fn require(&self, broadcast_id: Uuid) -> anyhow::Result<Broadcast> {
        self.broadcasts
            .get(broadcast_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("broadcast not found"))
    }

    async fn dispatch_cycle(&self, broadcast: &Broadcast) -> anyhow::Result<()> {
        self.broadcasts
            .transition(broadcast.id, BroadcastStatus::Pending, BroadcastStatus::Running)
            .await?;

        let batch = self
            .contacts
            .pending_batch(broadcast.id, self.config.batch_size)
            .await?;

        if batch.is_empty() {
            // completion must be judged on fresh state, not this cycle's view
            if !self.contacts.has_unfinished(broadcast.id).await? {
                let finished = self
                    .broadcasts
                    .transition(broadcast.id, BroadcastStatus::Running, BroadcastStatus::Success)
                    .await?;
                if finished {
                    info!(broadcast_id = %broadcast.id, "broadcast complete");
                }
            }
            return Ok(());
        }

        for contact in batch {
            let current = self.require(broadcast.id).await?;
            match current.status {
                BroadcastStatus::Paused | BroadcastStatus::Cancelled => {
                    info!(
                        broadcast_id = %broadcast.id,
                        status = current.status.as_str(),
                        "stopping mid-batch"
                    );
                    return Ok(());
                }
                _ => {}
            }

            if !self.contacts.claim_running(contact.id).await? {
                // no longer pending, someone else resolved it
                continue;
            }

            match self.process_contact(&current, &contact).await {
                SendOutcome::Delivered => {
                    self.contacts.mark_success(contact.id, Utc::now()).await?;
                    debug!(
                        contact_id = %contact.id,
                        number = %contact.number,
                        kind = current.message.kind().as_str(),
                        "sent"
                    );
                }
                SendOutcome::Rejected(reason) => {
                    self.contacts.mark_failed(contact.id, &reason).await?;
                    warn!(contact_id = %contact.id, number = %contact.number, reason = %reason, "send failed");
                }
            }

            // mandatory throttle, applied after failures too
            self.inter_send_delay(&current).await;
        }

        Ok(())
    }

    /// Processes a single claimed contact. Every failure mode, including
    /// adapter errors and timeouts, collapses into a Rejected outcome so the
    /// batch loop always moves on to the next contact.
    async fn process_contact(&self, broadcast: &Broadcast, contact: &BroadcastContact) -> SendOutcome {
        if broadcast.validate_numbers {
            match self.adapter.contact_exists(&contact.number).await {
                Ok(true) => {}
                Ok(false) => return SendOutcome::Rejected("not registered".to_string()),
                Err(err) => return SendOutcome::Rejected(err.to_string()),
            }
        }

        let rendered = renderer::render_payload(&broadcast.message, contact, &mut rand::thread_rng());

        if broadcast.is_typing {
            let duration = typing_duration(rendered.template_text().unwrap_or(""));
            if let Err(err) = self.adapter.set_typing(&contact.number, duration).await {
                debug!(number = %contact.number, error = %err, "typing indicator ignored");
            }
            tokio::time::sleep(duration).await;
        }

        let send = deliver(self.adapter.as_ref(), &contact.number, &rendered);
        match tokio::time::timeout(self.config.send_timeout, send).await {
            Ok(Ok(())) => SendOutcome::Delivered,
            Ok(Err(err)) => SendOutcome::Rejected(err.to_string()),
            Err(_) => SendOutcome::Rejected("send timed out".to_string()),
        }
    }

    /// Randomized inter-send throttle, uniform over the broadcast's delay
    /// bounds and rounded to whole seconds.
    async fn inter_send_delay(&self, broadcast: &Broadcast) {
        let min = broadcast.delay_min_ms;
        let max = broadcast.delay_max_ms.max(min);
        if max == 0 {
            return;
        }
        let millis = rand::thread_rng().gen_range(min..=max);
        let seconds = millis.div_euclid(1000) + u64::from(millis.rem_euclid(1000) >= 500);
        if seconds > 0 {
            tokio::time::sleep(Duration::from_secs(seconds)).await;
        }
    }

    fn try_begin(&self, broadcast_id: Uuid) -> Option<InFlightGuard<'_>> {
        let mut in_flight = self.in_flight.lock().expect("in-flight set poisoned");
        if !in_flight.insert(broadcast_id) {
            return None;
        }
        Some(InFlightGuard {
            dispatcher: self,
            broadcast_id,
        })
    }
}

/// Marks one broadcast as having a cycle in flight; cleared on drop so an
/// errored cycle cannot leave the broadcast permanently blocked.
struct InFlightGuard<'a> {
    dispatcher: &'a BroadcastDispatcher,
    broadcast_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.dispatcher.in_flight.lock() {
            in_flight.remove(&self.broadcast_id);
        }
    }
}

/// Typing simulation length scales with the message, bounded so long
/// templates do not stall the cycle.
fn typing_duration(text: &str) -> Duration {
    const MS_PER_CHAR: u64 = 30;
    let millis = (text.len() as u64 * MS_PER_CHAR).clamp(400, 3_000);
    Duration::from_millis(millis)
}
