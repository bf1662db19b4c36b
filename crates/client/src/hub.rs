//! Push-messaging contract and the chat inbox synchronizer.
//!
//! The hub is the primary update path. A reconciliation poll replaces the
//! whole inbox at a fixed interval to recover from anything the hub missed.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use custodia_core::domain::chat::ConversationId;
use custodia_core::{ChatInbox, HubEvent, InboxEffect};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::{ApiError, PortalApi};

pub trait EventHub: Send + Sync {
    fn subscribe(&self) -> Subscription;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Event(HubEvent),
    /// The subscriber fell behind and `skipped` events were dropped.
    Lagged { skipped: u64 },
}

/// Live hub subscription. Dropping it unsubscribes.
pub struct Subscription {
    receiver: broadcast::Receiver<HubEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    /// Next delivery, or `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<Delivery> {
        match self.receiver.recv().await {
            Ok(event) => Some(Delivery::Event(event)),
            Err(RecvError::Lagged(skipped)) => Some(Delivery::Lagged { skipped }),
            Err(RecvError::Closed) => None,
        }
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.subscribers.fetch_sub(1, Ordering::AcqRel);
    }
}

/// In-process hub over a tokio broadcast channel.
#[derive(Clone)]
pub struct BroadcastHub {
    sender: broadcast::Sender<HubEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, subscribers: Arc::new(AtomicUsize::new(0)) }
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: HubEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Acquire)
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventHub for BroadcastHub {
    fn subscribe(&self) -> Subscription {
        self.subscribers.fetch_add(1, Ordering::AcqRel);
        Subscription { receiver: self.sender.subscribe(), subscribers: self.subscribers.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboxChange {
    Appended { conversation_id: ConversationId },
    Reloaded { conversations: usize },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub appended: usize,
    pub duplicates: usize,
    pub reloads: usize,
    pub failed_reloads: usize,
}

/// Keeps a `ChatInbox` current from hub events plus a reconciliation poll.
pub struct InboxSync {
    api: Arc<dyn PortalApi>,
    inbox: ChatInbox,
    reconcile_every: Duration,
    stats: SyncStats,
}

impl InboxSync {
    pub fn new(api: Arc<dyn PortalApi>, reconcile_every: Duration) -> Self {
        Self { api, inbox: ChatInbox::default(), reconcile_every, stats: SyncStats::default() }
    }

    pub fn inbox(&self) -> &ChatInbox {
        &self.inbox
    }

    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Replaces the inbox with the backend's conversations.
    pub async fn reload(&mut self) -> Result<usize, ApiError> {
        let conversations = self.api.list_conversations().await?;
        let count = conversations.len();
        self.inbox.replace_all(conversations);
        self.stats.reloads += 1;
        Ok(count)
    }

    /// Runs until `shutdown` resolves or the hub closes. Only the initial
    /// load is fatal; later reload failures are logged and retried on the
    /// next poll.
    pub async fn run<F>(
        &mut self,
        subscription: &mut Subscription,
        shutdown: F,
        mut on_change: impl FnMut(&InboxChange, &ChatInbox),
    ) -> Result<SyncStats, ApiError>
    where
        F: Future<Output = ()>,
    {
        let conversations = self.reload().await?;
        on_change(&InboxChange::Reloaded { conversations }, &self.inbox);

        let mut poll = interval_at(Instant::now() + self.reconcile_every, self.reconcile_every);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                delivery = subscription.next() => match delivery {
                    Some(Delivery::Event(event)) => self.handle_event(event, &mut on_change).await,
                    Some(Delivery::Lagged { skipped }) => {
                        warn!(event_name = "chat.hub.lagged", skipped, "hub subscriber lagged; reloading");
                        self.try_reload(&mut on_change).await;
                    }
                    None => {
                        info!(event_name = "chat.hub.closed", "hub closed; stopping inbox sync");
                        break;
                    }
                },
                _ = poll.tick() => {
                    debug!(event_name = "chat.reconcile.tick");
                    self.try_reload(&mut on_change).await;
                }
            }
        }

        Ok(self.stats)
    }

    async fn handle_event(
        &mut self,
        event: HubEvent,
        on_change: &mut impl FnMut(&InboxChange, &ChatInbox),
    ) {
        let conversation_id = match &event {
            HubEvent::MessageReceived { message } => message.conversation_id.clone(),
            HubEvent::ConversationCreated { conversation_id } => conversation_id.clone(),
        };

        match self.inbox.apply(event) {
            InboxEffect::Appended => {
                self.stats.appended += 1;
                on_change(&InboxChange::Appended { conversation_id }, &self.inbox);
            }
            InboxEffect::Duplicate => {
                self.stats.duplicates += 1;
                debug!(event_name = "chat.message.duplicate", conversation_id = %conversation_id.0);
            }
            InboxEffect::ReloadRequired => self.try_reload(on_change).await,
        }
    }

    async fn try_reload(&mut self, on_change: &mut impl FnMut(&InboxChange, &ChatInbox)) {
        match self.reload().await {
            Ok(conversations) => on_change(&InboxChange::Reloaded { conversations }, &self.inbox),
            Err(error) => {
                self.stats.failed_reloads += 1;
                warn!(event_name = "chat.reload.failed", error = %error, "chat reload failed");
            }
        }
    }
}
