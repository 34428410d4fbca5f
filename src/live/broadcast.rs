// src/live/broadcast.rs

//! Fan-out of published snapshots to live subscribers.
//!
//! Each publish serializes the snapshot once and hands the same message to
//! every subscriber's bounded channel. A closed channel unsubscribes its
//! owner; a full channel only loses that one message.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::SnapshotStore;
use crate::error::Result;
use crate::models::Snapshot;

/// One serialized snapshot, shared by every subscriber.
pub type Message = Arc<str>;

/// Identifies a subscriber within its broadcaster.
pub type SubscriberId = u64;

#[derive(Debug, Default)]
struct Subscribers {
    next_id: SubscriberId,
    senders: HashMap<SubscriberId, mpsc::Sender<Message>>,
}

/// Delivery counts for one publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub dropped: usize,
    pub disconnected: usize,
}

/// Owns the snapshot store and the live subscriber set.
///
/// Publishing and subscribing hold the same lock, so a new subscriber sees the
/// current snapshot first and every later publish after it, with no gap and
/// no duplicate.
#[derive(Debug)]
pub struct Broadcaster {
    store: SnapshotStore,
    subscribers: Arc<Mutex<Subscribers>>,
    buffer: usize,
}

impl Broadcaster {
    /// `buffer` is the per-subscriber channel capacity (at least 1).
    pub fn new(buffer: usize) -> Self {
        Self {
            store: SnapshotStore::new(),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            buffer: buffer.max(1),
        }
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<Snapshot> {
        self.store.get()
    }

    /// Store `snapshot` and push it to every subscriber.
    ///
    /// The store is always updated, even if serialization fails.
    pub fn publish(&self, snapshot: Snapshot) -> (Arc<Snapshot>, Delivery) {
        let mut subscribers = self.lock();
        let snapshot = self.store.publish(snapshot);

        let message: Message = match serde_json::to_string(&*snapshot) {
            Ok(json) => json.into(),
            Err(e) => {
                log::error!("Failed to serialize snapshot: {}", e);
                return (snapshot, Delivery::default());
            }
        };

        let mut delivery = Delivery::default();
        subscribers.senders.retain(|id, tx| match tx.try_send(Arc::clone(&message)) {
            Ok(()) => {
                delivery.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                log::warn!("Subscriber {} is lagging, dropped one snapshot", id);
                delivery.dropped += 1;
                true
            }
            Err(TrySendError::Closed(_)) => {
                log::debug!("Subscriber {} disconnected", id);
                delivery.disconnected += 1;
                false
            }
        });

        (snapshot, delivery)
    }

    /// Register a subscriber; its first message is the current snapshot.
    pub fn subscribe(&self) -> Result<Subscription> {
        let mut subscribers = self.lock();
        let message: Message = serde_json::to_string(&*self.store.get())?.into();

        let (tx, receiver) = mpsc::channel(self.buffer);
        // Capacity is at least one and the channel is fresh.
        let _ = tx.try_send(message);

        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.senders.insert(id, tx);
        log::debug!(
            "Subscriber {} joined ({} live)",
            id,
            subscribers.senders.len()
        );

        Ok(Subscription {
            id,
            receiver,
            subscribers: Arc::downgrade(&self.subscribers),
        })
    }

    /// Remove a subscriber. Safe to call repeatedly.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.lock().senders.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().senders.len()
    }

    /// Disconnect every subscriber; their feeds end after draining what is
    /// already buffered. Returns how many were removed.
    pub fn close_all(&self) -> usize {
        let mut subscribers = self.lock();
        let count = subscribers.senders.len();
        subscribers.senders.clear();
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Subscribers> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live feed of serialized snapshots. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Message>,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next message; `None` once the broadcaster is gone or
    /// this subscriber was removed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = Message;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .senders
                .remove(&self.id);
        }
    }
}
