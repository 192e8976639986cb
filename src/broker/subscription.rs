//! Subscription table: sid allocation and per-subscription dispatch.
//!
//! Each subscription owns an unbounded channel draining into a dedicated
//! task that invokes the subscriber's callback one message at a time. A
//! callback that suspends only ever backs up its own channel — it never
//! blocks the connection's single read loop from dispatching the next
//! message to a different subscription.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::ids::SubscriptionId;

/// A message delivered to a subscription callback.
#[derive(Debug, Clone)]
pub struct Message {
    pub subject: String,
    pub sid: SubscriptionId,
    pub reply: Option<String>,
    pub payload: Vec<u8>,
}

pub type DispatchFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type Callback = Arc<dyn Fn(Message) -> DispatchFuture + Send + Sync>;

/// Wrap a plain (possibly async) closure as a [`Callback`].
pub fn callback<F, Fut>(f: F) -> Callback
where
    F: Fn(Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |msg| Box::pin(f(msg)) as DispatchFuture)
}

struct Entry {
    subject: String,
    tx: mpsc::UnboundedSender<Message>,
    task: JoinHandle<()>,
}

/// Owns every live subscription for one connection. Sids are allocated by a
/// monotonic counter that is never reset, so unsubscribing never frees a
/// sid for reuse.
pub struct SubscriptionTable {
    next_sid: AtomicU64,
    entries: Mutex<HashMap<u64, Entry>>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self {
            next_sid: AtomicU64::new(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next sid. Strictly monotonic across the table's
    /// lifetime, including past unsubscribed sids.
    pub fn alloc_sid(&self) -> u64 {
        self.next_sid.fetch_add(1, Ordering::SeqCst)
    }

    pub async fn register(&self, sid: u64, subject: String, callback: Callback) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let task = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                callback(msg).await;
            }
        });
        let mut entries = self.entries.lock().await;
        entries.insert(sid, Entry { subject, tx, task });
    }

    /// Hand a message off to the subscription's dispatch task. Returns
    /// `false` and drops the message silently if no subscription owns this
    /// sid anymore.
    pub async fn dispatch(&self, sid: u64, msg: Message) -> bool {
        let entries = self.entries.lock().await;
        match entries.get(&sid) {
            Some(entry) => entry.tx.send(msg).is_ok(),
            None => false,
        }
    }

    /// Idempotent: removing an unknown sid is a no-op that returns `false`.
    pub async fn remove(&self, sid: u64) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(&sid) {
            Some(entry) => {
                entry.task.abort();
                true
            }
            None => false,
        }
    }

    pub async fn subject_of(&self, sid: u64) -> Option<String> {
        let entries = self.entries.lock().await;
        entries.get(&sid).map(|e| e.subject.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self::new()
    }
}
