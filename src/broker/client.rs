//! Thin public API over [`Connection`]: `publish`, `subscribe`,
//! `unsubscribe`, and `request`/reply correlation.
//!
//! `request`'s one-shot reply slot is a stashed [`tokio::sync::oneshot::Sender`]
//! rather than a bespoke future type.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch, Mutex};
use tracing::warn;

use crate::config::Config;
use crate::error::{ConnectionError, RequestError};
use crate::ids::SubscriptionId;

use super::connection::Connection;
use super::subscription::{callback, Callback, Message};

/// A live connection plus the background task that watches for connection
/// closure so in-flight `request` calls can fail fast with
/// `ConnectionClosed` instead of waiting out their full timeout.
pub struct Client {
    connection: Arc<Connection>,
    closed: watch::Receiver<bool>,
}

impl Client {
    /// Open a connection and wrap it as a `Client`.
    pub async fn connect(config: &Config) -> Result<Self, ConnectionError> {
        let (connection, mut errors_rx) = Connection::open(config).await?;
        let connection = Arc::new(connection);

        let (closed_tx, closed_rx) = watch::channel(false);
        tokio::spawn(async move {
            while let Some(err) = errors_rx.recv().await {
                if matches!(err, ConnectionError::Closed) {
                    let _ = closed_tx.send(true);
                    break;
                }
                warn!(%err, "connection error observed");
            }
        });

        Ok(Self {
            connection,
            closed: closed_rx,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: &[u8],
    ) -> Result<(), ConnectionError> {
        self.connection.publish(subject, reply, payload).await
    }

    pub async fn subscribe(
        &self,
        subject: &str,
        cb: Callback,
    ) -> Result<SubscriptionId, ConnectionError> {
        self.connection.subscribe(subject, cb).await
    }

    pub async fn unsubscribe(
        &self,
        sid: &SubscriptionId,
        max_msgs: Option<u64>,
    ) -> Result<(), ConnectionError> {
        self.connection.unsubscribe(sid, max_msgs).await
    }

    /// Invent a fresh reply subject, subscribe a one-shot callback that
    /// resolves a future, publish with `reply_to`, race that future
    /// against `timeout`, then unsubscribe unconditionally. Multiple
    /// concurrent requests are safe — each uses a distinct reply subject.
    pub async fn request(
        &self,
        subject: &str,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, RequestError> {
        let reply_subject = format!("reply.{}", uuid::Uuid::new_v4().simple());

        let (tx, rx) = oneshot::channel::<Message>();
        let tx = Arc::new(Mutex::new(Some(tx)));
        let one_shot = callback(move |msg: Message| {
            let tx = tx.clone();
            async move {
                if let Some(sender) = tx.lock().await.take() {
                    let _ = sender.send(msg);
                }
            }
        });

        let sid = self
            .connection
            .subscribe(&reply_subject, one_shot)
            .await
            .map_err(|_| RequestError::ConnectionClosed)?;

        if let Err(e) = self
            .connection
            .publish(subject, Some(&reply_subject), payload)
            .await
        {
            let _ = self.connection.unsubscribe(&sid, None).await;
            return Err(match e {
                ConnectionError::Closed => RequestError::ConnectionClosed,
                other => RequestError::Serialization(other.to_string()),
            });
        }

        let mut closed = self.closed.clone();
        let result = tokio::select! {
            msg = rx => msg.map(|m| m.payload).map_err(|_| RequestError::ConnectionClosed),
            _ = tokio::time::sleep(timeout) => Err(RequestError::Timeout),
            _ = closed.changed() => Err(RequestError::ConnectionClosed),
        };

        let _ = self.connection.unsubscribe(&sid, None).await;
        result
    }

    pub async fn close(&self) {
        self.connection.close().await;
    }
}
