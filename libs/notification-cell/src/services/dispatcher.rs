use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::{Notification, NotificationError};

/// Outbound notification dispatch. `send` must never block the caller on a
/// slow delivery channel.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Delivery backend drained by the queue worker (mail/SMS gateway in
/// production, a recorder in tests).
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Bounded-queue dispatcher: `send` enqueues without waiting, a worker task
/// drains to the channel. A full queue drops the message rather than stalling
/// the booking path.
pub struct QueuedNotificationDispatcher {
    tx: mpsc::Sender<Notification>,
    worker: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

impl QueuedNotificationDispatcher {
    pub fn new(channel: Arc<dyn NotificationChannel>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Notification>(capacity.max(1));

        let worker = tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = channel.deliver(&notification).await {
                    warn!(
                        "Notification delivery to {} failed: {}",
                        notification.recipient_email, e
                    );
                }
            }
            debug!("Notification worker stopped");
        });

        Self {
            tx,
            worker,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Messages dropped because the queue was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Close the queue and wait for the worker to drain it. Test hook and
    /// shutdown path.
    pub async fn shutdown(self) {
        let Self { tx, worker, .. } = self;
        drop(tx);
        let _ = worker.await;
    }
}

#[async_trait]
impl NotificationDispatcher for QueuedNotificationDispatcher {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        match self.tx.try_send(notification) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(notification)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    "Notification queue full, dropping {} notification for {}",
                    notification.category, notification.recipient_email
                );
                Err(NotificationError::QueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(NotificationError::QueueClosed),
        }
    }
}

/// Channel that only logs, the default when no gateway is wired up.
pub struct LoggingChannel;

#[async_trait]
impl NotificationChannel for LoggingChannel {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        info!(
            "[{}] to {}: {} - {}",
            notification.category,
            notification.recipient_email,
            notification.title,
            notification.message
        );
        Ok(())
    }
}

/// Captures deliveries for assertions.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Dispatcher double that records synchronously, for callers that assert on
/// dispatched traffic without running a worker task.
#[derive(Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent.lock().await.push(notification);
        Ok(())
    }
}
