use std::sync::Arc;

use assert_matches::assert_matches;

use notification_cell::models::{Notification, NotificationCategory, NotificationError};
use notification_cell::services::{
    NotificationDispatcher, QueuedNotificationDispatcher, RecordingChannel,
};

fn notification(title: &str) -> Notification {
    Notification {
        recipient_email: "jane@example.com".to_string(),
        recipient_phone: Some("+353 1 555 0100".to_string()),
        title: title.to_string(),
        message: "Your appointment status changed".to_string(),
        category: NotificationCategory::Approval,
    }
}

#[tokio::test]
async fn worker_drains_queue_to_channel() {
    let channel = Arc::new(RecordingChannel::new());
    let dispatcher = QueuedNotificationDispatcher::new(channel.clone(), 16);

    dispatcher.send(notification("first")).await.unwrap();
    dispatcher.send(notification("second")).await.unwrap();
    dispatcher.shutdown().await;

    let sent = channel.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].title, "first");
    assert_eq!(sent[1].title, "second");
}

#[tokio::test]
async fn full_queue_drops_instead_of_blocking() {
    struct StuckChannel;

    #[async_trait::async_trait]
    impl notification_cell::services::NotificationChannel for StuckChannel {
        async fn deliver(
            &self,
            _notification: &Notification,
        ) -> Result<(), NotificationError> {
            // Simulate a gateway that never answers.
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    let dispatcher = QueuedNotificationDispatcher::new(Arc::new(StuckChannel), 1);

    // First message is picked up by the worker, the rest fill and overflow
    // the one-slot queue; none of the sends may block.
    let mut results = Vec::new();
    for i in 0..4 {
        results.push(dispatcher.send(notification(&format!("n{}", i))).await);
    }

    assert!(results.iter().any(|r| r.is_ok()));
    assert_matches!(results.last().unwrap(), Err(NotificationError::QueueFull));
    assert!(dispatcher.dropped_count() >= 1);
}
