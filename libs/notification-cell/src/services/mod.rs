pub mod dispatcher;

pub use dispatcher::{
    LoggingChannel, NotificationChannel, NotificationDispatcher, QueuedNotificationDispatcher,
    RecordingChannel, RecordingDispatcher,
};
