use std::env;
use tracing::warn;

/// Tunables for the scheduling engine, loaded from the environment.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// Granularity of bookable slots, in minutes.
    pub slot_interval_minutes: u32,
    /// Capacity of the outbound notification queue.
    pub notification_queue_capacity: usize,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_interval_minutes: 30,
            notification_queue_capacity: 256,
        }
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            slot_interval_minutes: read_var(
                "SLOT_INTERVAL_MINUTES",
                defaults.slot_interval_minutes,
            ),
            notification_queue_capacity: read_var(
                "NOTIFICATION_QUEUE_CAPACITY",
                defaults.notification_queue_capacity,
            ),
        }
    }
}

fn read_var<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
