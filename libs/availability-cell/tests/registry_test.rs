use assert_matches::assert_matches;
use chrono::NaiveTime;
use uuid::Uuid;

use availability_cell::models::{AvailabilityError, CreateWindowRequest, DayOfWeek};
use availability_cell::services::AvailabilityRegistry;

fn t(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn window_request(
    provider_id: Uuid,
    day: DayOfWeek,
    start: NaiveTime,
    end: NaiveTime,
    max_per_slot: u32,
) -> CreateWindowRequest {
    CreateWindowRequest {
        provider_id,
        day_of_week: day,
        start_time: start,
        end_time: end,
        max_per_slot,
    }
}

#[tokio::test]
async fn rejects_inverted_time_range() {
    let registry = AvailabilityRegistry::new();
    let provider = registry.register_provider("Dr. A").await.unwrap();

    let result = registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Monday,
            t(17, 0),
            t(8, 0),
            2,
        ))
        .await;

    assert_matches!(result, Err(AvailabilityError::Validation(_)));
}

#[tokio::test]
async fn rejects_zero_capacity() {
    let registry = AvailabilityRegistry::new();
    let provider = registry.register_provider("Dr. A").await.unwrap();

    let result = registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Monday,
            t(8, 0),
            t(17, 0),
            0,
        ))
        .await;

    assert_matches!(result, Err(AvailabilityError::Validation(_)));
}

#[tokio::test]
async fn rejects_unknown_provider() {
    let registry = AvailabilityRegistry::new();

    let result = registry
        .add_window(window_request(
            Uuid::new_v4(),
            DayOfWeek::Monday,
            t(8, 0),
            t(17, 0),
            2,
        ))
        .await;

    assert_matches!(result, Err(AvailabilityError::ProviderNotFound));
}

#[tokio::test]
async fn rejects_duplicate_provider_name() {
    let registry = AvailabilityRegistry::new();
    registry.register_provider("Dr. A").await.unwrap();

    let result = registry.register_provider("Dr. A").await;
    assert_matches!(result, Err(AvailabilityError::Validation(_)));
}

#[tokio::test]
async fn remove_window_is_idempotent() {
    let registry = AvailabilityRegistry::new();
    let provider = registry.register_provider("Dr. A").await.unwrap();
    let window = registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Monday,
            t(8, 0),
            t(17, 0),
            2,
        ))
        .await
        .unwrap();

    registry.remove_window(window.id).await;
    registry.remove_window(window.id).await;

    assert!(registry.list_windows(provider.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn lists_windows_ordered_by_day_then_start() {
    let registry = AvailabilityRegistry::new();
    let provider = registry.register_provider("Dr. A").await.unwrap();

    registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Wednesday,
            t(9, 0),
            t(12, 0),
            1,
        ))
        .await
        .unwrap();
    registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Monday,
            t(13, 0),
            t(17, 0),
            1,
        ))
        .await
        .unwrap();
    registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Monday,
            t(8, 0),
            t(12, 0),
            1,
        ))
        .await
        .unwrap();

    let windows = registry.list_windows(provider.id).await.unwrap();
    let ordering: Vec<(DayOfWeek, NaiveTime)> = windows
        .iter()
        .map(|window| (window.day_of_week, window.start_time))
        .collect();

    assert_eq!(
        ordering,
        vec![
            (DayOfWeek::Monday, t(8, 0)),
            (DayOfWeek::Monday, t(13, 0)),
            (DayOfWeek::Wednesday, t(9, 0)),
        ]
    );
}

#[tokio::test]
async fn find_window_uses_half_open_interval() {
    let registry = AvailabilityRegistry::new();
    let provider = registry.register_provider("Dr. A").await.unwrap();
    registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Monday,
            t(8, 0),
            t(12, 0),
            2,
        ))
        .await
        .unwrap();

    assert!(registry
        .find_window(provider.id, DayOfWeek::Monday, t(8, 0))
        .await
        .is_some());
    assert!(registry
        .find_window(provider.id, DayOfWeek::Monday, t(11, 30))
        .await
        .is_some());
    assert!(registry
        .find_window(provider.id, DayOfWeek::Monday, t(12, 0))
        .await
        .is_none());
    assert!(registry
        .find_window(provider.id, DayOfWeek::Tuesday, t(9, 0))
        .await
        .is_none());
}

#[tokio::test]
async fn overlapping_windows_resolve_by_creation_order() {
    let registry = AvailabilityRegistry::new();
    let provider = registry.register_provider("Dr. A").await.unwrap();

    let first = registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Monday,
            t(8, 0),
            t(17, 0),
            1,
        ))
        .await
        .unwrap();
    let second = registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Monday,
            t(9, 0),
            t(11, 0),
            5,
        ))
        .await
        .unwrap();

    let found = registry
        .find_window(provider.id, DayOfWeek::Monday, t(9, 30))
        .await
        .unwrap();
    assert_eq!(found.id, first.id);

    // Disabling the first window makes the later one win.
    registry.set_window_available(first.id, false).await.unwrap();
    let found = registry
        .find_window(provider.id, DayOfWeek::Monday, t(9, 30))
        .await
        .unwrap();
    assert_eq!(found.id, second.id);
}

#[tokio::test]
async fn disabled_window_is_not_bookable() {
    let registry = AvailabilityRegistry::new();
    let provider = registry.register_provider("Dr. A").await.unwrap();
    let window = registry
        .add_window(window_request(
            provider.id,
            DayOfWeek::Friday,
            t(8, 0),
            t(12, 0),
            2,
        ))
        .await
        .unwrap();

    registry.set_window_available(window.id, false).await.unwrap();

    assert!(registry
        .find_window(provider.id, DayOfWeek::Friday, t(9, 0))
        .await
        .is_none());
}
