use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use tracing::debug;
use uuid::Uuid;

use availability_cell::models::DayOfWeek;
use availability_cell::services::AvailabilityRegistry;
use shared_config::SchedulingConfig;

use crate::models::{AppointmentError, OpenSlot, SlotAvailability};
use crate::services::ledger::AppointmentLedger;

pub const REASON_NO_WINDOW: &str = "provider not available at this time";
pub const REASON_SLOT_FULL: &str = "slot is fully booked";
pub const REASON_AVAILABLE: &str = "slot available";

/// Read-only capacity arithmetic for one `(provider, date, time)` triple.
///
/// This is a check, not a reservation: the orchestrator re-runs it under the
/// per-slot lock before committing a booking.
pub struct SlotCapacityEvaluator {
    registry: Arc<AvailabilityRegistry>,
    ledger: Arc<dyn AppointmentLedger>,
    slot_interval_minutes: u32,
}

impl SlotCapacityEvaluator {
    pub fn new(
        registry: Arc<AvailabilityRegistry>,
        ledger: Arc<dyn AppointmentLedger>,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            slot_interval_minutes: config.slot_interval_minutes.max(1),
        }
    }

    pub async fn check_availability(
        &self,
        provider_name: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<SlotAvailability, AppointmentError> {
        self.evaluate(provider_name, date, time, None).await
    }

    /// Capacity check with an optional appointment excluded from the count,
    /// so a reschedule does not compete with its own seat.
    pub async fn evaluate(
        &self,
        provider_name: &str,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<SlotAvailability, AppointmentError> {
        let provider = self
            .registry
            .provider_by_name(provider_name)
            .await
            .ok_or_else(|| AppointmentError::ProviderNotFound(provider_name.to_string()))?;

        let day_of_week = DayOfWeek::from(date.weekday());
        let Some(window) = self.registry.find_window(provider.id, day_of_week, time).await else {
            debug!(
                "No availability window for {} on {} at {}",
                provider.name, date, time
            );
            return Ok(SlotAvailability {
                available: false,
                current_count: 0,
                max_allowed: 0,
                reason: REASON_NO_WINDOW.to_string(),
            });
        };

        let current_count = self
            .ledger
            .count_occupying(&provider.name, date, time, exclude)
            .await?;
        let available = current_count < window.max_per_slot;

        Ok(SlotAvailability {
            available,
            current_count,
            max_allowed: window.max_per_slot,
            reason: if available { REASON_AVAILABLE } else { REASON_SLOT_FULL }.to_string(),
        })
    }

    /// Enumerate the day's slot times at the configured interval and report
    /// the ones with remaining capacity. Overlapping windows resolve to the
    /// earliest-created one, matching `find_window`.
    pub async fn list_open_slots(
        &self,
        provider_name: &str,
        date: NaiveDate,
    ) -> Result<Vec<OpenSlot>, AppointmentError> {
        let provider = self
            .registry
            .provider_by_name(provider_name)
            .await
            .ok_or_else(|| AppointmentError::ProviderNotFound(provider_name.to_string()))?;

        let day_of_week = DayOfWeek::from(date.weekday());
        let windows = self.registry.windows_for_day(provider.id, day_of_week).await;
        let appointments = self
            .ledger
            .find_by_provider_and_date(&provider.name, date)
            .await?;

        let step = Duration::minutes(self.slot_interval_minutes as i64);
        let mut slots: BTreeMap<NaiveTime, OpenSlot> = BTreeMap::new();

        for window in &windows {
            let mut time = window.start_time;
            while window.contains(time) {
                slots.entry(time).or_insert_with(|| {
                    let current_count = appointments
                        .iter()
                        .filter(|appointment| {
                            appointment.time == time && appointment.status.occupies_capacity()
                        })
                        .count() as u32;
                    OpenSlot {
                        time,
                        current_count,
                        max_allowed: window.max_per_slot,
                    }
                });

                let (next, wrapped) = time.overflowing_add_signed(step);
                if wrapped != 0 || next <= time {
                    break;
                }
                time = next;
            }
        }

        Ok(slots
            .into_values()
            .filter(|slot| slot.current_count < slot.max_allowed)
            .collect())
    }
}
