use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use availability_cell::services::AvailabilityRegistry;
use chrono::{NaiveDate, NaiveTime};
use notification_cell::services::NotificationDispatcher;
use patient_cell::services::PatientDirectory;
use shared_config::SchedulingConfig;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, OpenSlot,
    RescheduleAppointmentRequest, SlotAvailability, SlotKey,
};
use crate::services::capacity::SlotCapacityEvaluator;
use crate::services::effects::{SideEffectFailure, StatusSideEffectHandler};
use crate::services::ledger::AppointmentLedger;

/// One async mutex per slot key. Booking and rescheduling hold the
/// destination slot's lock across check-then-create, which is what keeps a
/// slot from being oversold by racing callers.
pub struct SlotLockRegistry {
    locks: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,
}

impl SlotLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lock_handle(&self, key: &SlotKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

impl Default for SlotLockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The use-case layer: validates booking requests against the capacity
/// evaluator, writes through the ledger, and triggers downstream effects on
/// status transitions.
pub struct AppointmentSchedulingService {
    registry: Arc<AvailabilityRegistry>,
    ledger: Arc<dyn AppointmentLedger>,
    evaluator: SlotCapacityEvaluator,
    effects: StatusSideEffectHandler,
    slot_locks: SlotLockRegistry,
}

impl AppointmentSchedulingService {
    pub fn new(
        registry: Arc<AvailabilityRegistry>,
        ledger: Arc<dyn AppointmentLedger>,
        patients: Arc<dyn PatientDirectory>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: &SchedulingConfig,
    ) -> Self {
        let evaluator =
            SlotCapacityEvaluator::new(Arc::clone(&registry), Arc::clone(&ledger), config);
        let effects = StatusSideEffectHandler::new(patients, notifier);

        Self {
            registry,
            ledger,
            evaluator,
            effects,
            slot_locks: SlotLockRegistry::new(),
        }
    }

    /// Book a slot, or fail with `SlotUnavailable` when the provider has no
    /// window at that time or the slot is full.
    ///
    /// The capacity check and the create commit as one unit under the slot's
    /// lock: of two callers racing for the last seat, exactly one wins and
    /// the other gets the same `SlotUnavailable` a pre-check failure yields.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        validate_booking_request(&request)?;

        let provider = self
            .registry
            .provider_by_name(&request.provider_name)
            .await
            .ok_or_else(|| AppointmentError::ProviderNotFound(request.provider_name.clone()))?;

        let mut request = request;
        request.provider_name = provider.name.clone();

        let key = SlotKey::new(&provider.name, request.date, request.time);
        let slot_lock = self.slot_locks.lock_handle(&key).await;
        let _guard = slot_lock.lock().await;

        let availability = self
            .evaluator
            .evaluate(&provider.name, request.date, request.time, None)
            .await?;
        if !availability.available {
            warn!(
                "Booking rejected for {}: {} ({}/{})",
                key, availability.reason, availability.current_count, availability.max_allowed
            );
            return Err(AppointmentError::SlotUnavailable(availability.reason));
        }

        let appointment = self.ledger.create(request).await?;
        info!(
            "Appointment {} booked at {} for {}",
            appointment.id, key, appointment.patient.email
        );
        Ok(appointment)
    }

    pub async fn approve(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition_with_effects(id, AppointmentStatus::Approved).await
    }

    pub async fn reject(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition_with_effects(id, AppointmentStatus::Rejected).await
    }

    pub async fn cancel(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition_with_effects(id, AppointmentStatus::Cancelled).await
    }

    pub async fn complete(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.transition_with_effects(id, AppointmentStatus::Completed).await
    }

    /// Move an appointment to a new slot, re-entering review.
    ///
    /// Destination capacity is re-validated under the destination slot's
    /// lock, with the moving appointment excluded from the count so a move
    /// within its own slot does not compete with itself. The origin seat is
    /// freed and the destination seat taken in one ledger write.
    pub async fn reschedule(
        &self,
        id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.ledger.find_by_id(id).await?;
        if !current.status.allows_reschedule() {
            return Err(AppointmentError::InvalidStatusTransition {
                from: current.status,
                to: AppointmentStatus::Pending,
            });
        }

        let provider_name = request
            .new_provider_name
            .clone()
            .unwrap_or_else(|| current.provider_name.clone());
        let provider = self
            .registry
            .provider_by_name(&provider_name)
            .await
            .ok_or(AppointmentError::ProviderNotFound(provider_name))?;

        let key = SlotKey::new(&provider.name, request.new_date, request.new_time);
        let slot_lock = self.slot_locks.lock_handle(&key).await;
        let _guard = slot_lock.lock().await;

        let availability = self
            .evaluator
            .evaluate(&provider.name, request.new_date, request.new_time, Some(id))
            .await?;
        if !availability.available {
            warn!(
                "Reschedule of {} rejected, destination {}: {}",
                id, key, availability.reason
            );
            return Err(AppointmentError::SlotUnavailable(availability.reason));
        }

        let updated = self
            .ledger
            .reschedule(id, request.new_date, request.new_time, Some(provider.name))
            .await?;
        info!("Appointment {} rescheduled to {}", id, updated.slot());

        self.effects.apply(&updated).await;
        Ok(updated)
    }

    pub async fn check_availability(
        &self,
        provider_name: &str,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<SlotAvailability, AppointmentError> {
        self.evaluator.check_availability(provider_name, date, time).await
    }

    pub async fn list_open_slots(
        &self,
        provider_name: &str,
        date: NaiveDate,
    ) -> Result<Vec<OpenSlot>, AppointmentError> {
        self.evaluator.list_open_slots(provider_name, date).await
    }

    pub async fn appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.ledger.find_by_id(id).await
    }

    pub async fn appointments_for_patient(
        &self,
        email: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.ledger.find_by_patient_email(email).await
    }

    /// Failed patient/history side effects retained for manual replay.
    pub async fn failed_side_effects(&self) -> Vec<SideEffectFailure> {
        self.effects.failed_effects().await
    }

    pub async fn drain_failed_side_effects(&self) -> Vec<SideEffectFailure> {
        self.effects.drain_failed_effects().await
    }

    async fn transition_with_effects(
        &self,
        id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.ledger.transition(id, new_status).await?;
        // The transition is committed at this point; effect failures are
        // logged and retained, never propagated.
        self.effects.apply(&appointment).await;
        Ok(appointment)
    }
}

fn validate_booking_request(request: &BookAppointmentRequest) -> Result<(), AppointmentError> {
    if request.provider_name.trim().is_empty() {
        return Err(AppointmentError::Validation(
            "provider name must not be blank".to_string(),
        ));
    }
    if request.patient.full_name.trim().is_empty() {
        return Err(AppointmentError::Validation(
            "patient name must not be blank".to_string(),
        ));
    }
    if !request.patient.email.contains('@') {
        return Err(AppointmentError::Validation(format!(
            "invalid patient email: {:?}",
            request.patient.email
        )));
    }
    if request.patient.phone.trim().is_empty() {
        return Err(AppointmentError::Validation(
            "patient phone must not be blank".to_string(),
        ));
    }
    use chrono::Timelike;
    if request.time.second() != 0 || request.time.nanosecond() != 0 {
        return Err(AppointmentError::Validation(
            "slot time must have minute precision".to_string(),
        ));
    }
    Ok(())
}
