use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycle;

/// The authoritative store of appointment records.
///
/// Capacity checks read through `count_occupying`; all writes go through
/// `create`, `transition` and `reschedule`. Records are never deleted, a
/// cancellation is just a status transition.
#[async_trait]
pub trait AppointmentLedger: Send + Sync {
    async fn create(&self, request: BookAppointmentRequest)
        -> Result<Appointment, AppointmentError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Appointment, AppointmentError>;

    /// Case-insensitive exact match on the booking email.
    async fn find_by_patient_email(
        &self,
        email: &str,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn find_by_provider_and_date(
        &self,
        provider_name: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError>;

    /// Seats taken at `(provider, date, time)`, counting only statuses that
    /// occupy capacity. `exclude` removes one appointment from the count,
    /// used when that appointment is being moved into the slot it already
    /// holds.
    async fn count_occupying(
        &self,
        provider_name: &str,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<u32, AppointmentError>;

    async fn transition(
        &self,
        id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError>;

    /// Overwrites the slot coordinates and forces the status back to pending.
    /// Capacity at the destination is the orchestrator's concern.
    async fn reschedule(
        &self,
        id: Uuid,
        new_date: NaiveDate,
        new_time: NaiveTime,
        new_provider_name: Option<String>,
    ) -> Result<Appointment, AppointmentError>;
}

/// Process-lifetime ledger. The write lock serializes mutations, so two
/// transitions on the same id cannot interleave.
pub struct InMemoryAppointmentLedger {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
    lifecycle: AppointmentLifecycle,
}

impl InMemoryAppointmentLedger {
    pub fn new() -> Self {
        Self {
            appointments: RwLock::new(HashMap::new()),
            lifecycle: AppointmentLifecycle::new(),
        }
    }
}

impl Default for InMemoryAppointmentLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AppointmentLedger for InMemoryAppointmentLedger {
    async fn create(
        &self,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient: request.patient,
            provider_name: request.provider_name,
            date: request.date,
            time: request.time,
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());

        debug!("Created appointment {} at {}", appointment.id, appointment.slot());
        Ok(appointment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        self.appointments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AppointmentError::NotFound)
    }

    async fn find_by_patient_email(
        &self,
        email: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let key = email.trim().to_lowercase();
        let mut matches: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|appointment| appointment.patient.email_key() == key)
            .cloned()
            .collect();
        matches.sort_by_key(|appointment| appointment.created_at);
        Ok(matches)
    }

    async fn find_by_provider_and_date(
        &self,
        provider_name: &str,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut matches: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|appointment| {
                appointment.provider_name == provider_name && appointment.date == date
            })
            .cloned()
            .collect();
        matches.sort_by_key(|appointment| appointment.time);
        Ok(matches)
    }

    async fn list_all(&self) -> Result<Vec<Appointment>, AppointmentError> {
        let mut all: Vec<Appointment> = self.appointments.read().await.values().cloned().collect();
        all.sort_by_key(|appointment| appointment.created_at);
        Ok(all)
    }

    async fn count_occupying(
        &self,
        provider_name: &str,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<u32, AppointmentError> {
        let count = self
            .appointments
            .read()
            .await
            .values()
            .filter(|appointment| {
                appointment.provider_name == provider_name
                    && appointment.date == date
                    && appointment.time == time
                    && appointment.status.occupies_capacity()
                    && Some(appointment.id) != exclude
            })
            .count();
        Ok(count as u32)
    }

    async fn transition(
        &self,
        id: Uuid,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;

        self.lifecycle
            .validate_transition(&appointment.status, &new_status)?;

        appointment.status = new_status;
        appointment.updated_at = Utc::now();

        debug!("Appointment {} transitioned to {}", id, appointment.status);
        Ok(appointment.clone())
    }

    async fn reschedule(
        &self,
        id: Uuid,
        new_date: NaiveDate,
        new_time: NaiveTime,
        new_provider_name: Option<String>,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.write().await;
        let appointment = appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;

        if !appointment.status.allows_reschedule() {
            return Err(AppointmentError::InvalidStatusTransition {
                from: appointment.status.clone(),
                to: AppointmentStatus::Pending,
            });
        }

        appointment.date = new_date;
        appointment.time = new_time;
        if let Some(provider_name) = new_provider_name {
            appointment.provider_name = provider_name;
        }
        // Re-enters review regardless of prior status.
        appointment.status = AppointmentStatus::Pending;
        appointment.updated_at = Utc::now();

        debug!("Appointment {} rescheduled to {}", id, appointment.slot());
        Ok(appointment.clone())
    }
}
