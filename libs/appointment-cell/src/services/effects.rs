use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use uuid::Uuid;

use notification_cell::models::{Notification, NotificationCategory};
use notification_cell::services::NotificationDispatcher;
use patient_cell::models::VisitSummary;
use patient_cell::services::PatientDirectory;

use crate::models::{Appointment, AppointmentStatus};

/// A patient/history write that failed after its status transition had
/// already committed. Kept for manual replay; never rolls the transition
/// back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideEffectFailure {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub target: String,
    pub cause: String,
    pub occurred_at: DateTime<Utc>,
}

/// Runs what must happen after a status change: patient promotion and
/// history on approval, a notification for every transition.
pub struct StatusSideEffectHandler {
    patients: Arc<dyn PatientDirectory>,
    notifier: Arc<dyn NotificationDispatcher>,
    failed: Mutex<Vec<SideEffectFailure>>,
}

impl StatusSideEffectHandler {
    pub fn new(
        patients: Arc<dyn PatientDirectory>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            patients,
            notifier,
            failed: Mutex::new(Vec::new()),
        }
    }

    /// Invoked with the appointment as persisted after the transition.
    /// Nothing in here may fail the caller.
    pub async fn apply(&self, appointment: &Appointment) {
        match appointment.status {
            AppointmentStatus::Approved => {
                self.promote_patient(appointment).await;
                self.notify(appointment, NotificationCategory::Approval).await;
            }
            AppointmentStatus::Rejected => {
                self.notify(appointment, NotificationCategory::Rejection).await;
            }
            AppointmentStatus::Cancelled => {
                self.notify(appointment, NotificationCategory::Cancellation).await;
            }
            AppointmentStatus::Completed => {
                self.notify(appointment, NotificationCategory::Completion).await;
            }
            // Reached only after a reschedule forced the status back.
            AppointmentStatus::Pending => {
                self.notify(appointment, NotificationCategory::Reschedule).await;
            }
        }
    }

    /// Failed patient/history writes awaiting manual replay.
    pub async fn failed_effects(&self) -> Vec<SideEffectFailure> {
        self.failed.lock().await.clone()
    }

    pub async fn drain_failed_effects(&self) -> Vec<SideEffectFailure> {
        std::mem::take(&mut *self.failed.lock().await)
    }

    async fn promote_patient(&self, appointment: &Appointment) {
        let patient = match self.patients.upsert_by_email(appointment.patient.clone()).await {
            Ok(patient) => patient,
            Err(e) => {
                self.record_failure(appointment, "patient_upsert", e.to_string())
                    .await;
                return;
            }
        };

        let visit = VisitSummary {
            appointment_id: appointment.id,
            provider_name: appointment.provider_name.clone(),
            date: appointment.date,
            time: appointment.time,
            summary: format!(
                "Appointment with {} approved for {} {}",
                appointment.provider_name, appointment.date, appointment.time
            ),
        };

        if let Err(e) = self.patients.insert_history(patient.id, visit).await {
            self.record_failure(appointment, "history_insert", e.to_string())
                .await;
            return;
        }

        debug!(
            "Patient {} promoted with history for appointment {}",
            patient.id, appointment.id
        );
    }

    async fn notify(&self, appointment: &Appointment, category: NotificationCategory) {
        let (title, message) = notification_content(appointment, category);
        let notification = Notification {
            recipient_email: appointment.patient.email.clone(),
            recipient_phone: Some(appointment.patient.phone.clone()),
            title,
            message,
            category,
        };

        // Always non-fatal to the transition.
        if let Err(e) = self.notifier.send(notification).await {
            warn!(
                "Notification dispatch failed for appointment {}: {}",
                appointment.id, e
            );
        }
    }

    async fn record_failure(&self, appointment: &Appointment, target: &str, cause: String) {
        error!(
            appointment_id = %appointment.id,
            target,
            %cause,
            "Side effect failed after committed status transition"
        );
        self.failed.lock().await.push(SideEffectFailure {
            appointment_id: appointment.id,
            status: appointment.status.clone(),
            target: target.to_string(),
            cause,
            occurred_at: Utc::now(),
        });
    }
}

fn notification_content(
    appointment: &Appointment,
    category: NotificationCategory,
) -> (String, String) {
    let when = format!(
        "{} on {} at {}",
        appointment.provider_name, appointment.date, appointment.time
    );
    match category {
        NotificationCategory::Approval => (
            "Appointment approved".to_string(),
            format!("Your appointment with {} has been approved.", when),
        ),
        NotificationCategory::Rejection => (
            "Appointment rejected".to_string(),
            format!("Your appointment request with {} was rejected.", when),
        ),
        NotificationCategory::Cancellation => (
            "Appointment cancelled".to_string(),
            format!("Your appointment with {} has been cancelled.", when),
        ),
        NotificationCategory::Completion => (
            "Appointment completed".to_string(),
            format!("Your appointment with {} is complete.", when),
        ),
        NotificationCategory::Reschedule => (
            "Appointment rescheduled".to_string(),
            format!(
                "Your appointment has been moved to {} and is awaiting review.",
                when
            ),
        ),
    }
}
