use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use patient_cell::models::PatientProfile;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    /// Identity snapshot taken at booking time; promoted to a directory
    /// record only when the appointment is approved.
    pub patient: PatientProfile,
    pub provider_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(&self.provider_name, self.date, self.time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    /// Whether an appointment in this status holds a seat in its slot.
    pub fn occupies_capacity(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Approved | AppointmentStatus::Completed
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Cancelled | AppointmentStatus::Completed
        )
    }

    /// Rescheduling re-enters review, so only pending and approved
    /// appointments may move.
    pub fn allows_reschedule(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Approved)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Approved => write!(f, "approved"),
            AppointmentStatus::Rejected => write!(f, "rejected"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// The capacity-accounting unit: one provider, one civil date, one slot time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub provider_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl SlotKey {
    pub fn new(provider_name: &str, date: NaiveDate, time: NaiveTime) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            date,
            time,
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}", self.provider_name, self.date, self.time)
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub provider_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub patient: PatientProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
    pub new_provider_name: Option<String>,
}

/// Result of a capacity check. `available == false` with `max_allowed == 0`
/// means the provider has no window at this time, as opposed to a full slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotAvailability {
    pub available: bool,
    pub current_count: u32,
    pub max_allowed: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenSlot {
    pub time: NaiveTime,
    pub current_count: u32,
    pub max_allowed: u32,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("appointment not found")]
    NotFound,

    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error("slot not available: {0}")]
    SlotUnavailable(String),

    #[error("invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("validation error: {0}")]
    Validation(String),
}
