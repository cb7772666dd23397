use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Personal-detail snapshot carried on an appointment before the patient is
/// promoted to a directory record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientProfile {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
}

impl PatientProfile {
    /// Directory identity key. Matching is case-insensitive on email.
    pub fn email_key(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitSummary {
    pub appointment_id: Uuid,
    pub provider_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitHistoryEntry {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub appointment_id: Uuid,
    pub provider_name: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub summary: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PatientError {
    #[error("patient not found")]
    NotFound,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("patient store error: {0}")]
    Storage(String),
}
