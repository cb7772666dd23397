use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Patient, PatientError, PatientProfile, VisitHistoryEntry, VisitSummary};

/// Outbound patient directory consumed by the scheduling engine.
#[async_trait]
pub trait PatientDirectory: Send + Sync {
    /// Create-or-reuse keyed by email. Two concurrent upserts for the same
    /// email must resolve to a single record.
    async fn upsert_by_email(&self, profile: PatientProfile) -> Result<Patient, PatientError>;

    async fn insert_history(
        &self,
        patient_id: Uuid,
        visit: VisitSummary,
    ) -> Result<VisitHistoryEntry, PatientError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Patient>, PatientError>;

    async fn history_for(&self, patient_id: Uuid) -> Result<Vec<VisitHistoryEntry>, PatientError>;
}

#[derive(Default)]
struct DirectoryState {
    by_email: HashMap<String, Patient>,
    email_by_id: HashMap<Uuid, String>,
    history: HashMap<Uuid, Vec<VisitHistoryEntry>>,
}

/// Process-lifetime directory. The single write lock makes the
/// read-check-then-write upsert atomic per email.
pub struct InMemoryPatientDirectory {
    state: RwLock<DirectoryState>,
}

impl InMemoryPatientDirectory {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
        }
    }
}

impl Default for InMemoryPatientDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PatientDirectory for InMemoryPatientDirectory {
    async fn upsert_by_email(&self, profile: PatientProfile) -> Result<Patient, PatientError> {
        let key = profile.email_key();
        if key.is_empty() || !key.contains('@') {
            return Err(PatientError::Validation(format!(
                "invalid patient email: {:?}",
                profile.email
            )));
        }

        let mut state = self.state.write().await;
        let now = Utc::now();

        if let Some(existing) = state.by_email.get_mut(&key) {
            existing.full_name = profile.full_name;
            existing.phone = profile.phone;
            existing.date_of_birth = profile.date_of_birth.or(existing.date_of_birth);
            existing.address = profile.address.or(existing.address.take());
            existing.updated_at = now;
            debug!("Reusing patient {} for email {}", existing.id, key);
            return Ok(existing.clone());
        }

        let patient = Patient {
            id: Uuid::new_v4(),
            full_name: profile.full_name,
            email: profile.email.trim().to_string(),
            phone: profile.phone,
            date_of_birth: profile.date_of_birth,
            address: profile.address,
            created_at: now,
            updated_at: now,
        };
        state.email_by_id.insert(patient.id, key.clone());
        state.by_email.insert(key.clone(), patient.clone());

        debug!("Created patient {} for email {}", patient.id, key);
        Ok(patient)
    }

    async fn insert_history(
        &self,
        patient_id: Uuid,
        visit: VisitSummary,
    ) -> Result<VisitHistoryEntry, PatientError> {
        let mut state = self.state.write().await;
        if !state.email_by_id.contains_key(&patient_id) {
            return Err(PatientError::NotFound);
        }

        let entry = VisitHistoryEntry {
            id: Uuid::new_v4(),
            patient_id,
            appointment_id: visit.appointment_id,
            provider_name: visit.provider_name,
            date: visit.date,
            time: visit.time,
            summary: visit.summary,
            recorded_at: Utc::now(),
        };
        state.history.entry(patient_id).or_default().push(entry.clone());
        Ok(entry)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Patient>, PatientError> {
        let key = email.trim().to_lowercase();
        Ok(self.state.read().await.by_email.get(&key).cloned())
    }

    async fn history_for(&self, patient_id: Uuid) -> Result<Vec<VisitHistoryEntry>, PatientError> {
        let state = self.state.read().await;
        if !state.email_by_id.contains_key(&patient_id) {
            return Err(PatientError::NotFound);
        }
        Ok(state.history.get(&patient_id).cloned().unwrap_or_default())
    }
}
