use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// The appointment status state machine.
///
/// The source system persisted whatever status string it was handed; here the
/// reachable set is closed and checked before anything is written.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_transition(
        &self,
        current: &AppointmentStatus,
        new: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current, new);

        if !self.valid_transitions(current).contains(new) {
            warn!("Invalid status transition attempted: {} -> {}", current, new);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current.clone(),
                to: new.clone(),
            });
        }

        Ok(())
    }

    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Pending => vec![
                AppointmentStatus::Approved,
                AppointmentStatus::Rejected,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Approved => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            // Terminal states.
            AppointmentStatus::Rejected
            | AppointmentStatus::Cancelled
            | AppointmentStatus::Completed => vec![],
        }
    }
}

impl Default for AppointmentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
