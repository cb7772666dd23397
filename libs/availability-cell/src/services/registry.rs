use std::collections::HashMap;

use chrono::{NaiveTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    AvailabilityError, AvailabilityWindow, CreateWindowRequest, DayOfWeek, Provider,
};

#[derive(Default)]
struct RegistryState {
    providers: HashMap<Uuid, Provider>,
    providers_by_name: HashMap<String, Uuid>,
    windows: HashMap<Uuid, AvailabilityWindow>,
    // Creation order, the tie-break for overlapping windows.
    window_order: Vec<Uuid>,
}

/// Stores each provider's recurring weekly bookable windows.
pub struct AvailabilityRegistry {
    state: RwLock<RegistryState>,
}

impl AvailabilityRegistry {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub async fn register_provider(&self, name: &str) -> Result<Provider, AvailabilityError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AvailabilityError::Validation(
                "provider name must not be blank".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if state.providers_by_name.contains_key(name) {
            return Err(AvailabilityError::Validation(format!(
                "provider {} is already registered",
                name
            )));
        }

        let provider = Provider {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        state.providers_by_name.insert(name.to_string(), provider.id);
        state.providers.insert(provider.id, provider.clone());

        debug!("Registered provider {} ({})", provider.name, provider.id);
        Ok(provider)
    }

    pub async fn provider_by_name(&self, name: &str) -> Option<Provider> {
        let state = self.state.read().await;
        let id = state.providers_by_name.get(name.trim())?;
        state.providers.get(id).cloned()
    }

    pub async fn provider_by_id(&self, provider_id: Uuid) -> Option<Provider> {
        self.state.read().await.providers.get(&provider_id).cloned()
    }

    pub async fn add_window(
        &self,
        request: CreateWindowRequest,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        if request.start_time >= request.end_time {
            return Err(AvailabilityError::Validation(
                "start time must be before end time".to_string(),
            ));
        }
        if request.max_per_slot == 0 {
            return Err(AvailabilityError::Validation(
                "max appointments per slot must be positive".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        if !state.providers.contains_key(&request.provider_id) {
            return Err(AvailabilityError::ProviderNotFound);
        }

        let window = AvailabilityWindow {
            id: Uuid::new_v4(),
            provider_id: request.provider_id,
            day_of_week: request.day_of_week,
            start_time: request.start_time,
            end_time: request.end_time,
            max_per_slot: request.max_per_slot,
            is_available: true,
            created_at: Utc::now(),
        };
        state.window_order.push(window.id);
        state.windows.insert(window.id, window.clone());

        debug!(
            "Added window {} for provider {} on {} {}-{}",
            window.id, window.provider_id, window.day_of_week, window.start_time, window.end_time
        );
        Ok(window)
    }

    /// Idempotent: removing an absent window is not an error.
    pub async fn remove_window(&self, window_id: Uuid) {
        let mut state = self.state.write().await;
        if state.windows.remove(&window_id).is_none() {
            warn!("Remove requested for unknown window {}", window_id);
        }
        state.window_order.retain(|id| *id != window_id);
    }

    pub async fn set_window_available(
        &self,
        window_id: Uuid,
        is_available: bool,
    ) -> Result<AvailabilityWindow, AvailabilityError> {
        let mut state = self.state.write().await;
        let window = state
            .windows
            .get_mut(&window_id)
            .ok_or(AvailabilityError::WindowNotFound)?;
        window.is_available = is_available;
        Ok(window.clone())
    }

    /// All windows for a provider, ordered by day of week then start time.
    pub async fn list_windows(
        &self,
        provider_id: Uuid,
    ) -> Result<Vec<AvailabilityWindow>, AvailabilityError> {
        let state = self.state.read().await;
        if !state.providers.contains_key(&provider_id) {
            return Err(AvailabilityError::ProviderNotFound);
        }

        let mut windows: Vec<AvailabilityWindow> = state
            .windows
            .values()
            .filter(|window| window.provider_id == provider_id)
            .cloned()
            .collect();
        windows.sort_by_key(|window| (window.day_of_week, window.start_time));
        Ok(windows)
    }

    /// First available window, by creation order, containing the given time.
    ///
    /// `None` means the provider is not bookable at this time, which callers
    /// must treat as distinct from a full slot.
    pub async fn find_window(
        &self,
        provider_id: Uuid,
        day_of_week: DayOfWeek,
        time: NaiveTime,
    ) -> Option<AvailabilityWindow> {
        let state = self.state.read().await;
        state
            .window_order
            .iter()
            .filter_map(|id| state.windows.get(id))
            .find(|window| {
                window.provider_id == provider_id
                    && window.day_of_week == day_of_week
                    && window.is_available
                    && window.contains(time)
            })
            .cloned()
    }

    /// Windows for one weekday in creation order, used for slot enumeration.
    pub async fn windows_for_day(
        &self,
        provider_id: Uuid,
        day_of_week: DayOfWeek,
    ) -> Vec<AvailabilityWindow> {
        let state = self.state.read().await;
        state
            .window_order
            .iter()
            .filter_map(|id| state.windows.get(id))
            .filter(|window| {
                window.provider_id == provider_id
                    && window.day_of_week == day_of_week
                    && window.is_available
            })
            .cloned()
            .collect()
    }
}

impl Default for AvailabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
