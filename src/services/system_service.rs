use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::database::models::SystemState;
use crate::database::AcademicStore;
use crate::progression::{ProgressionError, ProgressionResult};
use crate::services::finish;
use crate::types::SystemMode;

/// Reads and switches the system-wide operational mode
#[derive(Clone)]
pub struct SystemService {
    store: Arc<dyn AcademicStore>,
}

impl SystemService {
    pub fn new(store: Arc<dyn AcademicStore>) -> Self {
        Self { store }
    }

    /// Current state. A missing row reads as ACTIVE at version 0.
    pub async fn state(&self) -> ProgressionResult<SystemState> {
        let mut uow = self.store.begin().await?;
        let result = uow.system_state().await.map_err(ProgressionError::from);
        let state = finish(uow, result).await?;
        Ok(state.unwrap_or_else(|| SystemState {
            id: SystemState::SINGLETON_ID,
            mode: SystemMode::Active,
            version: 0,
            updated_at: Utc::now(),
        }))
    }

    pub async fn set_maintenance(&self, maintenance: bool) -> ProgressionResult<SystemState> {
        let mode = if maintenance { SystemMode::Maintenance } else { SystemMode::Active };
        self.set_mode(mode).await
    }

    /// Compare-and-set against the version read in the same unit of work;
    /// a concurrent change surfaces as Conflict.
    pub async fn set_mode(&self, mode: SystemMode) -> ProgressionResult<SystemState> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let expected = uow.system_state().await?.map(|s| s.version).unwrap_or(0);
            uow.compare_and_set_system_mode(expected, mode, Utc::now())
                .await?
                .ok_or_else(|| ProgressionError::Conflict("System state changed concurrently".to_string()))
        }
        .await;
        let state = finish(uow, result).await?;
        info!(mode = ?state.mode, version = state.version, "System mode changed");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryState, MemoryStore};

    #[tokio::test]
    async fn maintenance_toggle_bumps_version() {
        let store = MemoryStore::new();
        let service = SystemService::new(Arc::new(store.clone()));

        let initial = service.state().await.unwrap();
        assert!(initial.is_active());

        let paused = service.set_maintenance(true).await.unwrap();
        assert_eq!(paused.mode, SystemMode::Maintenance);
        assert_eq!(paused.version, initial.version + 1);

        let resumed = service.set_maintenance(false).await.unwrap();
        assert!(resumed.is_active());
        assert_eq!(resumed.version, initial.version + 2);
    }

    #[tokio::test]
    async fn missing_row_reads_active_and_is_created_on_first_change() {
        let mut state = MemoryState::default();
        state.system_state = None;
        let store = MemoryStore::with_state(state);
        let service = SystemService::new(Arc::new(store.clone()));

        let current = service.state().await.unwrap();
        assert!(current.is_active());
        assert_eq!(current.version, 0);

        let paused = service.set_maintenance(true).await.unwrap();
        assert_eq!(paused.version, 1);
        assert_eq!(store.snapshot().await.system_state.unwrap().mode, SystemMode::Maintenance);
    }
}
