pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

use std::sync::Arc;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::{FailPoint, MemoryState, MemoryStore};
pub use postgres::PgStore;
pub use store::{AcademicStore, UnitOfWork};

use crate::config::{AppConfig, StorageBackend};

/// Build the store selected by configuration
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn AcademicStore>, DatabaseError> {
    match config.database.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let pool = DatabaseManager::main_pool().await?;
            if config.database.run_migrations {
                DatabaseManager::run_migrations(&pool).await?;
            }
            Ok(Arc::new(PgStore::new(pool)))
        }
    }
}
