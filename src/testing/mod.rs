//! Test utilities: an in-memory school wired into the real router.

use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use rust_decimal::Decimal;

use crate::app::{app, AppState};
use crate::auth::{generate_jwt, Claims};
use crate::config::{self, AppConfig};
use crate::database::{MemoryState, MemoryStore};

/// Parse a decimal literal such as `"7.5"`. Panics on malformed input.
pub fn grade(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|e| panic!("invalid decimal literal '{}': {}", value, e))
}

/// A memory-backed app plus a handle on its store for assertions
pub struct TestContext {
    pub store: MemoryStore,
    pub config: AppConfig,
}

impl TestContext {
    /// Build a context over `state` with the process configuration
    pub fn new(state: MemoryState) -> Self {
        Self::with_config(state, config::config().clone())
    }

    pub fn with_config(state: MemoryState, config: AppConfig) -> Self {
        Self {
            store: MemoryStore::with_state(state),
            config,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(Arc::new(self.store.clone()), &self.config)
    }

    /// Fresh router sharing this context's store
    pub fn router(&self) -> Router {
        app(self.state(), &self.config)
    }

    /// Copy of the committed store state
    pub async fn snapshot(&self) -> MemoryState {
        self.store.snapshot().await
    }

    pub fn admin_token(&self) -> anyhow::Result<String> {
        Ok(generate_jwt(&Claims::admin("admin"))?)
    }

    pub fn student_token(&self, student_id: i64) -> anyhow::Result<String> {
        Ok(generate_jwt(&Claims::student(format!("student-{}", student_id), student_id))?)
    }

    pub fn teacher_token(&self, teacher_id: i64) -> anyhow::Result<String> {
        Ok(generate_jwt(&Claims::teacher(format!("teacher-{}", teacher_id), teacher_id))?)
    }
}
