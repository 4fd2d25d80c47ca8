use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::SystemMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SystemState {
    pub id: i32,
    pub mode: SystemMode,
    /// Bumped on every change; writers compare-and-set against it.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl SystemState {
    pub const SINGLETON_ID: i32 = 1;

    pub fn is_active(&self) -> bool {
        self.mode == SystemMode::Active
    }
}
