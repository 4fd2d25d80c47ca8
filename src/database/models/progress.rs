use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::ProgressStatus;

/// Ledger entry for one (student, subject) pair. Exactly one exists per pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub student_id: i64,
    pub subject_id: i64,
    pub status: ProgressStatus,
    pub grade: Option<Decimal>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
    pub fn pending(student_id: i64, subject_id: i64) -> Self {
        Self {
            student_id,
            subject_id,
            status: ProgressStatus::Pending,
            grade: None,
            completed_at: None,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == ProgressStatus::Passed
    }
}
