use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::GradeSource;

/// A student's seat in a group. Unique on (group_id, student_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub group_id: i64,
    pub student_id: i64,
    pub grade: Option<Decimal>,
    pub active: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn new(group_id: i64, student_id: i64) -> Self {
        Self {
            group_id,
            student_id,
            grade: None,
            active: true,
            completed_at: None,
        }
    }
}

/// Append-only record of every grade written to an enrollment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GradeAudit {
    pub group_id: i64,
    pub student_id: i64,
    pub previous_grade: Option<Decimal>,
    pub new_grade: Decimal,
    pub source: GradeSource,
    pub recorded_at: DateTime<Utc>,
}
