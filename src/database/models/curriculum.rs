use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Places a subject in a given term of a course. Unique on (course_id, subject_id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumEntry {
    pub id: i64,
    pub course_id: i64,
    pub subject_id: i64,
    pub term: i32,
}
