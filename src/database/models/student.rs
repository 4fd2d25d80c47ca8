use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: i64,
    pub user_id: Option<i64>,
    pub course_id: i64,
    /// Current term, starting at 1. Never decreases.
    pub term: i32,
    pub paid: bool,
}
