use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::Weekday;

/// An offering of a subject, for one course and term, taught by one teacher
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub course_id: i64,
    pub subject_id: i64,
    pub teacher_id: i64,
    pub term: i32,
    #[sqlx(skip)]
    #[serde(default)]
    pub schedule: Vec<ScheduleSlot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlot {
    pub day: Weekday,
    pub starts_at: NaiveTime,
    pub ends_at: NaiveTime,
}

impl ScheduleSlot {
    pub fn overlaps(&self, other: &ScheduleSlot) -> bool {
        self.day == other.day && self.starts_at < other.ends_at && other.starts_at < self.ends_at
    }
}

/// Validated input for creating a group
#[derive(Debug, Clone)]
pub struct NewGroup {
    pub name: String,
    pub code: String,
    pub course_id: i64,
    pub subject_id: i64,
    pub teacher_id: i64,
    pub term: i32,
    pub schedule: Vec<ScheduleSlot>,
}
