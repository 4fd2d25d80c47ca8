/// Shared enums used across the store, the progression engine and the API

use serde::{Deserialize, Serialize};

/// Role carried in the JWT and checked by the route guards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Student => "STUDENT",
            Role::Teacher => "TEACHER",
        }
    }
}

/// Completion status of one subject for one student
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "progress_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    Pending,
    InProgress,
    Passed,
    Failed,
}

impl ProgressStatus {
    pub fn is_graded(&self) -> bool {
        matches!(self, ProgressStatus::Passed | ProgressStatus::Failed)
    }
}

/// Operational mode of the whole system (singleton row id = 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "system_mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemMode {
    Active,
    Maintenance,
}

/// Teaching days accepted in a group schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "weekday", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

/// Origin of a grade write, kept in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "grade_source", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GradeSource {
    Teacher,
    TermClose,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_use_screaming_case_on_the_wire() {
        assert_eq!(serde_json::to_value(ProgressStatus::InProgress).unwrap(), "IN_PROGRESS");
        assert_eq!(serde_json::to_value(SystemMode::Maintenance).unwrap(), "MAINTENANCE");
        assert_eq!(serde_json::from_str::<Role>("\"TEACHER\"").unwrap(), Role::Teacher);
    }

    #[test]
    fn only_passed_and_failed_count_as_graded() {
        assert!(ProgressStatus::Passed.is_graded());
        assert!(ProgressStatus::Failed.is_graded());
        assert!(!ProgressStatus::Pending.is_graded());
        assert!(!ProgressStatus::InProgress.is_graded());
    }
}
