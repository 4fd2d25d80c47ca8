//! Academic progression engine: the progress ledger, prerequisite eligibility,
//! term advancement and the batch term close.
//!
//! Every function here works inside a caller-supplied [`UnitOfWork`]; the
//! caller decides when to commit.
//!
//! [`UnitOfWork`]: crate::database::UnitOfWork

pub mod advancement;
pub mod eligibility;
pub mod ledger;
pub mod term_close;

use thiserror::Error;

use crate::database::DatabaseError;

pub use advancement::{evaluate_and_advance, AdvancementOutcome};
pub use eligibility::{available_subjects_for_next_term, check_eligibility, is_eligible, EligibilityReport};
pub use ledger::{grade_status, initialize_term_records, mark_in_progress, record_grade, validate_grade};
pub use term_close::{close_term, TermCloseSummary};

#[derive(Debug, Error)]
pub enum ProgressionError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("System is not active")]
    SystemNotActive,

    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl ProgressionError {
    pub fn not_found(entity: &str, id: i64) -> Self {
        Self::NotFound(format!("{} {}", entity, id))
    }

    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }
}

pub type ProgressionResult<T> = Result<T, ProgressionError>;
