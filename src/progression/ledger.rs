use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::ProgressionConfig;
use crate::database::models::ProgressRecord;
use crate::database::UnitOfWork;
use crate::progression::{ProgressionError, ProgressionResult};
use crate::types::ProgressStatus;

/// PASSED at or above the passing grade, FAILED below it
pub fn grade_status(grade: Decimal, rules: &ProgressionConfig) -> ProgressStatus {
    if grade >= rules.passing_grade {
        ProgressStatus::Passed
    } else {
        ProgressStatus::Failed
    }
}

/// Decimal places a stored grade keeps (`NUMERIC(4, 2)`)
pub const GRADE_SCALE: u32 = 2;

/// Grades must sit on the 0..=max scale and fit the stored precision, so the
/// status decided here is the status of the grade that gets persisted.
pub fn validate_grade(grade: Decimal, rules: &ProgressionConfig) -> ProgressionResult<()> {
    if grade < Decimal::ZERO || grade > rules.max_grade {
        return Err(ProgressionError::validation(
            "grade",
            format!("Grade must be between 0 and {}", rules.max_grade),
        ));
    }
    if grade.normalize().scale() > GRADE_SCALE {
        return Err(ProgressionError::validation(
            "grade",
            format!("Grade must have at most {} decimal places", GRADE_SCALE),
        ));
    }
    Ok(())
}

/// Upsert the ledger entry for (student, subject) from a final grade.
pub async fn record_grade(
    uow: &mut dyn UnitOfWork,
    rules: &ProgressionConfig,
    student_id: i64,
    subject_id: i64,
    grade: Decimal,
    at: DateTime<Utc>,
) -> ProgressionResult<ProgressRecord> {
    validate_grade(grade, rules)?;

    let record = ProgressRecord {
        student_id,
        subject_id,
        status: grade_status(grade, rules),
        grade: Some(grade),
        completed_at: Some(at),
    };
    let stored = uow.upsert_progress(record).await?;

    debug!(student_id, subject_id, %grade, status = ?stored.status, "Recorded grade");
    Ok(stored)
}

/// Create PENDING entries for every subject planned in (course, term).
/// Existing entries are left alone. Returns how many were created.
pub async fn initialize_term_records(
    uow: &mut dyn UnitOfWork,
    student_id: i64,
    course_id: i64,
    term: i32,
) -> ProgressionResult<usize> {
    let plan = uow.curriculum_for_term(course_id, term).await?;

    let mut created = 0;
    for entry in plan {
        if uow.insert_pending_progress(student_id, entry.subject_id).await? {
            created += 1;
        }
    }

    debug!(student_id, course_id, term, created, "Initialized term records");
    Ok(created)
}

/// Flag a subject as being taken. A PASSED entry stays PASSED.
pub async fn mark_in_progress(
    uow: &mut dyn UnitOfWork,
    student_id: i64,
    subject_id: i64,
) -> ProgressionResult<ProgressRecord> {
    let record = uow
        .set_progress_status_unless(student_id, subject_id, ProgressStatus::InProgress, &[ProgressStatus::Passed])
        .await?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{AcademicStore, MemoryState, MemoryStore};
    use crate::testing::grade;

    #[test]
    fn passing_threshold_is_inclusive() {
        let rules = ProgressionConfig::default();
        assert_eq!(grade_status(grade("6"), &rules), ProgressStatus::Passed);
        assert_eq!(grade_status(grade("5.99"), &rules), ProgressStatus::Failed);
        assert_eq!(grade_status(grade("10"), &rules), ProgressStatus::Passed);
        assert_eq!(grade_status(grade("0"), &rules), ProgressStatus::Failed);
    }

    #[test]
    fn rejects_grades_outside_scale() {
        let rules = ProgressionConfig::default();
        assert!(validate_grade(grade("-0.5"), &rules).is_err());
        assert!(validate_grade(grade("10.01"), &rules).is_err());
        assert!(validate_grade(grade("0"), &rules).is_ok());
        assert!(validate_grade(grade("10"), &rules).is_ok());
    }

    #[test]
    fn rejects_grades_finer_than_stored_precision() {
        let rules = ProgressionConfig::default();
        // 5.995 would be stored as 6.00 while being classified FAILED
        let err = validate_grade(grade("5.995"), &rules).unwrap_err();
        assert!(matches!(err, ProgressionError::Validation { field: Some(ref f), .. } if f == "grade"));
        assert!(validate_grade(grade("5.99"), &rules).is_ok());
        assert!(validate_grade(grade("6.500"), &rules).is_ok());
    }

    #[tokio::test]
    async fn record_grade_rejects_excess_precision_without_writing() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let subject = state.add_subject("Algebra", 8);
        let student = state.add_student(course, 1);
        let store = MemoryStore::with_state(state);
        let rules = ProgressionConfig::default();

        let mut uow = store.begin().await.unwrap();
        let err = record_grade(uow.as_mut(), &rules, student, subject, grade("5.995"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressionError::Validation { .. }));
        assert!(uow.find_progress(student, subject).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn record_grade_upserts_single_entry() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let subject = state.add_subject("Algebra", 8);
        let student = state.add_student(course, 1);
        let store = MemoryStore::with_state(state);
        let rules = ProgressionConfig::default();

        let mut uow = store.begin().await.unwrap();
        let first = record_grade(uow.as_mut(), &rules, student, subject, grade("4"), Utc::now()).await.unwrap();
        assert_eq!(first.status, ProgressStatus::Failed);
        let second = record_grade(uow.as_mut(), &rules, student, subject, grade("8.5"), Utc::now()).await.unwrap();
        assert_eq!(second.status, ProgressStatus::Passed);
        uow.commit().await.unwrap();

        let snapshot = store.snapshot().await;
        let entries: Vec<_> = snapshot.progress.values().filter(|r| r.student_id == student).collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].grade, Some(grade("8.5")));
        assert!(entries[0].completed_at.is_some());
    }

    #[tokio::test]
    async fn record_grade_rejects_out_of_range_without_writing() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let subject = state.add_subject("Algebra", 8);
        let student = state.add_student(course, 1);
        let store = MemoryStore::with_state(state);
        let rules = ProgressionConfig::default();

        let mut uow = store.begin().await.unwrap();
        let err = record_grade(uow.as_mut(), &rules, student, subject, grade("11"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressionError::Validation { .. }));
        assert!(uow.find_progress(student, subject).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn initialize_term_records_keeps_existing_entries() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        let physics = state.add_subject("Physics", 6);
        state.add_curriculum_entry(course, algebra, 2);
        state.add_curriculum_entry(course, physics, 2);
        let student = state.add_student(course, 2);
        state.set_progress(student, algebra, ProgressStatus::Passed, Some(grade("9")));
        let store = MemoryStore::with_state(state);

        let mut uow = store.begin().await.unwrap();
        assert_eq!(initialize_term_records(uow.as_mut(), student, course, 2).await.unwrap(), 1);
        assert_eq!(initialize_term_records(uow.as_mut(), student, course, 2).await.unwrap(), 0);

        let algebra_record = uow.find_progress(student, algebra).await.unwrap().unwrap();
        let physics_record = uow.find_progress(student, physics).await.unwrap().unwrap();
        assert_eq!(algebra_record.status, ProgressStatus::Passed);
        assert_eq!(physics_record.status, ProgressStatus::Pending);
    }

    #[tokio::test]
    async fn mark_in_progress_never_downgrades_passed() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        let physics = state.add_subject("Physics", 6);
        let student = state.add_student(course, 1);
        state.set_progress(student, algebra, ProgressStatus::Passed, Some(grade("7")));
        let store = MemoryStore::with_state(state);

        let mut uow = store.begin().await.unwrap();
        let kept = mark_in_progress(uow.as_mut(), student, algebra).await.unwrap();
        let started = mark_in_progress(uow.as_mut(), student, physics).await.unwrap();
        assert_eq!(kept.status, ProgressStatus::Passed);
        assert_eq!(started.status, ProgressStatus::InProgress);
    }
}
