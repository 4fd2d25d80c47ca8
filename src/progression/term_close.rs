use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::config::ProgressionConfig;
use crate::database::models::GradeAudit;
use crate::database::UnitOfWork;
use crate::progression::advancement::evaluate_and_advance;
use crate::progression::ledger::record_grade;
use crate::progression::ProgressionResult;
use crate::types::GradeSource;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermCloseSummary {
    pub message: String,
    pub students_advanced: usize,
    pub quarter_closed: bool,
    pub stragglers_finalized: usize,
    pub records_synced: usize,
    pub run_id: Uuid,
}

/// Close the running term for the whole school:
///
/// 1. every active enrollment without a grade is finalized with grade 0
/// 2. the progress ledger is synced from those enrollments and from every
///    still-active graded one
/// 3. every student is evaluated for advancement, in ascending id order
///
/// Nothing is committed here; the caller commits the unit of work once this
/// returns `Ok`, so a failure in any step leaves no trace.
pub async fn close_term(
    uow: &mut dyn UnitOfWork,
    rules: &ProgressionConfig,
    at: DateTime<Utc>,
) -> ProgressionResult<TermCloseSummary> {
    let run_id = Uuid::new_v4();
    let span = info_span!("close_term", %run_id);

    async move {
        let stragglers = uow.finalize_ungraded_enrollments(Decimal::ZERO, at).await?;
        for (enrollment, _) in &stragglers {
            uow.append_grade_audit(GradeAudit {
                group_id: enrollment.group_id,
                student_id: enrollment.student_id,
                previous_grade: None,
                new_grade: Decimal::ZERO,
                source: GradeSource::TermClose,
                recorded_at: at,
            })
            .await?;
        }
        info!(count = stragglers.len(), "Finalized ungraded enrollments");

        let still_active = uow.active_graded_enrollments().await?;
        let stragglers_finalized = stragglers.len();

        let mut records_synced = 0;
        for (enrollment, subject_id) in stragglers.into_iter().chain(still_active) {
            let Some(grade) = enrollment.grade else {
                continue;
            };
            record_grade(uow, rules, enrollment.student_id, subject_id, grade, at).await?;
            records_synced += 1;
        }
        info!(records_synced, "Synced progress ledger");

        let mut students = uow.list_students().await?;
        students.sort_by_key(|student| student.id);

        let mut students_advanced = 0;
        for student in &students {
            let outcome = evaluate_and_advance(uow, rules, student.id, student.course_id).await?;
            if outcome.is_advanced() {
                students_advanced += 1;
            }
        }
        info!(students = students.len(), students_advanced, "Evaluated cohort");

        Ok(TermCloseSummary {
            message: "Quarter closed successfully".to_string(),
            students_advanced,
            quarter_closed: true,
            stragglers_finalized,
            records_synced,
            run_id,
        })
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{AcademicStore, FailPoint, MemoryState, MemoryStore};
    use crate::testing::grade;
    use crate::types::ProgressStatus;

    #[tokio::test]
    async fn straggler_is_failed_and_blocks_advancement() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        state.add_curriculum_entry(course, algebra, 1);
        let student = state.add_student(course, 1);
        let group = state.add_group(course, algebra, 70, 1);
        state.enroll(group, student, None);
        let store = MemoryStore::with_state(state);
        let rules = ProgressionConfig::default();

        let mut uow = store.begin().await.unwrap();
        let summary = close_term(uow.as_mut(), &rules, Utc::now()).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(summary.students_advanced, 0);
        assert_eq!(summary.stragglers_finalized, 1);
        assert!(summary.quarter_closed);

        let state = store.snapshot().await;
        let enrollment = &state.enrollments[&(group, student)];
        assert_eq!(enrollment.grade, Some(Decimal::ZERO));
        assert!(!enrollment.active);
        assert!(enrollment.completed_at.is_some());
        assert_eq!(state.progress[&(student, algebra)].status, ProgressStatus::Failed);
        assert_eq!(state.students[&student].term, 1);
        assert_eq!(state.grade_audit.len(), 1);
        assert_eq!(state.grade_audit[0].source, GradeSource::TermClose);
    }

    #[tokio::test]
    async fn active_graded_enrollment_is_synced_and_advances() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        let calculus = state.add_subject("Calculus", 8);
        state.add_curriculum_entry(course, algebra, 1);
        state.add_curriculum_entry(course, calculus, 2);
        let student = state.add_student(course, 1);
        let group = state.add_group(course, algebra, 70, 1);
        state.enroll(group, student, Some(grade("7")));
        let store = MemoryStore::with_state(state);
        let rules = ProgressionConfig::default();

        let mut uow = store.begin().await.unwrap();
        let summary = close_term(uow.as_mut(), &rules, Utc::now()).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(summary.students_advanced, 1);
        assert_eq!(summary.records_synced, 1);
        assert_eq!(summary.stragglers_finalized, 0);

        let state = store.snapshot().await;
        assert_eq!(state.students[&student].term, 2);
        assert_eq!(state.progress[&(student, algebra)].status, ProgressStatus::Passed);
        assert_eq!(state.progress[&(student, calculus)].status, ProgressStatus::Pending);
    }

    #[tokio::test]
    async fn failure_in_cohort_loop_leaves_nothing_behind() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        state.add_curriculum_entry(course, algebra, 1);
        let student = state.add_student(course, 1);
        let group = state.add_group(course, algebra, 70, 1);
        state.enroll(group, student, None);
        let store = MemoryStore::with_state(state);
        store.inject_failure(FailPoint::ListStudents);
        let before = store.snapshot().await;

        {
            let mut uow = store.begin().await.unwrap();
            let result = close_term(uow.as_mut(), &ProgressionConfig::default(), Utc::now()).await;
            assert!(result.is_err());
        }

        let after = store.snapshot().await;
        assert_eq!(after.enrollments, before.enrollments);
        assert_eq!(after.progress, before.progress);
        assert!(after.grade_audit.is_empty());
    }

    #[tokio::test]
    async fn empty_school_closes_cleanly() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let summary = close_term(uow.as_mut(), &ProgressionConfig::default(), Utc::now()).await.unwrap();
        assert_eq!(summary.students_advanced, 0);
        assert_eq!(summary.records_synced, 0);
        assert_eq!(summary.message, "Quarter closed successfully");
    }
}
