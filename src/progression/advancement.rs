use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ProgressionConfig;
use crate::database::UnitOfWork;
use crate::progression::ledger::initialize_term_records;
use crate::progression::{ProgressionError, ProgressionResult};

/// Result of evaluating one student for promotion to the next term
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AdvancementOutcome {
    /// Moved from `from` to `to`; `initialized` PENDING records were created
    Advanced { from: i32, to: i32, initialized: usize },
    /// Some required subject of the current term is not PASSED yet
    Incomplete { term: i32, matched: usize, required: usize },
    /// The current term has nothing planned
    NoRequirements { term: i32 },
    /// Already at the last term of the course
    ProgramComplete { term: i32 },
    /// Another writer moved the student first
    Contended { term: i32 },
}

impl AdvancementOutcome {
    pub fn is_advanced(&self) -> bool {
        matches!(self, AdvancementOutcome::Advanced { .. })
    }
}

/// Promote the student one term when every subject planned for the current
/// term of `course_id` is PASSED, then seed the next term's ledger entries.
pub async fn evaluate_and_advance(
    uow: &mut dyn UnitOfWork,
    rules: &ProgressionConfig,
    student_id: i64,
    course_id: i64,
) -> ProgressionResult<AdvancementOutcome> {
    let student = uow
        .lock_student(student_id)
        .await?
        .ok_or_else(|| ProgressionError::not_found("Student", student_id))?;
    let term = student.term;

    let required: HashSet<i64> = uow
        .curriculum_for_term(course_id, term)
        .await?
        .into_iter()
        .map(|entry| entry.subject_id)
        .collect();

    if required.is_empty() && !rules.advance_on_empty_plan {
        debug!(student_id, term, "No subjects planned for term");
        return Ok(AdvancementOutcome::NoRequirements { term });
    }

    let matched = uow
        .progress_for_student(student_id)
        .await?
        .iter()
        .filter(|record| record.is_passed() && required.contains(&record.subject_id))
        .count();

    if matched < required.len() {
        debug!(student_id, term, matched, required = required.len(), "Term not complete");
        return Ok(AdvancementOutcome::Incomplete {
            term,
            matched,
            required: required.len(),
        });
    }

    if rules.cap_at_course_duration {
        let course = uow
            .find_course(course_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Course", course_id))?;
        if term >= course.duration_terms {
            debug!(student_id, term, "Student already in final term");
            return Ok(AdvancementOutcome::ProgramComplete { term });
        }
    }

    let next = term
        .checked_add(1)
        .ok_or_else(|| ProgressionError::validation("term", format!("Term {} cannot be incremented", term)))?;

    if !uow.advance_student_term(student_id, term).await? {
        warn!(student_id, term, "Term changed concurrently, skipping advancement");
        return Ok(AdvancementOutcome::Contended { term });
    }

    let initialized = initialize_term_records(uow, student_id, course_id, next).await?;

    info!(student_id, from = term, to = next, initialized, "Advanced student");
    Ok(AdvancementOutcome::Advanced {
        from: term,
        to: next,
        initialized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{AcademicStore, MemoryState, MemoryStore};
    use crate::testing::grade;
    use crate::types::ProgressStatus;

    struct Setup {
        store: MemoryStore,
        course: i64,
        student: i64,
        next_subject: i64,
    }

    /// Course of `duration` terms with two subjects planned for term 1 and one for term 2
    fn setup(duration: i32, passed_both: bool) -> Setup {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", duration);
        let algebra = state.add_subject("Algebra", 8);
        let physics = state.add_subject("Physics", 6);
        let next_subject = state.add_subject("Calculus", 8);
        state.add_curriculum_entry(course, algebra, 1);
        state.add_curriculum_entry(course, physics, 1);
        state.add_curriculum_entry(course, next_subject, 2);
        let student = state.add_student(course, 1);
        state.set_progress(student, algebra, ProgressStatus::Passed, Some(grade("8")));
        let physics_status = if passed_both { ProgressStatus::Passed } else { ProgressStatus::Failed };
        state.set_progress(student, physics, physics_status, Some(grade(if passed_both { "6" } else { "5" })));
        Setup {
            store: MemoryStore::with_state(state),
            course,
            student,
            next_subject,
        }
    }

    #[tokio::test]
    async fn advances_when_every_planned_subject_passed() {
        let s = setup(4, true);
        let rules = ProgressionConfig::default();

        let mut uow = s.store.begin().await.unwrap();
        let outcome = evaluate_and_advance(uow.as_mut(), &rules, s.student, s.course).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(outcome, AdvancementOutcome::Advanced { from: 1, to: 2, initialized: 1 });
        let state = s.store.snapshot().await;
        assert_eq!(state.students[&s.student].term, 2);
        assert_eq!(state.progress[&(s.student, s.next_subject)].status, ProgressStatus::Pending);
    }

    #[tokio::test]
    async fn stays_when_a_planned_subject_is_missing() {
        let s = setup(4, false);
        let rules = ProgressionConfig::default();

        let mut uow = s.store.begin().await.unwrap();
        let outcome = evaluate_and_advance(uow.as_mut(), &rules, s.student, s.course).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(outcome, AdvancementOutcome::Incomplete { term: 1, matched: 1, required: 2 });
        assert_eq!(s.store.snapshot().await.students[&s.student].term, 1);
    }

    #[tokio::test]
    async fn second_evaluation_does_not_double_advance() {
        let s = setup(4, true);
        let rules = ProgressionConfig::default();

        let mut uow = s.store.begin().await.unwrap();
        let first = evaluate_and_advance(uow.as_mut(), &rules, s.student, s.course).await.unwrap();
        let second = evaluate_and_advance(uow.as_mut(), &rules, s.student, s.course).await.unwrap();
        uow.commit().await.unwrap();

        assert!(first.is_advanced());
        assert_eq!(second, AdvancementOutcome::Incomplete { term: 2, matched: 0, required: 1 });
        assert_eq!(s.store.snapshot().await.students[&s.student].term, 2);
    }

    #[tokio::test]
    async fn empty_plan_holds_by_default_and_advances_when_enabled() {
        let mut state = MemoryState::default();
        let course = state.add_course("Open studies", 3);
        let student = state.add_student(course, 1);
        let store = MemoryStore::with_state(state);

        let mut uow = store.begin().await.unwrap();
        let held = evaluate_and_advance(uow.as_mut(), &ProgressionConfig::default(), student, course)
            .await
            .unwrap();
        assert_eq!(held, AdvancementOutcome::NoRequirements { term: 1 });

        let permissive = ProgressionConfig {
            advance_on_empty_plan: true,
            ..ProgressionConfig::default()
        };
        let advanced = evaluate_and_advance(uow.as_mut(), &permissive, student, course).await.unwrap();
        assert_eq!(advanced, AdvancementOutcome::Advanced { from: 1, to: 2, initialized: 0 });
    }

    #[tokio::test]
    async fn final_term_is_capped_unless_disabled() {
        let s = setup(1, true);

        let mut uow = s.store.begin().await.unwrap();
        let capped = evaluate_and_advance(uow.as_mut(), &ProgressionConfig::default(), s.student, s.course)
            .await
            .unwrap();
        assert_eq!(capped, AdvancementOutcome::ProgramComplete { term: 1 });

        let uncapped = ProgressionConfig {
            cap_at_course_duration: false,
            ..ProgressionConfig::default()
        };
        let outcome = evaluate_and_advance(uow.as_mut(), &uncapped, s.student, s.course).await.unwrap();
        assert!(outcome.is_advanced());
    }

    #[tokio::test]
    async fn term_overflow_is_rejected_without_writing() {
        let mut state = MemoryState::default();
        let course = state.add_course("Open studies", 3);
        let student = state.add_student(course, i32::MAX);
        let store = MemoryStore::with_state(state);
        let rules = ProgressionConfig {
            advance_on_empty_plan: true,
            cap_at_course_duration: false,
            ..ProgressionConfig::default()
        };

        let mut uow = store.begin().await.unwrap();
        let err = evaluate_and_advance(uow.as_mut(), &rules, student, course).await.unwrap_err();
        assert!(matches!(err, ProgressionError::Validation { .. }));
        assert_eq!(uow.find_student(student).await.unwrap().unwrap().term, i32::MAX);
    }

    #[tokio::test]
    async fn unknown_student_is_not_found() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let err = evaluate_and_advance(uow.as_mut(), &ProgressionConfig::default(), 42, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressionError::NotFound(_)));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(AdvancementOutcome::Advanced { from: 1, to: 2, initialized: 3 }).unwrap();
        assert_eq!(json["outcome"], "advanced");
        assert_eq!(json["from"], 1);
    }
}
