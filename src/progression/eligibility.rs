use std::collections::HashSet;

use serde::Serialize;

use crate::database::models::{Student, Subject};
use crate::database::UnitOfWork;
use crate::progression::{ProgressionError, ProgressionResult};

/// Eligibility of one student for one subject, with the prerequisites still missing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityReport {
    pub student_id: i64,
    pub subject_id: i64,
    pub eligible: bool,
    pub missing_prerequisites: Vec<i64>,
}

async fn load_student(uow: &mut dyn UnitOfWork, student_id: i64) -> ProgressionResult<Student> {
    uow.find_student(student_id)
        .await?
        .ok_or_else(|| ProgressionError::not_found("Student", student_id))
}

async fn passed_subjects(uow: &mut dyn UnitOfWork, student_id: i64) -> ProgressionResult<HashSet<i64>> {
    Ok(uow
        .progress_for_student(student_id)
        .await?
        .into_iter()
        .filter(|record| record.is_passed())
        .map(|record| record.subject_id)
        .collect())
}

async fn missing_prerequisites(
    uow: &mut dyn UnitOfWork,
    passed: &HashSet<i64>,
    subject_id: i64,
) -> ProgressionResult<Vec<i64>> {
    let mut missing: Vec<i64> = uow
        .prerequisites_of(subject_id)
        .await?
        .into_iter()
        .filter(|required| !passed.contains(required))
        .collect();
    missing.sort_unstable();
    Ok(missing)
}

pub async fn check_eligibility(
    uow: &mut dyn UnitOfWork,
    student_id: i64,
    subject_id: i64,
) -> ProgressionResult<EligibilityReport> {
    load_student(uow, student_id).await?;
    uow.find_subject(subject_id)
        .await?
        .ok_or_else(|| ProgressionError::not_found("Subject", subject_id))?;

    let passed = passed_subjects(uow, student_id).await?;
    let missing = missing_prerequisites(uow, &passed, subject_id).await?;

    Ok(EligibilityReport {
        student_id,
        subject_id,
        eligible: missing.is_empty(),
        missing_prerequisites: missing,
    })
}

/// True when every prerequisite of the subject is PASSED for the student.
/// A subject without prerequisites is always eligible.
pub async fn is_eligible(uow: &mut dyn UnitOfWork, student_id: i64, subject_id: i64) -> ProgressionResult<bool> {
    Ok(check_eligibility(uow, student_id, subject_id).await?.eligible)
}

/// Subjects offered in the student's next term whose prerequisites are all
/// met, ascending by id.
pub async fn available_subjects_for_next_term(
    uow: &mut dyn UnitOfWork,
    student_id: i64,
) -> ProgressionResult<Vec<Subject>> {
    let student = load_student(uow, student_id).await?;
    let target_term = student.term + 1;

    let candidates = uow.subjects_offered(student.course_id, target_term).await?;
    let passed = passed_subjects(uow, student_id).await?;

    let mut available = Vec::with_capacity(candidates.len());
    for subject in candidates {
        if missing_prerequisites(uow, &passed, subject.id).await?.is_empty() {
            available.push(subject);
        }
    }
    available.sort_by_key(|subject| subject.id);

    tracing::debug!(student_id, target_term, count = available.len(), "Resolved available subjects");
    Ok(available)
}
