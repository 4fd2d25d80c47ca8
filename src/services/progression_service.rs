use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info};

use crate::config::ProgressionConfig;
use crate::database::models::{Enrollment, GradeAudit, ProgressRecord, Subject};
use crate::database::{AcademicStore, UnitOfWork};
use crate::progression::{
    self, AdvancementOutcome, EligibilityReport, ProgressionError, ProgressionResult, TermCloseSummary,
};
use crate::services::{finish, owned_group};
use crate::types::{GradeSource, ProgressStatus};

/// Outcome of a teacher grade submission
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeSubmission {
    pub enrollment: Enrollment,
    pub progress: ProgressRecord,
    pub advancement: AdvancementOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProgress {
    pub subject_id: i64,
    pub name: String,
    pub credits: i32,
    pub status: ProgressStatus,
    pub grade: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermProgress {
    pub term: i32,
    pub subjects: Vec<SubjectProgress>,
}

/// Curriculum of the student's course with the ledger status of each subject
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub student_id: i64,
    pub course_id: i64,
    pub current_term: i32,
    pub total_credits: i32,
    pub completed_credits: i32,
    pub completion_percentage: Decimal,
    pub terms: Vec<TermProgress>,
}

/// Entry point of the progression engine for the API and the CLI. Each call
/// runs in its own unit of work.
#[derive(Clone)]
pub struct ProgressionService {
    store: Arc<dyn AcademicStore>,
    rules: ProgressionConfig,
}

impl ProgressionService {
    pub fn new(store: Arc<dyn AcademicStore>, rules: ProgressionConfig) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &ProgressionConfig {
        &self.rules
    }

    /// Current enrollment row of a student in one of the teacher's groups
    pub async fn grade_for(&self, teacher_id: i64, group_id: i64, student_id: i64) -> ProgressionResult<Enrollment> {
        let mut uow = self.store.begin().await?;
        let result = async {
            owned_group(uow.as_mut(), teacher_id, group_id).await?;
            uow.find_enrollment(group_id, student_id)
                .await?
                .ok_or_else(|| ProgressionError::NotFound(format!("Enrollment of student {} in group {}", student_id, group_id)))
        }
        .await;
        finish(uow, result).await
    }

    /// Finalize a student's grade in a group, update the ledger and try to
    /// advance the student, all in one unit of work.
    pub async fn submit_grade(
        &self,
        teacher_id: i64,
        group_id: i64,
        student_id: i64,
        grade: Decimal,
    ) -> ProgressionResult<GradeSubmission> {
        progression::validate_grade(grade, &self.rules)?;

        let mut uow = self.store.begin().await?;
        let result = Self::submit_grade_in(uow.as_mut(), &self.rules, teacher_id, group_id, student_id, grade).await;
        let submission = finish(uow, result).await?;

        info!(
            teacher_id,
            group_id,
            student_id,
            %grade,
            advanced = submission.advancement.is_advanced(),
            "Grade submitted"
        );
        Ok(submission)
    }

    async fn submit_grade_in(
        uow: &mut dyn UnitOfWork,
        rules: &ProgressionConfig,
        teacher_id: i64,
        group_id: i64,
        student_id: i64,
        grade: Decimal,
    ) -> ProgressionResult<GradeSubmission> {
        let group = owned_group(uow, teacher_id, group_id).await?;

        if let Some(state) = uow.system_state().await? {
            if !state.is_active() {
                return Err(ProgressionError::SystemNotActive);
            }
        }

        let not_found = || ProgressionError::NotFound(format!("Enrollment of student {} in group {}", student_id, group_id));
        let previous = uow.find_enrollment(group_id, student_id).await?.ok_or_else(not_found)?;

        let now = Utc::now();
        let enrollment = uow
            .finalize_enrollment(group_id, student_id, grade, now)
            .await?
            .ok_or_else(not_found)?;
        uow.append_grade_audit(GradeAudit {
            group_id,
            student_id,
            previous_grade: previous.grade,
            new_grade: grade,
            source: GradeSource::Teacher,
            recorded_at: now,
        })
        .await?;

        let student = uow
            .find_student(student_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Student", student_id))?;

        let progress = progression::record_grade(uow, rules, student_id, group.subject_id, grade, now).await?;
        let advancement = progression::evaluate_and_advance(uow, rules, student_id, student.course_id).await?;

        Ok(GradeSubmission {
            enrollment,
            progress,
            advancement,
        })
    }

    /// Administrative end of quarter. All or nothing.
    pub async fn close_term(&self) -> ProgressionResult<TermCloseSummary> {
        let mut uow = self.store.begin().await?;
        let result = progression::close_term(uow.as_mut(), &self.rules, Utc::now()).await;
        match finish(uow, result).await {
            Ok(summary) => {
                info!(
                    run_id = %summary.run_id,
                    students_advanced = summary.students_advanced,
                    "Term closed"
                );
                Ok(summary)
            }
            Err(err) => {
                error!("Term close failed and was rolled back: {}", err);
                Err(err)
            }
        }
    }

    /// Re-evaluate one student outside of a term close
    pub async fn advance_student(&self, student_id: i64) -> ProgressionResult<AdvancementOutcome> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let student = uow
                .find_student(student_id)
                .await?
                .ok_or_else(|| ProgressionError::not_found("Student", student_id))?;
            progression::evaluate_and_advance(uow.as_mut(), &self.rules, student_id, student.course_id).await
        }
        .await;
        finish(uow, result).await
    }

    pub async fn eligibility(&self, student_id: i64, subject_id: i64) -> ProgressionResult<EligibilityReport> {
        let mut uow = self.store.begin().await?;
        let result = progression::check_eligibility(uow.as_mut(), student_id, subject_id).await;
        finish(uow, result).await
    }

    pub async fn available_subjects(&self, student_id: i64) -> ProgressionResult<Vec<Subject>> {
        let mut uow = self.store.begin().await?;
        let result = progression::available_subjects_for_next_term(uow.as_mut(), student_id).await;
        finish(uow, result).await
    }

    pub async fn progress_summary(&self, student_id: i64) -> ProgressionResult<ProgressSummary> {
        let mut uow = self.store.begin().await?;
        let result = Self::progress_summary_in(uow.as_mut(), student_id).await;
        finish(uow, result).await
    }

    async fn progress_summary_in(uow: &mut dyn UnitOfWork, student_id: i64) -> ProgressionResult<ProgressSummary> {
        let student = uow
            .find_student(student_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Student", student_id))?;

        let plan = uow.curriculum_for_course(student.course_id).await?;
        let subject_ids: Vec<i64> = plan.iter().map(|entry| entry.subject_id).collect();
        let subjects: HashMap<i64, Subject> = uow
            .subjects_by_ids(&subject_ids)
            .await?
            .into_iter()
            .map(|subject| (subject.id, subject))
            .collect();
        let ledger: HashMap<i64, ProgressRecord> = uow
            .progress_for_student(student_id)
            .await?
            .into_iter()
            .map(|record| (record.subject_id, record))
            .collect();

        let mut terms: BTreeMap<i32, Vec<SubjectProgress>> = BTreeMap::new();
        let mut total_credits = 0;
        let mut completed_credits = 0;

        for entry in &plan {
            let Some(subject) = subjects.get(&entry.subject_id) else {
                continue;
            };
            let record = ledger.get(&entry.subject_id);
            let status = record.map(|r| r.status).unwrap_or(ProgressStatus::Pending);

            total_credits += subject.credits;
            if status == ProgressStatus::Passed {
                completed_credits += subject.credits;
            }

            terms.entry(entry.term).or_default().push(SubjectProgress {
                subject_id: subject.id,
                name: subject.name.clone(),
                credits: subject.credits,
                status,
                grade: record.and_then(|r| r.grade),
            });
        }

        let completion_percentage = if total_credits > 0 {
            (Decimal::from(completed_credits) * Decimal::ONE_HUNDRED / Decimal::from(total_credits)).round_dp(2)
        } else {
            Decimal::ZERO
        };

        Ok(ProgressSummary {
            student_id,
            course_id: student.course_id,
            current_term: student.term,
            total_credits,
            completed_credits,
            completion_percentage,
            terms: terms
                .into_iter()
                .map(|(term, subjects)| TermProgress { term, subjects })
                .collect(),
        })
    }
}
