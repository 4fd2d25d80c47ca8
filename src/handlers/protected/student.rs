// handlers/protected/student.rs - /api/students/* handlers

use axum::extract::{Path, State};
use axum::Extension;

use crate::app::AppState;
use crate::database::models::Subject;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::progression::EligibilityReport;
use crate::services::{CurrentEnrollment, GradeEntry, ProgressSummary};

/// GET /api/students/available-subjects - next-term subjects whose prerequisites are met
pub async fn available_subjects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<Subject>> {
    let student_id = auth.student_id()?;
    let subjects = state.progression.available_subjects(student_id).await?;
    Ok(ApiResponse::success(subjects))
}

/// GET /api/students/eligibility/:subject_id
pub async fn eligibility(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(subject_id): Path<i64>,
) -> ApiResult<EligibilityReport> {
    let student_id = auth.student_id()?;
    let report = state.progression.eligibility(student_id, subject_id).await?;
    Ok(ApiResponse::success(report))
}

/// GET /api/students/progress - curriculum by term with ledger status and credit totals
pub async fn progress(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<ProgressSummary> {
    let student_id = auth.student_id()?;
    let summary = state.progression.progress_summary(student_id).await?;
    Ok(ApiResponse::success(summary))
}

/// GET /api/students/enrollments - active groups with subject, teacher and schedule
pub async fn enrollments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<CurrentEnrollment>> {
    let student_id = auth.student_id()?;
    Ok(ApiResponse::success(state.roster.current_enrollments(student_id).await?))
}

/// GET /api/students/grades
pub async fn grades(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<GradeEntry>> {
    let student_id = auth.student_id()?;
    Ok(ApiResponse::success(state.roster.grades(student_id).await?))
}
