// handlers/protected/teacher.rs - /api/teachers/* handlers

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::{Extension, Json};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::app::AppState;
use crate::database::models::Enrollment;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::{GradeSubmission, TeacherGroup};

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub grade: Decimal,
}

/// GET /api/teachers/groups - the caller's groups with schedule and roster
pub async fn groups(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Vec<TeacherGroup>> {
    let teacher_id = auth.teacher_id()?;
    Ok(ApiResponse::success(state.roster.teacher_groups(teacher_id).await?))
}

/// GET /api/teachers/groups/:group_id
pub async fn group_detail(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<i64>,
) -> ApiResult<TeacherGroup> {
    let teacher_id = auth.teacher_id()?;
    Ok(ApiResponse::success(state.roster.teacher_group(teacher_id, group_id).await?))
}

/// GET /api/teachers/grades/:group_id/:student_id - current enrollment and grade
pub async fn grade_get(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((group_id, student_id)): Path<(i64, i64)>,
) -> ApiResult<Enrollment> {
    let teacher_id = auth.teacher_id()?;
    let enrollment = state.progression.grade_for(teacher_id, group_id, student_id).await?;
    Ok(ApiResponse::success(enrollment))
}

/// PATCH /api/teachers/grades/:group_id/:student_id - finalize a grade
///
/// Updates the enrollment, the progress ledger and, when the term is
/// complete, the student's term in one transaction. Rejected while the
/// system is in maintenance.
pub async fn grade_patch(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((group_id, student_id)): Path<(i64, i64)>,
    body: Result<Json<GradeRequest>, JsonRejection>,
) -> ApiResult<GradeSubmission> {
    let teacher_id = auth.teacher_id()?;
    let Json(request) = body?;

    let submission = state
        .progression
        .submit_grade(teacher_id, group_id, student_id, request.grade)
        .await?;
    Ok(ApiResponse::success(submission))
}
