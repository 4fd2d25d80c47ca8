// handlers/elevated/students.rs - /api/admin/students handlers

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;

use crate::app::AppState;
use crate::database::models::Student;
use crate::middleware::{ApiResponse, ApiResult};
use crate::progression::AdvancementOutcome;
use crate::services::NewStudentRequest;

/// POST /api/admin/students - register a student in a course
pub async fn student_post(
    State(state): State<AppState>,
    body: Result<Json<NewStudentRequest>, JsonRejection>,
) -> ApiResult<Student> {
    let Json(request) = body?;
    Ok(ApiResponse::created(state.catalog.create_student(request).await?))
}

/// POST /api/admin/students/:student_id/toggle-pay
pub async fn toggle_pay(State(state): State<AppState>, Path(student_id): Path<i64>) -> ApiResult<Student> {
    Ok(ApiResponse::success(state.catalog.toggle_payment(student_id).await?))
}

/// POST /api/admin/students/:student_id/advance - re-run the advancement check now
pub async fn advance(State(state): State<AppState>, Path(student_id): Path<i64>) -> ApiResult<AdvancementOutcome> {
    Ok(ApiResponse::success(state.progression.advance_student(student_id).await?))
}
