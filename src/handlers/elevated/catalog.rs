// handlers/elevated/catalog.rs - course, subject, curriculum, group and enrollment administration

use axum::extract::{rejection::JsonRejection, Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::database::models::{Course, CurriculumEntry, Enrollment, Group, Subject};
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{NewCourseRequest, NewGroupRequest, NewSubjectRequest};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumRequest {
    pub course_id: i64,
    pub subject_id: i64,
    pub term: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteRequest {
    pub required_subject_id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrerequisiteCreated {
    pub subject_id: i64,
    pub required_subject_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub student_id: i64,
}

/// POST /api/admin/courses
pub async fn course_post(
    State(state): State<AppState>,
    body: Result<Json<NewCourseRequest>, JsonRejection>,
) -> ApiResult<Course> {
    let Json(request) = body?;
    Ok(ApiResponse::created(state.catalog.create_course(request).await?))
}

/// POST /api/admin/subjects - create a subject, optionally with its prerequisites
pub async fn subject_post(
    State(state): State<AppState>,
    body: Result<Json<NewSubjectRequest>, JsonRejection>,
) -> ApiResult<Subject> {
    let Json(request) = body?;
    Ok(ApiResponse::created(state.catalog.create_subject(request).await?))
}

/// POST /api/admin/curriculum - place a subject in a term of a course
pub async fn curriculum_post(
    State(state): State<AppState>,
    body: Result<Json<CurriculumRequest>, JsonRejection>,
) -> ApiResult<CurriculumEntry> {
    let Json(request) = body?;
    let entry = state
        .catalog
        .add_curriculum_entry(request.course_id, request.subject_id, request.term)
        .await?;
    Ok(ApiResponse::created(entry))
}

/// POST /api/admin/subjects/:subject_id/prerequisites
pub async fn prerequisite_post(
    State(state): State<AppState>,
    Path(subject_id): Path<i64>,
    body: Result<Json<PrerequisiteRequest>, JsonRejection>,
) -> ApiResult<PrerequisiteCreated> {
    let Json(request) = body?;
    state
        .catalog
        .add_prerequisite(subject_id, request.required_subject_id)
        .await?;
    Ok(ApiResponse::created(PrerequisiteCreated {
        subject_id,
        required_subject_id: request.required_subject_id,
    }))
}

/// POST /api/admin/groups - open a group with its weekly schedule
pub async fn group_post(
    State(state): State<AppState>,
    body: Result<Json<NewGroupRequest>, JsonRejection>,
) -> ApiResult<Group> {
    let Json(request) = body?;
    let group = state.catalog.create_group(request).await?;
    Ok(ApiResponse::created(group))
}

/// POST /api/admin/groups/:group_id/enrollments
pub async fn enrollment_post(
    State(state): State<AppState>,
    Path(group_id): Path<i64>,
    body: Result<Json<EnrollmentRequest>, JsonRejection>,
) -> ApiResult<Enrollment> {
    let Json(request) = body?;
    let enrollment = state.catalog.enroll_student(group_id, request.student_id).await?;
    Ok(ApiResponse::created(enrollment))
}
