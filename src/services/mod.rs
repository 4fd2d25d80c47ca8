pub mod catalog_service;
pub mod progression_service;
pub mod roster_service;
pub mod system_service;

pub use catalog_service::{
    CatalogService, NewCourseRequest, NewGroupRequest, NewStudentRequest, NewSubjectRequest, ScheduleSlotRequest,
};
pub use progression_service::{GradeSubmission, ProgressSummary, ProgressionService, SubjectProgress, TermProgress};
pub use roster_service::{CurrentEnrollment, GradeEntry, RosterEntry, RosterService, TeacherGroup};
pub use system_service::SystemService;

use crate::database::models::Group;
use crate::database::UnitOfWork;
use crate::progression::{ProgressionError, ProgressionResult};

/// Load a group and check it is taught by `teacher_id`
pub(crate) async fn owned_group(uow: &mut dyn UnitOfWork, teacher_id: i64, group_id: i64) -> ProgressionResult<Group> {
    let group = uow
        .find_group(group_id)
        .await?
        .ok_or_else(|| ProgressionError::not_found("Group", group_id))?;
    if group.teacher_id != teacher_id {
        return Err(ProgressionError::Forbidden("Group is assigned to another teacher".to_string()));
    }
    Ok(group)
}

/// Commit the unit of work when `result` is `Ok`, roll it back otherwise.
pub(crate) async fn finish<T>(uow: Box<dyn UnitOfWork>, result: ProgressionResult<T>) -> ProgressionResult<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = uow.rollback().await {
                tracing::warn!("Rollback failed after {}: {}", err, rollback_err);
            }
            Err(err)
        }
    }
}
