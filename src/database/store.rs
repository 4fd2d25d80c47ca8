use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Course, CurriculumEntry, Enrollment, GradeAudit, Group, NewGroup, ProgressRecord, Student,
    Subject, SystemState,
};
use crate::types::{ProgressStatus, SystemMode};

/// Entry point to a persistence backend. Every read and write goes through a
/// [`UnitOfWork`] obtained from [`AcademicStore::begin`].
#[async_trait]
pub trait AcademicStore: Send + Sync {
    /// Short backend name for logs and the health endpoint
    fn backend(&self) -> &'static str;

    /// Open a unit of work. Its effects become visible only on `commit`;
    /// dropping it without committing discards them.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// Transactional handle over the academic data model.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self: Box<Self>) -> Result<(), DatabaseError>;
    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError>;

    // System state
    async fn system_state(&mut self) -> Result<Option<SystemState>, DatabaseError>;
    /// Sets the mode only if the stored version still equals `expected_version`.
    /// A missing row is created when `expected_version` is 0.
    async fn compare_and_set_system_mode(
        &mut self,
        expected_version: i64,
        mode: SystemMode,
        at: DateTime<Utc>,
    ) -> Result<Option<SystemState>, DatabaseError>;

    // Students
    async fn find_student(&mut self, student_id: i64) -> Result<Option<Student>, DatabaseError>;
    /// Same as `find_student`, but holds the row until the unit of work ends.
    async fn lock_student(&mut self, student_id: i64) -> Result<Option<Student>, DatabaseError>;
    async fn list_students(&mut self) -> Result<Vec<Student>, DatabaseError>;
    /// Moves the student from `expected_term` to `expected_term + 1`.
    /// Returns false when the stored term no longer matches.
    async fn advance_student_term(&mut self, student_id: i64, expected_term: i32) -> Result<bool, DatabaseError>;
    async fn set_payment_status(&mut self, student_id: i64, paid: bool) -> Result<Option<Student>, DatabaseError>;
    async fn insert_student(&mut self, course_id: i64, user_id: Option<i64>, term: i32) -> Result<Student, DatabaseError>;

    // Catalog
    async fn insert_course(&mut self, name: &str, duration_terms: i32) -> Result<Course, DatabaseError>;
    async fn insert_subject(&mut self, name: &str, description: Option<&str>, credits: i32) -> Result<Subject, DatabaseError>;
    async fn find_course(&mut self, course_id: i64) -> Result<Option<Course>, DatabaseError>;
    async fn find_subject(&mut self, subject_id: i64) -> Result<Option<Subject>, DatabaseError>;
    async fn subjects_by_ids(&mut self, subject_ids: &[i64]) -> Result<Vec<Subject>, DatabaseError>;
    async fn prerequisites_of(&mut self, subject_id: i64) -> Result<Vec<i64>, DatabaseError>;
    /// Every prerequisite edge as (subject_id, required_subject_id)
    async fn prerequisite_edges(&mut self) -> Result<Vec<(i64, i64)>, DatabaseError>;
    /// Serializes prerequisite writers until the unit of work ends, so a
    /// cycle check and the insert that follows it see the same graph.
    async fn lock_prerequisites(&mut self) -> Result<(), DatabaseError>;
    async fn insert_prerequisite(&mut self, subject_id: i64, required_subject_id: i64) -> Result<(), DatabaseError>;

    // Curriculum plan
    async fn curriculum_for_term(&mut self, course_id: i64, term: i32) -> Result<Vec<CurriculumEntry>, DatabaseError>;
    async fn curriculum_for_course(&mut self, course_id: i64) -> Result<Vec<CurriculumEntry>, DatabaseError>;
    async fn find_curriculum_entry(&mut self, course_id: i64, subject_id: i64) -> Result<Option<CurriculumEntry>, DatabaseError>;
    async fn insert_curriculum_entry(&mut self, course_id: i64, subject_id: i64, term: i32) -> Result<CurriculumEntry, DatabaseError>;

    // Groups
    async fn find_group(&mut self, group_id: i64) -> Result<Option<Group>, DatabaseError>;
    async fn insert_group(&mut self, group: NewGroup) -> Result<Group, DatabaseError>;
    /// Groups taught by `teacher_id` with their schedules, ascending id
    async fn groups_for_teacher(&mut self, teacher_id: i64) -> Result<Vec<Group>, DatabaseError>;
    /// Distinct subjects with at least one group in (course, term), ascending id
    async fn subjects_offered(&mut self, course_id: i64, term: i32) -> Result<Vec<Subject>, DatabaseError>;

    // Enrollments
    async fn find_enrollment(&mut self, group_id: i64, student_id: i64) -> Result<Option<Enrollment>, DatabaseError>;
    async fn insert_enrollment(&mut self, group_id: i64, student_id: i64) -> Result<Enrollment, DatabaseError>;
    /// Every enrollment of a student, active or not, ordered by group
    async fn enrollments_for_student(&mut self, student_id: i64) -> Result<Vec<Enrollment>, DatabaseError>;
    /// Roster of a group ordered by student
    async fn enrollments_for_group(&mut self, group_id: i64) -> Result<Vec<Enrollment>, DatabaseError>;
    /// Stores the grade, deactivates the enrollment and stamps completion time.
    async fn finalize_enrollment(
        &mut self,
        group_id: i64,
        student_id: i64,
        grade: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<Enrollment>, DatabaseError>;
    /// Grades every active, ungraded enrollment with `grade` and deactivates it.
    /// Returns the finalized enrollments paired with their group's subject.
    async fn finalize_ungraded_enrollments(
        &mut self,
        grade: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Vec<(Enrollment, i64)>, DatabaseError>;
    /// Active enrollments that already carry a grade, paired with their group's subject
    async fn active_graded_enrollments(&mut self) -> Result<Vec<(Enrollment, i64)>, DatabaseError>;
    async fn append_grade_audit(&mut self, audit: GradeAudit) -> Result<(), DatabaseError>;

    // Progress ledger
    async fn find_progress(&mut self, student_id: i64, subject_id: i64) -> Result<Option<ProgressRecord>, DatabaseError>;
    async fn progress_for_student(&mut self, student_id: i64) -> Result<Vec<ProgressRecord>, DatabaseError>;
    /// Insert-or-update keyed on (student_id, subject_id).
    async fn upsert_progress(&mut self, record: ProgressRecord) -> Result<ProgressRecord, DatabaseError>;
    /// Inserts a PENDING record unless one exists. Returns true if inserted.
    async fn insert_pending_progress(&mut self, student_id: i64, subject_id: i64) -> Result<bool, DatabaseError>;
    /// Sets `status` unless the current status is in `keep`; inserts when absent.
    async fn set_progress_status_unless(
        &mut self,
        student_id: i64,
        subject_id: i64,
        status: ProgressStatus,
        keep: &[ProgressStatus],
    ) -> Result<ProgressRecord, DatabaseError>;
}
