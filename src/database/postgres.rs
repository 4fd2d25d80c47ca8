use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Course, CurriculumEntry, Enrollment, GradeAudit, Group, NewGroup, ProgressRecord, ScheduleSlot,
    Student, Subject, SystemState,
};
use crate::database::store::{AcademicStore, UnitOfWork};
use crate::types::{ProgressStatus, SystemMode};

const STUDENT_COLUMNS: &str = "id, user_id, course_id, term, paid";
const GROUP_COLUMNS: &str = "id, name, code, course_id, subject_id, teacher_id, term";
const PROGRESS_COLUMNS: &str = "student_id, subject_id, status, grade, completed_at";
const ENROLLMENT_COLUMNS: &str = "group_id, student_id, grade, active, completed_at";

/// Enrollment joined with the subject of its group
#[derive(Debug, FromRow)]
struct EnrollmentSubjectRow {
    #[sqlx(flatten)]
    enrollment: Enrollment,
    subject_id: i64,
}

impl From<EnrollmentSubjectRow> for (Enrollment, i64) {
    fn from(row: EnrollmentSubjectRow) -> Self {
        (row.enrollment, row.subject_id)
    }
}

/// Postgres-backed store; one unit of work is one database transaction
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PgUnitOfWork {
    async fn load_schedule(&mut self, group_id: i64) -> Result<Vec<ScheduleSlot>, DatabaseError> {
        let slots = sqlx::query_as::<_, ScheduleSlot>(
            "SELECT day, starts_at, ends_at FROM group_schedules
             WHERE group_id = $1 ORDER BY day, starts_at",
        )
        .bind(group_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(slots)
    }
}

#[async_trait]
impl AcademicStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DatabaseError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        self.tx.rollback().await?;
        Ok(())
    }

    async fn system_state(&mut self) -> Result<Option<SystemState>, DatabaseError> {
        let state = sqlx::query_as::<_, SystemState>(
            "SELECT id, mode, version, updated_at FROM system_state WHERE id = $1",
        )
        .bind(SystemState::SINGLETON_ID)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(state)
    }

    async fn compare_and_set_system_mode(
        &mut self,
        expected_version: i64,
        mode: SystemMode,
        at: DateTime<Utc>,
    ) -> Result<Option<SystemState>, DatabaseError> {
        let state = if expected_version == 0 {
            sqlx::query_as::<_, SystemState>(
                "INSERT INTO system_state (id, mode, version, updated_at)
                 VALUES ($1, $2, 1, $3)
                 ON CONFLICT (id) DO NOTHING
                 RETURNING id, mode, version, updated_at",
            )
            .bind(SystemState::SINGLETON_ID)
            .bind(mode)
            .bind(at)
            .fetch_optional(&mut *self.tx)
            .await?
        } else {
            sqlx::query_as::<_, SystemState>(
                "UPDATE system_state
                 SET mode = $2, version = version + 1, updated_at = $3
                 WHERE id = $1 AND version = $4
                 RETURNING id, mode, version, updated_at",
            )
            .bind(SystemState::SINGLETON_ID)
            .bind(mode)
            .bind(at)
            .bind(expected_version)
            .fetch_optional(&mut *self.tx)
            .await?
        };
        Ok(state)
    }

    async fn find_student(&mut self, student_id: i64) -> Result<Option<Student>, DatabaseError> {
        let sql = format!("SELECT {} FROM students WHERE id = $1", STUDENT_COLUMNS);
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(student_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(student)
    }

    async fn lock_student(&mut self, student_id: i64) -> Result<Option<Student>, DatabaseError> {
        let sql = format!("SELECT {} FROM students WHERE id = $1 FOR UPDATE", STUDENT_COLUMNS);
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(student_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(student)
    }

    async fn list_students(&mut self) -> Result<Vec<Student>, DatabaseError> {
        let sql = format!("SELECT {} FROM students ORDER BY id", STUDENT_COLUMNS);
        let students = sqlx::query_as::<_, Student>(&sql)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(students)
    }

    async fn advance_student_term(&mut self, student_id: i64, expected_term: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("UPDATE students SET term = term + 1 WHERE id = $1 AND term = $2")
            .bind(student_id)
            .bind(expected_term)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_payment_status(&mut self, student_id: i64, paid: bool) -> Result<Option<Student>, DatabaseError> {
        let sql = format!("UPDATE students SET paid = $2 WHERE id = $1 RETURNING {}", STUDENT_COLUMNS);
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(student_id)
            .bind(paid)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(student)
    }

    async fn insert_student(&mut self, course_id: i64, user_id: Option<i64>, term: i32) -> Result<Student, DatabaseError> {
        let sql = format!(
            "INSERT INTO students (course_id, user_id, term) VALUES ($1, $2, $3) RETURNING {}",
            STUDENT_COLUMNS
        );
        let student = sqlx::query_as::<_, Student>(&sql)
            .bind(course_id)
            .bind(user_id)
            .bind(term)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(student)
    }

    async fn insert_course(&mut self, name: &str, duration_terms: i32) -> Result<Course, DatabaseError> {
        let course = sqlx::query_as::<_, Course>(
            "INSERT INTO courses (name, duration_terms) VALUES ($1, $2) RETURNING id, name, duration_terms",
        )
        .bind(name)
        .bind(duration_terms)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(course)
    }

    async fn insert_subject(&mut self, name: &str, description: Option<&str>, credits: i32) -> Result<Subject, DatabaseError> {
        let subject = sqlx::query_as::<_, Subject>(
            "INSERT INTO subjects (name, description, credits) VALUES ($1, $2, $3)
             RETURNING id, name, description, credits",
        )
        .bind(name)
        .bind(description)
        .bind(credits)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(subject)
    }

    async fn find_course(&mut self, course_id: i64) -> Result<Option<Course>, DatabaseError> {
        let course = sqlx::query_as::<_, Course>("SELECT id, name, duration_terms FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(course)
    }

    async fn find_subject(&mut self, subject_id: i64) -> Result<Option<Subject>, DatabaseError> {
        let subject = sqlx::query_as::<_, Subject>(
            "SELECT id, name, description, credits FROM subjects WHERE id = $1",
        )
        .bind(subject_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(subject)
    }

    async fn subjects_by_ids(&mut self, subject_ids: &[i64]) -> Result<Vec<Subject>, DatabaseError> {
        if subject_ids.is_empty() {
            return Ok(vec![]);
        }
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT id, name, description, credits FROM subjects WHERE id = ANY($1) ORDER BY id",
        )
        .bind(subject_ids)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(subjects)
    }

    async fn prerequisites_of(&mut self, subject_id: i64) -> Result<Vec<i64>, DatabaseError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT required_subject_id FROM subject_prerequisites
             WHERE subject_id = $1 ORDER BY required_subject_id",
        )
        .bind(subject_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(ids)
    }

    async fn prerequisite_edges(&mut self) -> Result<Vec<(i64, i64)>, DatabaseError> {
        let edges = sqlx::query_as::<_, (i64, i64)>(
            "SELECT subject_id, required_subject_id FROM subject_prerequisites",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(edges)
    }

    async fn lock_prerequisites(&mut self) -> Result<(), DatabaseError> {
        // Conflicts with itself, so a second writer waits for this transaction to end.
        sqlx::query("LOCK TABLE subject_prerequisites IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_prerequisite(&mut self, subject_id: i64, required_subject_id: i64) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO subject_prerequisites (subject_id, required_subject_id) VALUES ($1, $2)")
            .bind(subject_id)
            .bind(required_subject_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn curriculum_for_term(&mut self, course_id: i64, term: i32) -> Result<Vec<CurriculumEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, CurriculumEntry>(
            "SELECT id, course_id, subject_id, term FROM curriculum_entries
             WHERE course_id = $1 AND term = $2 ORDER BY subject_id",
        )
        .bind(course_id)
        .bind(term)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(entries)
    }

    async fn curriculum_for_course(&mut self, course_id: i64) -> Result<Vec<CurriculumEntry>, DatabaseError> {
        let entries = sqlx::query_as::<_, CurriculumEntry>(
            "SELECT id, course_id, subject_id, term FROM curriculum_entries
             WHERE course_id = $1 ORDER BY term, subject_id",
        )
        .bind(course_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(entries)
    }

    async fn find_curriculum_entry(&mut self, course_id: i64, subject_id: i64) -> Result<Option<CurriculumEntry>, DatabaseError> {
        let entry = sqlx::query_as::<_, CurriculumEntry>(
            "SELECT id, course_id, subject_id, term FROM curriculum_entries
             WHERE course_id = $1 AND subject_id = $2",
        )
        .bind(course_id)
        .bind(subject_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(entry)
    }

    async fn insert_curriculum_entry(&mut self, course_id: i64, subject_id: i64, term: i32) -> Result<CurriculumEntry, DatabaseError> {
        let entry = sqlx::query_as::<_, CurriculumEntry>(
            "INSERT INTO curriculum_entries (course_id, subject_id, term) VALUES ($1, $2, $3)
             RETURNING id, course_id, subject_id, term",
        )
        .bind(course_id)
        .bind(subject_id)
        .bind(term)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(entry)
    }

    async fn find_group(&mut self, group_id: i64) -> Result<Option<Group>, DatabaseError> {
        let sql = format!("SELECT {} FROM groups WHERE id = $1", GROUP_COLUMNS);
        let group = sqlx::query_as::<_, Group>(&sql)
            .bind(group_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        let Some(mut group) = group else {
            return Ok(None);
        };

        group.schedule = self.load_schedule(group_id).await?;
        Ok(Some(group))
    }

    async fn insert_group(&mut self, new_group: NewGroup) -> Result<Group, DatabaseError> {
        let sql = format!(
            "INSERT INTO groups (name, code, course_id, subject_id, teacher_id, term)
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            GROUP_COLUMNS
        );
        let mut group = sqlx::query_as::<_, Group>(&sql)
            .bind(&new_group.name)
            .bind(&new_group.code)
            .bind(new_group.course_id)
            .bind(new_group.subject_id)
            .bind(new_group.teacher_id)
            .bind(new_group.term)
            .fetch_one(&mut *self.tx)
            .await?;

        for slot in &new_group.schedule {
            sqlx::query(
                "INSERT INTO group_schedules (group_id, day, starts_at, ends_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(group.id)
            .bind(slot.day)
            .bind(slot.starts_at)
            .bind(slot.ends_at)
            .execute(&mut *self.tx)
            .await?;
        }

        group.schedule = new_group.schedule;
        Ok(group)
    }

    async fn groups_for_teacher(&mut self, teacher_id: i64) -> Result<Vec<Group>, DatabaseError> {
        let sql = format!("SELECT {} FROM groups WHERE teacher_id = $1 ORDER BY id", GROUP_COLUMNS);
        let mut groups = sqlx::query_as::<_, Group>(&sql)
            .bind(teacher_id)
            .fetch_all(&mut *self.tx)
            .await?;

        for group in &mut groups {
            group.schedule = self.load_schedule(group.id).await?;
        }
        Ok(groups)
    }

    async fn subjects_offered(&mut self, course_id: i64, term: i32) -> Result<Vec<Subject>, DatabaseError> {
        let subjects = sqlx::query_as::<_, Subject>(
            "SELECT DISTINCT s.id, s.name, s.description, s.credits
             FROM subjects s
             JOIN groups g ON g.subject_id = s.id
             WHERE g.course_id = $1 AND g.term = $2
             ORDER BY s.id",
        )
        .bind(course_id)
        .bind(term)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(subjects)
    }

    async fn find_enrollment(&mut self, group_id: i64, student_id: i64) -> Result<Option<Enrollment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE group_id = $1 AND student_id = $2",
            ENROLLMENT_COLUMNS
        );
        let enrollment = sqlx::query_as::<_, Enrollment>(&sql)
            .bind(group_id)
            .bind(student_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(enrollment)
    }

    async fn insert_enrollment(&mut self, group_id: i64, student_id: i64) -> Result<Enrollment, DatabaseError> {
        let sql = format!(
            "INSERT INTO enrollments (group_id, student_id) VALUES ($1, $2) RETURNING {}",
            ENROLLMENT_COLUMNS
        );
        let enrollment = sqlx::query_as::<_, Enrollment>(&sql)
            .bind(group_id)
            .bind(student_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(enrollment)
    }

    async fn enrollments_for_student(&mut self, student_id: i64) -> Result<Vec<Enrollment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE student_id = $1 ORDER BY group_id",
            ENROLLMENT_COLUMNS
        );
        let enrollments = sqlx::query_as::<_, Enrollment>(&sql)
            .bind(student_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(enrollments)
    }

    async fn enrollments_for_group(&mut self, group_id: i64) -> Result<Vec<Enrollment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM enrollments WHERE group_id = $1 ORDER BY student_id",
            ENROLLMENT_COLUMNS
        );
        let enrollments = sqlx::query_as::<_, Enrollment>(&sql)
            .bind(group_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(enrollments)
    }

    async fn finalize_enrollment(
        &mut self,
        group_id: i64,
        student_id: i64,
        grade: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<Enrollment>, DatabaseError> {
        let sql = format!(
            "UPDATE enrollments SET grade = $3, active = FALSE, completed_at = $4
             WHERE group_id = $1 AND student_id = $2 RETURNING {}",
            ENROLLMENT_COLUMNS
        );
        let enrollment = sqlx::query_as::<_, Enrollment>(&sql)
            .bind(group_id)
            .bind(student_id)
            .bind(grade)
            .bind(at)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(enrollment)
    }

    async fn finalize_ungraded_enrollments(
        &mut self,
        grade: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Vec<(Enrollment, i64)>, DatabaseError> {
        let rows = sqlx::query_as::<_, EnrollmentSubjectRow>(
            "UPDATE enrollments e
             SET grade = $1, active = FALSE, completed_at = $2
             FROM groups g
             WHERE g.id = e.group_id AND e.active AND e.grade IS NULL
             RETURNING e.group_id, e.student_id, e.grade, e.active, e.completed_at, g.subject_id",
        )
        .bind(grade)
        .bind(at)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut finalized: Vec<(Enrollment, i64)> = rows.into_iter().map(Into::into).collect();
        finalized.sort_by_key(|(e, _)| (e.student_id, e.group_id));
        Ok(finalized)
    }

    async fn active_graded_enrollments(&mut self) -> Result<Vec<(Enrollment, i64)>, DatabaseError> {
        let rows = sqlx::query_as::<_, EnrollmentSubjectRow>(
            "SELECT e.group_id, e.student_id, e.grade, e.active, e.completed_at, g.subject_id
             FROM enrollments e
             JOIN groups g ON g.id = e.group_id
             WHERE e.active AND e.grade IS NOT NULL
             ORDER BY e.student_id, e.group_id",
        )
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn append_grade_audit(&mut self, audit: GradeAudit) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO grade_audit (group_id, student_id, previous_grade, new_grade, source, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(audit.group_id)
        .bind(audit.student_id)
        .bind(audit.previous_grade)
        .bind(audit.new_grade)
        .bind(audit.source)
        .bind(audit.recorded_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn find_progress(&mut self, student_id: i64, subject_id: i64) -> Result<Option<ProgressRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM progress_records WHERE student_id = $1 AND subject_id = $2",
            PROGRESS_COLUMNS
        );
        let record = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(student_id)
            .bind(subject_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(record)
    }

    async fn progress_for_student(&mut self, student_id: i64) -> Result<Vec<ProgressRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM progress_records WHERE student_id = $1 ORDER BY subject_id",
            PROGRESS_COLUMNS
        );
        let records = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(student_id)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(records)
    }

    async fn upsert_progress(&mut self, record: ProgressRecord) -> Result<ProgressRecord, DatabaseError> {
        let sql = format!(
            "INSERT INTO progress_records (student_id, subject_id, status, grade, completed_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (student_id, subject_id) DO UPDATE
             SET status = EXCLUDED.status, grade = EXCLUDED.grade, completed_at = EXCLUDED.completed_at
             RETURNING {}",
            PROGRESS_COLUMNS
        );
        let stored = sqlx::query_as::<_, ProgressRecord>(&sql)
            .bind(record.student_id)
            .bind(record.subject_id)
            .bind(record.status)
            .bind(record.grade)
            .bind(record.completed_at)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(stored)
    }

    async fn insert_pending_progress(&mut self, student_id: i64, subject_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO progress_records (student_id, subject_id, status) VALUES ($1, $2, 'PENDING')
             ON CONFLICT (student_id, subject_id) DO NOTHING",
        )
        .bind(student_id)
        .bind(subject_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn set_progress_status_unless(
        &mut self,
        student_id: i64,
        subject_id: i64,
        status: ProgressStatus,
        keep: &[ProgressStatus],
    ) -> Result<ProgressRecord, DatabaseError> {
        match self.find_progress(student_id, subject_id).await? {
            Some(existing) if keep.contains(&existing.status) => Ok(existing),
            Some(existing) => {
                self.upsert_progress(ProgressRecord { status, ..existing }).await
            }
            None => {
                let record = ProgressRecord {
                    status,
                    ..ProgressRecord::pending(student_id, subject_id)
                };
                self.upsert_progress(record).await
            }
        }
    }
}
