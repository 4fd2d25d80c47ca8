use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Course, CurriculumEntry, Enrollment, GradeAudit, Group, NewGroup, ProgressRecord, Student,
    Subject, SystemState,
};
use crate::database::store::{AcademicStore, UnitOfWork};
use crate::types::{ProgressStatus, SystemMode};

/// Store operations that can be told to fail, to exercise rollback paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Begin,
    ListStudents,
    AdvanceStudentTerm,
    UpsertProgress,
    FinalizeEnrollments,
    Commit,
}

/// Whole data set of the in-memory backend
#[derive(Debug, Clone)]
pub struct MemoryState {
    pub system_state: Option<SystemState>,
    pub courses: BTreeMap<i64, Course>,
    pub subjects: BTreeMap<i64, Subject>,
    /// (subject_id, required_subject_id)
    pub prerequisites: BTreeSet<(i64, i64)>,
    pub curriculum: BTreeMap<i64, CurriculumEntry>,
    pub students: BTreeMap<i64, Student>,
    pub groups: BTreeMap<i64, Group>,
    /// Keyed by (group_id, student_id)
    pub enrollments: BTreeMap<(i64, i64), Enrollment>,
    /// Keyed by (student_id, subject_id)
    pub progress: BTreeMap<(i64, i64), ProgressRecord>,
    pub grade_audit: Vec<GradeAudit>,
    next_id: i64,
}

impl Default for MemoryState {
    fn default() -> Self {
        Self {
            system_state: Some(SystemState {
                id: SystemState::SINGLETON_ID,
                mode: SystemMode::Active,
                version: 1,
                updated_at: Utc::now(),
            }),
            courses: BTreeMap::new(),
            subjects: BTreeMap::new(),
            prerequisites: BTreeSet::new(),
            curriculum: BTreeMap::new(),
            students: BTreeMap::new(),
            groups: BTreeMap::new(),
            enrollments: BTreeMap::new(),
            progress: BTreeMap::new(),
            grade_audit: Vec::new(),
            next_id: 1,
        }
    }
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_course(&mut self, name: &str, duration_terms: i32) -> i64 {
        let id = self.next_id();
        self.courses.insert(id, Course { id, name: name.to_string(), duration_terms });
        id
    }

    pub fn add_subject(&mut self, name: &str, credits: i32) -> i64 {
        let id = self.next_id();
        self.subjects.insert(
            id,
            Subject { id, name: name.to_string(), description: None, credits },
        );
        id
    }

    pub fn add_prerequisite(&mut self, subject_id: i64, required_subject_id: i64) {
        self.prerequisites.insert((subject_id, required_subject_id));
    }

    pub fn add_curriculum_entry(&mut self, course_id: i64, subject_id: i64, term: i32) -> i64 {
        let id = self.next_id();
        self.curriculum.insert(id, CurriculumEntry { id, course_id, subject_id, term });
        id
    }

    pub fn add_student(&mut self, course_id: i64, term: i32) -> i64 {
        let id = self.next_id();
        self.students.insert(
            id,
            Student { id, user_id: None, course_id, term, paid: false },
        );
        id
    }

    pub fn add_group(&mut self, course_id: i64, subject_id: i64, teacher_id: i64, term: i32) -> i64 {
        let id = self.next_id();
        self.groups.insert(
            id,
            Group {
                id,
                name: format!("Group {}", id),
                code: format!("G{}", id),
                course_id,
                subject_id,
                teacher_id,
                term,
                schedule: Vec::new(),
            },
        );
        id
    }

    pub fn enroll(&mut self, group_id: i64, student_id: i64, grade: Option<Decimal>) {
        let mut enrollment = Enrollment::new(group_id, student_id);
        enrollment.grade = grade;
        self.enrollments.insert((group_id, student_id), enrollment);
    }

    pub fn set_progress(&mut self, student_id: i64, subject_id: i64, status: ProgressStatus, grade: Option<Decimal>) {
        let completed_at = if status.is_graded() { Some(Utc::now()) } else { None };
        self.progress.insert(
            (student_id, subject_id),
            ProgressRecord { student_id, subject_id, status, grade, completed_at },
        );
    }

    pub fn set_mode(&mut self, mode: SystemMode) {
        let version = self.system_state.as_ref().map(|s| s.version + 1).unwrap_or(1);
        self.system_state = Some(SystemState {
            id: SystemState::SINGLETON_ID,
            mode,
            version,
            updated_at: Utc::now(),
        });
    }

    fn subject_of_group(&self, group_id: i64) -> Result<i64, DatabaseError> {
        self.groups
            .get(&group_id)
            .map(|g| g.subject_id)
            .ok_or_else(|| DatabaseError::QueryError(format!("enrollment references missing group {}", group_id)))
    }
}

/// In-process backend. A unit of work holds the state lock for its whole
/// lifetime and restores the begin-time snapshot unless committed.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_points: Arc<StdMutex<HashSet<FailPoint>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: MemoryState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            fail_points: Arc::default(),
        }
    }

    /// Copy of the committed state
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }

    pub fn inject_failure(&self, point: FailPoint) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.insert(point);
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut points) = self.fail_points.lock() {
            points.clear();
        }
    }

    fn check(fail_points: &StdMutex<HashSet<FailPoint>>, point: FailPoint) -> Result<(), DatabaseError> {
        let armed = fail_points.lock().map(|p| p.contains(&point)).unwrap_or(false);
        if armed {
            return Err(DatabaseError::Unavailable(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }
}

#[async_trait]
impl AcademicStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DatabaseError> {
        Self::check(&self.fail_points, FailPoint::Begin)?;
        let guard = self.state.clone().lock_owned().await;
        let snapshot = (*guard).clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            snapshot: Some(snapshot),
            fail_points: self.fail_points.clone(),
        }))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    snapshot: Option<MemoryState>,
    fail_points: Arc<StdMutex<HashSet<FailPoint>>>,
}

impl MemoryUnitOfWork {
    fn fail_at(&self, point: FailPoint) -> Result<(), DatabaseError> {
        MemoryStore::check(&self.fail_points, point)
    }

    fn state(&mut self) -> &mut MemoryState {
        &mut self.guard
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(mut self: Box<Self>) -> Result<(), DatabaseError> {
        // On failure the snapshot is still armed and Drop rolls back.
        self.fail_at(FailPoint::Commit)?;
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn system_state(&mut self) -> Result<Option<SystemState>, DatabaseError> {
        Ok(self.state().system_state.clone())
    }

    async fn compare_and_set_system_mode(
        &mut self,
        expected_version: i64,
        mode: SystemMode,
        at: DateTime<Utc>,
    ) -> Result<Option<SystemState>, DatabaseError> {
        let state = self.state();
        let current_version = state.system_state.as_ref().map(|s| s.version).unwrap_or(0);
        if current_version != expected_version {
            return Ok(None);
        }
        let next = SystemState {
            id: SystemState::SINGLETON_ID,
            mode,
            version: current_version + 1,
            updated_at: at,
        };
        state.system_state = Some(next.clone());
        Ok(Some(next))
    }

    async fn find_student(&mut self, student_id: i64) -> Result<Option<Student>, DatabaseError> {
        Ok(self.state().students.get(&student_id).cloned())
    }

    async fn lock_student(&mut self, student_id: i64) -> Result<Option<Student>, DatabaseError> {
        // The unit of work already holds the whole state exclusively.
        self.find_student(student_id).await
    }

    async fn list_students(&mut self) -> Result<Vec<Student>, DatabaseError> {
        self.fail_at(FailPoint::ListStudents)?;
        Ok(self.state().students.values().cloned().collect())
    }

    async fn advance_student_term(&mut self, student_id: i64, expected_term: i32) -> Result<bool, DatabaseError> {
        self.fail_at(FailPoint::AdvanceStudentTerm)?;
        match self.state().students.get_mut(&student_id) {
            Some(student) if student.term == expected_term => {
                student.term += 1;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_payment_status(&mut self, student_id: i64, paid: bool) -> Result<Option<Student>, DatabaseError> {
        Ok(self.state().students.get_mut(&student_id).map(|student| {
            student.paid = paid;
            student.clone()
        }))
    }

    async fn insert_student(&mut self, course_id: i64, user_id: Option<i64>, term: i32) -> Result<Student, DatabaseError> {
        let state = self.state();
        if !state.courses.contains_key(&course_id) {
            return Err(DatabaseError::QueryError(format!("student references missing course {}", course_id)));
        }
        let id = state.next_id();
        let student = Student { id, user_id, course_id, term, paid: false };
        state.students.insert(id, student.clone());
        Ok(student)
    }

    async fn insert_course(&mut self, name: &str, duration_terms: i32) -> Result<Course, DatabaseError> {
        let id = self.state().add_course(name, duration_terms);
        Ok(Course { id, name: name.to_string(), duration_terms })
    }

    async fn insert_subject(&mut self, name: &str, description: Option<&str>, credits: i32) -> Result<Subject, DatabaseError> {
        let state = self.state();
        let id = state.add_subject(name, credits);
        let subject = Subject {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            credits,
        };
        state.subjects.insert(id, subject.clone());
        Ok(subject)
    }

    async fn find_course(&mut self, course_id: i64) -> Result<Option<Course>, DatabaseError> {
        Ok(self.state().courses.get(&course_id).cloned())
    }

    async fn find_subject(&mut self, subject_id: i64) -> Result<Option<Subject>, DatabaseError> {
        Ok(self.state().subjects.get(&subject_id).cloned())
    }

    async fn subjects_by_ids(&mut self, subject_ids: &[i64]) -> Result<Vec<Subject>, DatabaseError> {
        let wanted: BTreeSet<i64> = subject_ids.iter().copied().collect();
        let state = self.state();
        Ok(wanted.iter().filter_map(|id| state.subjects.get(id).cloned()).collect())
    }

    async fn prerequisites_of(&mut self, subject_id: i64) -> Result<Vec<i64>, DatabaseError> {
        Ok(self
            .state()
            .prerequisites
            .iter()
            .filter(|(subject, _)| *subject == subject_id)
            .map(|(_, required)| *required)
            .collect())
    }

    async fn prerequisite_edges(&mut self) -> Result<Vec<(i64, i64)>, DatabaseError> {
        Ok(self.state().prerequisites.iter().copied().collect())
    }

    async fn lock_prerequisites(&mut self) -> Result<(), DatabaseError> {
        // The unit of work already holds the whole state exclusively.
        Ok(())
    }

    async fn insert_prerequisite(&mut self, subject_id: i64, required_subject_id: i64) -> Result<(), DatabaseError> {
        if !self.state().prerequisites.insert((subject_id, required_subject_id)) {
            return Err(DatabaseError::Duplicate(format!(
                "duplicate prerequisite {} -> {}",
                subject_id, required_subject_id
            )));
        }
        Ok(())
    }

    async fn curriculum_for_term(&mut self, course_id: i64, term: i32) -> Result<Vec<CurriculumEntry>, DatabaseError> {
        let mut entries: Vec<CurriculumEntry> = self
            .state()
            .curriculum
            .values()
            .filter(|e| e.course_id == course_id && e.term == term)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.subject_id);
        Ok(entries)
    }

    async fn curriculum_for_course(&mut self, course_id: i64) -> Result<Vec<CurriculumEntry>, DatabaseError> {
        let mut entries: Vec<CurriculumEntry> = self
            .state()
            .curriculum
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| (e.term, e.subject_id));
        Ok(entries)
    }

    async fn find_curriculum_entry(&mut self, course_id: i64, subject_id: i64) -> Result<Option<CurriculumEntry>, DatabaseError> {
        Ok(self
            .state()
            .curriculum
            .values()
            .find(|e| e.course_id == course_id && e.subject_id == subject_id)
            .cloned())
    }

    async fn insert_curriculum_entry(&mut self, course_id: i64, subject_id: i64, term: i32) -> Result<CurriculumEntry, DatabaseError> {
        if self.find_curriculum_entry(course_id, subject_id).await?.is_some() {
            return Err(DatabaseError::Duplicate(format!(
                "duplicate curriculum entry for course {} subject {}",
                course_id, subject_id
            )));
        }
        let state = self.state();
        let id = state.add_curriculum_entry(course_id, subject_id, term);
        Ok(CurriculumEntry { id, course_id, subject_id, term })
    }

    async fn find_group(&mut self, group_id: i64) -> Result<Option<Group>, DatabaseError> {
        Ok(self.state().groups.get(&group_id).cloned())
    }

    async fn insert_group(&mut self, new_group: NewGroup) -> Result<Group, DatabaseError> {
        let state = self.state();
        if state.groups.values().any(|g| g.code == new_group.code) {
            return Err(DatabaseError::Duplicate(format!("group code {}", new_group.code)));
        }
        let id = state.next_id();
        let group = Group {
            id,
            name: new_group.name,
            code: new_group.code,
            course_id: new_group.course_id,
            subject_id: new_group.subject_id,
            teacher_id: new_group.teacher_id,
            term: new_group.term,
            schedule: new_group.schedule,
        };
        state.groups.insert(id, group.clone());
        Ok(group)
    }

    async fn groups_for_teacher(&mut self, teacher_id: i64) -> Result<Vec<Group>, DatabaseError> {
        Ok(self
            .state()
            .groups
            .values()
            .filter(|g| g.teacher_id == teacher_id)
            .cloned()
            .collect())
    }

    async fn subjects_offered(&mut self, course_id: i64, term: i32) -> Result<Vec<Subject>, DatabaseError> {
        let state = self.state();
        let ids: BTreeSet<i64> = state
            .groups
            .values()
            .filter(|g| g.course_id == course_id && g.term == term)
            .map(|g| g.subject_id)
            .collect();
        Ok(ids.iter().filter_map(|id| state.subjects.get(id).cloned()).collect())
    }

    async fn find_enrollment(&mut self, group_id: i64, student_id: i64) -> Result<Option<Enrollment>, DatabaseError> {
        Ok(self.state().enrollments.get(&(group_id, student_id)).cloned())
    }

    async fn insert_enrollment(&mut self, group_id: i64, student_id: i64) -> Result<Enrollment, DatabaseError> {
        let state = self.state();
        if state.enrollments.contains_key(&(group_id, student_id)) {
            return Err(DatabaseError::Duplicate(format!(
                "duplicate enrollment of student {} in group {}",
                student_id, group_id
            )));
        }
        let enrollment = Enrollment::new(group_id, student_id);
        state.enrollments.insert((group_id, student_id), enrollment.clone());
        Ok(enrollment)
    }

    async fn enrollments_for_student(&mut self, student_id: i64) -> Result<Vec<Enrollment>, DatabaseError> {
        Ok(self
            .state()
            .enrollments
            .values()
            .filter(|e| e.student_id == student_id)
            .cloned()
            .collect())
    }

    async fn enrollments_for_group(&mut self, group_id: i64) -> Result<Vec<Enrollment>, DatabaseError> {
        Ok(self
            .state()
            .enrollments
            .range((group_id, i64::MIN)..=(group_id, i64::MAX))
            .map(|(_, enrollment)| enrollment.clone())
            .collect())
    }

    async fn finalize_enrollment(
        &mut self,
        group_id: i64,
        student_id: i64,
        grade: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<Enrollment>, DatabaseError> {
        Ok(self
            .state()
            .enrollments
            .get_mut(&(group_id, student_id))
            .map(|enrollment| {
                enrollment.grade = Some(grade);
                enrollment.active = false;
                enrollment.completed_at = Some(at);
                enrollment.clone()
            }))
    }

    async fn finalize_ungraded_enrollments(
        &mut self,
        grade: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Vec<(Enrollment, i64)>, DatabaseError> {
        self.fail_at(FailPoint::FinalizeEnrollments)?;
        let state = self.state();
        let mut finalized = Vec::new();
        let keys: Vec<(i64, i64)> = state
            .enrollments
            .iter()
            .filter(|(_, e)| e.active && e.grade.is_none())
            .map(|(key, _)| *key)
            .collect();

        for key in keys {
            let subject_id = state.subject_of_group(key.0)?;
            if let Some(enrollment) = state.enrollments.get_mut(&key) {
                enrollment.grade = Some(grade);
                enrollment.active = false;
                enrollment.completed_at = Some(at);
                finalized.push((enrollment.clone(), subject_id));
            }
        }

        finalized.sort_by_key(|(e, _)| (e.student_id, e.group_id));
        Ok(finalized)
    }

    async fn active_graded_enrollments(&mut self) -> Result<Vec<(Enrollment, i64)>, DatabaseError> {
        let state = self.state();
        let mut rows = Vec::new();
        for enrollment in state.enrollments.values().filter(|e| e.active && e.grade.is_some()) {
            rows.push((enrollment.clone(), state.subject_of_group(enrollment.group_id)?));
        }
        rows.sort_by_key(|(e, _)| (e.student_id, e.group_id));
        Ok(rows)
    }

    async fn append_grade_audit(&mut self, audit: GradeAudit) -> Result<(), DatabaseError> {
        self.state().grade_audit.push(audit);
        Ok(())
    }

    async fn find_progress(&mut self, student_id: i64, subject_id: i64) -> Result<Option<ProgressRecord>, DatabaseError> {
        Ok(self.state().progress.get(&(student_id, subject_id)).cloned())
    }

    async fn progress_for_student(&mut self, student_id: i64) -> Result<Vec<ProgressRecord>, DatabaseError> {
        Ok(self
            .state()
            .progress
            .range((student_id, i64::MIN)..=(student_id, i64::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn upsert_progress(&mut self, record: ProgressRecord) -> Result<ProgressRecord, DatabaseError> {
        self.fail_at(FailPoint::UpsertProgress)?;
        self.state()
            .progress
            .insert((record.student_id, record.subject_id), record.clone());
        Ok(record)
    }

    async fn insert_pending_progress(&mut self, student_id: i64, subject_id: i64) -> Result<bool, DatabaseError> {
        let progress = &mut self.state().progress;
        if progress.contains_key(&(student_id, subject_id)) {
            return Ok(false);
        }
        progress.insert((student_id, subject_id), ProgressRecord::pending(student_id, subject_id));
        Ok(true)
    }

    async fn set_progress_status_unless(
        &mut self,
        student_id: i64,
        subject_id: i64,
        status: ProgressStatus,
        keep: &[ProgressStatus],
    ) -> Result<ProgressRecord, DatabaseError> {
        let record = self
            .state()
            .progress
            .entry((student_id, subject_id))
            .or_insert_with(|| ProgressRecord::pending(student_id, subject_id));
        if !keep.contains(&record.status) {
            record.status = status;
        }
        Ok(record.clone())
    }
}
