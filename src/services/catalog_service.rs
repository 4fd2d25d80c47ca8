use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::database::models::{Course, CurriculumEntry, Enrollment, Group, NewGroup, ScheduleSlot, Student, Subject};
use crate::database::{AcademicStore, UnitOfWork};
use crate::progression::{self, ProgressionError, ProgressionResult};
use crate::services::finish;
use crate::types::Weekday;

/// Schedule slot as submitted by clients, times as `HH:MM`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSlotRequest {
    pub day: Weekday,
    pub starts_at: String,
    pub ends_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroupRequest {
    pub name: String,
    pub code: String,
    pub course_id: i64,
    pub subject_id: i64,
    pub teacher_id: i64,
    #[serde(default)]
    pub schedule: Vec<ScheduleSlotRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCourseRequest {
    pub name: String,
    pub duration_terms: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub credits: i32,
    /// Subjects the new one requires
    #[serde(default)]
    pub prerequisite_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudentRequest {
    pub course_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Defaults to 1
    #[serde(default)]
    pub term: Option<i32>,
}

/// Course, subject and student records, the curriculum plan, prerequisites,
/// groups and enrollment administration
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn AcademicStore>,
}

fn parse_time(field: &str, value: &str) -> ProgressionResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| ProgressionError::validation(field, format!("Invalid time '{}', expected HH:MM", value)))
}

/// Parse and check a schedule: every slot must end after it starts and no two
/// slots may overlap on the same day.
pub fn validate_schedule(slots: &[ScheduleSlotRequest]) -> ProgressionResult<Vec<ScheduleSlot>> {
    let mut parsed: Vec<ScheduleSlot> = Vec::with_capacity(slots.len());

    for slot in slots {
        let starts_at = parse_time("startsAt", &slot.starts_at)?;
        let ends_at = parse_time("endsAt", &slot.ends_at)?;
        if ends_at <= starts_at {
            return Err(ProgressionError::validation("endsAt", "Slot must end after it starts"));
        }

        let candidate = ScheduleSlot {
            day: slot.day,
            starts_at,
            ends_at,
        };
        if let Some(clash) = parsed.iter().find(|existing| existing.overlaps(&candidate)) {
            return Err(ProgressionError::Conflict(format!(
                "Slot {:?} {}-{} overlaps {}-{}",
                candidate.day, candidate.starts_at, candidate.ends_at, clash.starts_at, clash.ends_at
            )));
        }
        parsed.push(candidate);
    }

    parsed.sort_by_key(|slot| (slot.day, slot.starts_at));
    Ok(parsed)
}

/// True when `from` can already reach `to` through prerequisite edges
fn reaches(edges: &[(i64, i64)], from: i64, to: i64) -> bool {
    let mut adjacency: HashMap<i64, Vec<i64>> = HashMap::new();
    for (subject, required) in edges {
        adjacency.entry(*subject).or_default().push(*required);
    }

    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(node) = stack.pop() {
        if node == to {
            return true;
        }
        if !seen.insert(node) {
            continue;
        }
        if let Some(next) = adjacency.get(&node) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

impl CatalogService {
    pub fn new(store: Arc<dyn AcademicStore>) -> Self {
        Self { store }
    }

    pub async fn create_course(&self, request: NewCourseRequest) -> ProgressionResult<Course> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ProgressionError::validation("name", "Name is required"));
        }
        if request.duration_terms < 1 {
            return Err(ProgressionError::validation("durationTerms", "A course lasts at least one term"));
        }

        let mut uow = self.store.begin().await?;
        let result = uow.insert_course(name, request.duration_terms).await.map_err(Into::into);
        let course = finish(uow, result).await?;
        info!(course_id = course.id, duration_terms = course.duration_terms, "Created course");
        Ok(course)
    }

    /// Create a subject together with the subjects it requires. A new subject
    /// has no dependents yet, so its edges cannot close a cycle.
    pub async fn create_subject(&self, request: NewSubjectRequest) -> ProgressionResult<Subject> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ProgressionError::validation("name", "Name is required"));
        }
        if request.credits < 1 {
            return Err(ProgressionError::validation("credits", "Credits must be positive"));
        }
        let mut required = request.prerequisite_ids.clone();
        required.sort_unstable();
        required.dedup();

        let mut uow = self.store.begin().await?;
        let result = async {
            for id in &required {
                uow.find_subject(*id)
                    .await?
                    .ok_or_else(|| ProgressionError::not_found("Subject", *id))?;
            }
            let description = request.description.as_deref().map(str::trim).filter(|d| !d.is_empty());
            let subject = uow.insert_subject(name, description, request.credits).await?;
            for id in &required {
                uow.insert_prerequisite(subject.id, *id).await?;
            }
            Ok(subject)
        }
        .await;
        let subject = finish(uow, result).await?;
        info!(subject_id = subject.id, prerequisites = required.len(), "Created subject");
        Ok(subject)
    }

    /// Register a student in a course. The ledger gets a PENDING record for
    /// every subject planned in the starting term.
    pub async fn create_student(&self, request: NewStudentRequest) -> ProgressionResult<Student> {
        let mut uow = self.store.begin().await?;
        let result = Self::create_student_in(uow.as_mut(), request).await;
        let student = finish(uow, result).await?;
        info!(student_id = student.id, course_id = student.course_id, term = student.term, "Created student");
        Ok(student)
    }

    async fn create_student_in(uow: &mut dyn UnitOfWork, request: NewStudentRequest) -> ProgressionResult<Student> {
        let course = uow
            .find_course(request.course_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Course", request.course_id))?;

        let term = request.term.unwrap_or(1);
        if term < 1 || term > course.duration_terms {
            return Err(ProgressionError::validation(
                "term",
                format!("Term must be between 1 and {}", course.duration_terms),
            ));
        }

        let student = uow.insert_student(course.id, request.user_id, term).await?;
        progression::initialize_term_records(uow, student.id, course.id, term).await?;
        Ok(student)
    }

    /// Place a subject in a term of a course's plan
    pub async fn add_curriculum_entry(&self, course_id: i64, subject_id: i64, term: i32) -> ProgressionResult<CurriculumEntry> {
        let mut uow = self.store.begin().await?;
        let result = Self::add_curriculum_entry_in(uow.as_mut(), course_id, subject_id, term).await;
        let entry = finish(uow, result).await?;
        info!(course_id, subject_id, term, "Added curriculum entry");
        Ok(entry)
    }

    async fn add_curriculum_entry_in(
        uow: &mut dyn UnitOfWork,
        course_id: i64,
        subject_id: i64,
        term: i32,
    ) -> ProgressionResult<CurriculumEntry> {
        let course = uow
            .find_course(course_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Course", course_id))?;
        uow.find_subject(subject_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Subject", subject_id))?;

        if term < 1 || term > course.duration_terms {
            return Err(ProgressionError::validation(
                "term",
                format!("Term must be between 1 and {}", course.duration_terms),
            ));
        }
        if uow.find_curriculum_entry(course_id, subject_id).await?.is_some() {
            return Err(ProgressionError::Conflict(format!(
                "Subject {} is already planned for course {}",
                subject_id, course_id
            )));
        }

        Ok(uow.insert_curriculum_entry(course_id, subject_id, term).await?)
    }

    /// Require `required_subject_id` before `subject_id`. Edges that would
    /// close a cycle are rejected.
    pub async fn add_prerequisite(&self, subject_id: i64, required_subject_id: i64) -> ProgressionResult<()> {
        let mut uow = self.store.begin().await?;
        let result = Self::add_prerequisite_in(uow.as_mut(), subject_id, required_subject_id).await;
        finish(uow, result).await?;
        info!(subject_id, required_subject_id, "Added prerequisite");
        Ok(())
    }

    async fn add_prerequisite_in(uow: &mut dyn UnitOfWork, subject_id: i64, required_subject_id: i64) -> ProgressionResult<()> {
        if subject_id == required_subject_id {
            return Err(ProgressionError::validation("requiredSubjectId", "A subject cannot require itself"));
        }
        for id in [subject_id, required_subject_id] {
            uow.find_subject(id)
                .await?
                .ok_or_else(|| ProgressionError::not_found("Subject", id))?;
        }

        uow.lock_prerequisites().await?;
        let edges = uow.prerequisite_edges().await?;
        if edges.contains(&(subject_id, required_subject_id)) {
            return Err(ProgressionError::Conflict(format!(
                "Subject {} already requires {}",
                subject_id, required_subject_id
            )));
        }
        if reaches(&edges, required_subject_id, subject_id) {
            return Err(ProgressionError::validation(
                "requiredSubjectId",
                format!("Requiring {} from {} would create a cycle", required_subject_id, subject_id),
            ));
        }

        uow.insert_prerequisite(subject_id, required_subject_id).await?;
        Ok(())
    }

    /// Open a group for a planned subject. The group's term is the term the
    /// subject occupies in the course plan.
    pub async fn create_group(&self, request: NewGroupRequest) -> ProgressionResult<Group> {
        if request.name.trim().is_empty() {
            return Err(ProgressionError::validation("name", "Name is required"));
        }
        if request.code.trim().is_empty() {
            return Err(ProgressionError::validation("code", "Code is required"));
        }
        let schedule = validate_schedule(&request.schedule)?;

        let mut uow = self.store.begin().await?;
        let result = Self::create_group_in(uow.as_mut(), request, schedule).await;
        let group = finish(uow, result).await?;
        info!(group_id = group.id, code = %group.code, term = group.term, "Created group");
        Ok(group)
    }

    async fn create_group_in(
        uow: &mut dyn UnitOfWork,
        request: NewGroupRequest,
        schedule: Vec<ScheduleSlot>,
    ) -> ProgressionResult<Group> {
        let entry = uow
            .find_curriculum_entry(request.course_id, request.subject_id)
            .await?
            .ok_or_else(|| {
                ProgressionError::NotFound(format!(
                    "Curriculum entry for course {} subject {}",
                    request.course_id, request.subject_id
                ))
            })?;

        let group = uow
            .insert_group(NewGroup {
                name: request.name.trim().to_string(),
                code: request.code.trim().to_string(),
                course_id: request.course_id,
                subject_id: request.subject_id,
                teacher_id: request.teacher_id,
                term: entry.term,
                schedule,
            })
            .await
            .map_err(|err| {
                if err.is_unique_violation() {
                    ProgressionError::Conflict(format!("Group code '{}' is taken", request.code))
                } else {
                    err.into()
                }
            })?;
        Ok(group)
    }

    /// Enroll a student in a group. The student must belong to the group's
    /// course and meet the subject's prerequisites.
    pub async fn enroll_student(&self, group_id: i64, student_id: i64) -> ProgressionResult<Enrollment> {
        let mut uow = self.store.begin().await?;
        let result = Self::enroll_student_in(uow.as_mut(), group_id, student_id).await;
        let enrollment = finish(uow, result).await?;
        info!(group_id, student_id, "Enrolled student");
        Ok(enrollment)
    }

    async fn enroll_student_in(uow: &mut dyn UnitOfWork, group_id: i64, student_id: i64) -> ProgressionResult<Enrollment> {
        let group = uow
            .find_group(group_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Group", group_id))?;
        let student = uow
            .find_student(student_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Student", student_id))?;

        if student.course_id != group.course_id {
            return Err(ProgressionError::validation(
                "studentId",
                format!("Student {} is not in course {}", student_id, group.course_id),
            ));
        }
        if uow.find_enrollment(group_id, student_id).await?.is_some() {
            return Err(ProgressionError::Conflict(format!(
                "Student {} is already enrolled in group {}",
                student_id, group_id
            )));
        }

        let report = progression::check_eligibility(uow, student_id, group.subject_id).await?;
        if !report.eligible {
            return Err(ProgressionError::Forbidden(format!(
                "Prerequisites not met: {:?}",
                report.missing_prerequisites
            )));
        }

        let enrollment = uow.insert_enrollment(group_id, student_id).await?;
        progression::mark_in_progress(uow, student_id, group.subject_id).await?;
        Ok(enrollment)
    }

    /// Flip the student's payment flag
    pub async fn toggle_payment(&self, student_id: i64) -> ProgressionResult<Student> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let student = uow
                .find_student(student_id)
                .await?
                .ok_or_else(|| ProgressionError::not_found("Student", student_id))?;
            uow.set_payment_status(student_id, !student.paid)
                .await?
                .ok_or_else(|| ProgressionError::not_found("Student", student_id))
        }
        .await;
        let student = finish(uow, result).await?;
        info!(student_id, paid = student.paid, "Toggled payment status");
        Ok(student)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryState, MemoryStore};
    use crate::testing::grade;
    use crate::types::ProgressStatus;

    fn slot(day: Weekday, starts_at: &str, ends_at: &str) -> ScheduleSlotRequest {
        ScheduleSlotRequest {
            day,
            starts_at: starts_at.to_string(),
            ends_at: ends_at.to_string(),
        }
    }

    fn service(state: MemoryState) -> (MemoryStore, CatalogService) {
        let store = MemoryStore::with_state(state);
        let service = CatalogService::new(Arc::new(store.clone()));
        (store, service)
    }

    #[test]
    fn schedule_rejects_inverted_and_overlapping_slots() {
        assert!(validate_schedule(&[slot(Weekday::Monday, "10:00", "09:00")]).is_err());
        assert!(validate_schedule(&[slot(Weekday::Monday, "10:00", "10:00")]).is_err());
        assert!(validate_schedule(&[slot(Weekday::Monday, "9am", "10:00")]).is_err());

        let overlap = validate_schedule(&[
            slot(Weekday::Monday, "08:00", "10:00"),
            slot(Weekday::Monday, "09:30", "11:00"),
        ]);
        assert!(matches!(overlap, Err(ProgressionError::Conflict(_))));
    }

    #[test]
    fn schedule_allows_back_to_back_and_other_days() {
        let parsed = validate_schedule(&[
            slot(Weekday::Wednesday, "08:00", "10:00"),
            slot(Weekday::Monday, "10:00", "12:00"),
            slot(Weekday::Monday, "08:00", "10:00"),
        ])
        .unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].day, Weekday::Monday);
        assert_eq!(parsed[0].starts_at, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
    }

    #[test]
    fn cycle_detection_follows_transitive_edges() {
        let edges = vec![(3, 2), (2, 1)];
        assert!(reaches(&edges, 3, 1));
        assert!(!reaches(&edges, 1, 3));
    }

    #[tokio::test]
    async fn prerequisite_cycle_is_rejected() {
        let mut state = MemoryState::default();
        let a = state.add_subject("A", 4);
        let b = state.add_subject("B", 4);
        let c = state.add_subject("C", 4);
        let (store, service) = service(state);

        service.add_prerequisite(b, a).await.unwrap();
        service.add_prerequisite(c, b).await.unwrap();
        let err = service.add_prerequisite(a, c).await.unwrap_err();
        assert!(matches!(err, ProgressionError::Validation { .. }));
        assert!(matches!(service.add_prerequisite(b, a).await, Err(ProgressionError::Conflict(_))));
        assert!(matches!(service.add_prerequisite(a, a).await, Err(ProgressionError::Validation { .. })));

        assert_eq!(store.snapshot().await.prerequisites.len(), 2);
    }

    #[tokio::test]
    async fn opposite_edges_racing_leave_one_winner() {
        let mut state = MemoryState::default();
        let a = state.add_subject("A", 4);
        let b = state.add_subject("B", 4);
        let (store, service) = service(state);
        let other = service.clone();

        let (first, second) = tokio::join!(
            tokio::spawn(async move { service.add_prerequisite(a, b).await }),
            tokio::spawn(async move { other.add_prerequisite(b, a).await }),
        );
        let outcomes = [first.unwrap(), second.unwrap()];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(ProgressionError::Validation { .. }))));
        assert_eq!(store.snapshot().await.prerequisites.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_curriculum_entry_conflicts() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        let (_, service) = service(state);

        service.add_curriculum_entry(course, algebra, 1).await.unwrap();
        let err = service.add_curriculum_entry(course, algebra, 2).await.unwrap_err();
        assert!(matches!(err, ProgressionError::Conflict(_)));
    }

    #[tokio::test]
    async fn curriculum_term_must_fit_course_duration() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        let (_, service) = service(state);

        assert!(matches!(
            service.add_curriculum_entry(course, algebra, 5).await,
            Err(ProgressionError::Validation { .. })
        ));
        assert!(matches!(
            service.add_curriculum_entry(course, algebra, 0).await,
            Err(ProgressionError::Validation { .. })
        ));
        assert!(matches!(
            service.add_curriculum_entry(course + 100, algebra, 1).await,
            Err(ProgressionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn group_takes_term_from_plan() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        state.add_curriculum_entry(course, algebra, 3);
        let (_, service) = service(state);

        let group = service
            .create_group(NewGroupRequest {
                name: "Algebra A".to_string(),
                code: "ALG-A".to_string(),
                course_id: course,
                subject_id: algebra,
                teacher_id: 70,
                schedule: vec![slot(Weekday::Tuesday, "08:00", "10:00")],
            })
            .await
            .unwrap();
        assert_eq!(group.term, 3);
        assert_eq!(group.schedule.len(), 1);
    }

    #[tokio::test]
    async fn enrollment_checks_prerequisites_and_marks_in_progress() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        let calculus = state.add_subject("Calculus", 8);
        state.add_prerequisite(calculus, algebra);
        let student = state.add_student(course, 1);
        let group = state.add_group(course, calculus, 70, 2);
        let (store, service) = service(state);

        let err = service.enroll_student(group, student).await.unwrap_err();
        assert!(matches!(err, ProgressionError::Forbidden(_)));

        let mut state = store.snapshot().await;
        state.set_progress(student, algebra, ProgressStatus::Passed, Some(grade("6")));
        let (store, service) = self::service(state);

        service.enroll_student(group, student).await.unwrap();
        let state = store.snapshot().await;
        assert!(state.enrollments[&(group, student)].active);
        assert_eq!(state.progress[&(student, calculus)].status, ProgressStatus::InProgress);

        assert!(matches!(
            service.enroll_student(group, student).await,
            Err(ProgressionError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn course_needs_name_and_duration() {
        let (store, service) = service(MemoryState::default());

        let course = service
            .create_course(NewCourseRequest { name: " Medicine ".to_string(), duration_terms: 10 })
            .await
            .unwrap();
        assert_eq!(course.name, "Medicine");
        assert!(matches!(
            service.create_course(NewCourseRequest { name: "Law".to_string(), duration_terms: 0 }).await,
            Err(ProgressionError::Validation { .. })
        ));
        assert!(matches!(
            service.create_course(NewCourseRequest { name: "  ".to_string(), duration_terms: 4 }).await,
            Err(ProgressionError::Validation { .. })
        ));
        assert_eq!(store.snapshot().await.courses.len(), 1);
    }

    #[tokio::test]
    async fn subject_is_created_with_its_prerequisites() {
        let mut state = MemoryState::default();
        let algebra = state.add_subject("Algebra", 8);
        let (store, service) = service(state);

        let calculus = service
            .create_subject(NewSubjectRequest {
                name: "Calculus".to_string(),
                description: Some("Limits and derivatives".to_string()),
                credits: 8,
                prerequisite_ids: vec![algebra, algebra],
            })
            .await
            .unwrap();
        assert_eq!(calculus.description.as_deref(), Some("Limits and derivatives"));

        let state = store.snapshot().await;
        assert_eq!(state.subjects[&calculus.id], calculus);
        assert!(state.prerequisites.contains(&(calculus.id, algebra)));
        assert_eq!(state.prerequisites.len(), 1);
    }

    #[tokio::test]
    async fn subject_with_unknown_prerequisite_is_not_created() {
        let (store, service) = service(MemoryState::default());

        let err = service
            .create_subject(NewSubjectRequest {
                name: "Calculus".to_string(),
                description: None,
                credits: 8,
                prerequisite_ids: vec![404],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressionError::NotFound(_)));
        assert!(store.snapshot().await.subjects.is_empty());

        assert!(matches!(
            service
                .create_subject(NewSubjectRequest {
                    name: "Calculus".to_string(),
                    description: None,
                    credits: 0,
                    prerequisite_ids: vec![],
                })
                .await,
            Err(ProgressionError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn new_student_gets_pending_records_for_starting_term() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        let physics = state.add_subject("Physics", 6);
        let calculus = state.add_subject("Calculus", 8);
        state.add_curriculum_entry(course, algebra, 1);
        state.add_curriculum_entry(course, physics, 1);
        state.add_curriculum_entry(course, calculus, 2);
        let (store, service) = service(state);

        let student = service
            .create_student(NewStudentRequest { course_id: course, user_id: Some(12), term: None })
            .await
            .unwrap();
        assert_eq!(student.term, 1);
        assert!(!student.paid);
        assert_eq!(student.user_id, Some(12));

        let state = store.snapshot().await;
        assert_eq!(state.progress[&(student.id, algebra)].status, ProgressStatus::Pending);
        assert_eq!(state.progress[&(student.id, physics)].status, ProgressStatus::Pending);
        assert!(!state.progress.contains_key(&(student.id, calculus)));
    }

    #[tokio::test]
    async fn student_needs_existing_course_and_valid_term() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let (store, service) = service(state);

        assert!(matches!(
            service
                .create_student(NewStudentRequest { course_id: course + 1, user_id: None, term: None })
                .await,
            Err(ProgressionError::NotFound(_))
        ));
        assert!(matches!(
            service
                .create_student(NewStudentRequest { course_id: course, user_id: None, term: Some(5) })
                .await,
            Err(ProgressionError::Validation { .. })
        ));
        assert!(store.snapshot().await.students.is_empty());
    }

    #[tokio::test]
    async fn toggle_payment_flips_flag() {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let student = state.add_student(course, 1);
        let (_, service) = service(state);

        assert!(service.toggle_payment(student).await.unwrap().paid);
        assert!(!service.toggle_payment(student).await.unwrap().paid);
        assert!(matches!(
            service.toggle_payment(student + 1).await,
            Err(ProgressionError::NotFound(_))
        ));
    }
}
