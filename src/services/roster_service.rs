use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::database::models::{Course, Enrollment, Group, ScheduleSlot, Subject};
use crate::database::{AcademicStore, UnitOfWork};
use crate::progression::{ProgressionError, ProgressionResult};
use crate::services::{finish, owned_group};
use crate::types::ProgressStatus;

/// A group the student currently sits in
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentEnrollment {
    pub group_id: i64,
    pub group_name: String,
    pub group_code: String,
    pub subject_id: i64,
    pub subject_name: String,
    pub description: Option<String>,
    pub credits: i32,
    pub teacher_id: i64,
    pub term: i32,
    pub schedule: Vec<ScheduleSlot>,
}

/// One enrollment of the student with the grade it carries, if any
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntry {
    pub group_id: i64,
    pub subject_id: i64,
    pub subject_name: String,
    pub teacher_id: i64,
    pub grade: Option<Decimal>,
    pub active: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: i64,
    pub grade: Option<Decimal>,
    pub active: bool,
    /// Ledger status of the group's subject for this student
    pub status: Option<ProgressStatus>,
}

/// A teacher's group with its course, subject and roster
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherGroup {
    #[serde(flatten)]
    pub group: Group,
    pub course_name: String,
    pub subject_name: String,
    pub roster: Vec<RosterEntry>,
}

/// Read-only views over groups and enrollments for students and teachers
#[derive(Clone)]
pub struct RosterService {
    store: Arc<dyn AcademicStore>,
}

/// Per-call lookup cache for the names a view needs
#[derive(Default)]
struct Names {
    subjects: HashMap<i64, Subject>,
    courses: HashMap<i64, Course>,
}

impl Names {
    async fn subject(&mut self, uow: &mut dyn UnitOfWork, subject_id: i64) -> ProgressionResult<Subject> {
        if let Some(subject) = self.subjects.get(&subject_id) {
            return Ok(subject.clone());
        }
        let subject = uow
            .find_subject(subject_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Subject", subject_id))?;
        self.subjects.insert(subject_id, subject.clone());
        Ok(subject)
    }

    async fn course_name(&mut self, uow: &mut dyn UnitOfWork, course_id: i64) -> ProgressionResult<String> {
        if let Some(course) = self.courses.get(&course_id) {
            return Ok(course.name.clone());
        }
        let course = uow
            .find_course(course_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Course", course_id))?;
        let name = course.name.clone();
        self.courses.insert(course_id, course);
        Ok(name)
    }
}

async fn enrolled_groups(uow: &mut dyn UnitOfWork, student_id: i64) -> ProgressionResult<Vec<(Enrollment, Group)>> {
    uow.find_student(student_id)
        .await?
        .ok_or_else(|| ProgressionError::not_found("Student", student_id))?;

    let mut rows = Vec::new();
    for enrollment in uow.enrollments_for_student(student_id).await? {
        let group = uow
            .find_group(enrollment.group_id)
            .await?
            .ok_or_else(|| ProgressionError::not_found("Group", enrollment.group_id))?;
        rows.push((enrollment, group));
    }
    Ok(rows)
}

async fn describe_group(uow: &mut dyn UnitOfWork, names: &mut Names, group: Group) -> ProgressionResult<TeacherGroup> {
    let subject = names.subject(uow, group.subject_id).await?;
    let course_name = names.course_name(uow, group.course_id).await?;

    let mut roster = Vec::new();
    for enrollment in uow.enrollments_for_group(group.id).await? {
        let status = uow
            .find_progress(enrollment.student_id, group.subject_id)
            .await?
            .map(|record| record.status);
        roster.push(RosterEntry {
            student_id: enrollment.student_id,
            grade: enrollment.grade,
            active: enrollment.active,
            status,
        });
    }

    Ok(TeacherGroup {
        group,
        course_name,
        subject_name: subject.name,
        roster,
    })
}

impl RosterService {
    pub fn new(store: Arc<dyn AcademicStore>) -> Self {
        Self { store }
    }

    /// Active enrollments of a student with each group's subject and schedule
    pub async fn current_enrollments(&self, student_id: i64) -> ProgressionResult<Vec<CurrentEnrollment>> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let mut names = Names::default();
            let mut current = Vec::new();
            for (enrollment, group) in enrolled_groups(uow.as_mut(), student_id).await? {
                if !enrollment.active {
                    continue;
                }
                let subject = names.subject(uow.as_mut(), group.subject_id).await?;
                current.push(CurrentEnrollment {
                    group_id: group.id,
                    group_name: group.name,
                    group_code: group.code,
                    subject_id: subject.id,
                    subject_name: subject.name,
                    description: subject.description,
                    credits: subject.credits,
                    teacher_id: group.teacher_id,
                    term: group.term,
                    schedule: group.schedule,
                });
            }
            Ok(current)
        }
        .await;
        finish(uow, result).await
    }

    /// Every enrollment of a student, graded or not
    pub async fn grades(&self, student_id: i64) -> ProgressionResult<Vec<GradeEntry>> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let mut names = Names::default();
            let mut grades = Vec::new();
            for (enrollment, group) in enrolled_groups(uow.as_mut(), student_id).await? {
                let subject = names.subject(uow.as_mut(), group.subject_id).await?;
                grades.push(GradeEntry {
                    group_id: group.id,
                    subject_id: subject.id,
                    subject_name: subject.name,
                    teacher_id: group.teacher_id,
                    grade: enrollment.grade,
                    active: enrollment.active,
                    completed_at: enrollment.completed_at,
                });
            }
            Ok(grades)
        }
        .await;
        finish(uow, result).await
    }

    pub async fn teacher_groups(&self, teacher_id: i64) -> ProgressionResult<Vec<TeacherGroup>> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let mut names = Names::default();
            let mut groups = Vec::new();
            for group in uow.groups_for_teacher(teacher_id).await? {
                groups.push(describe_group(uow.as_mut(), &mut names, group).await?);
            }
            Ok(groups)
        }
        .await;
        finish(uow, result).await
    }

    /// One of the teacher's groups. Another teacher's group is forbidden.
    pub async fn teacher_group(&self, teacher_id: i64, group_id: i64) -> ProgressionResult<TeacherGroup> {
        let mut uow = self.store.begin().await?;
        let result = async {
            let group = owned_group(uow.as_mut(), teacher_id, group_id).await?;
            describe_group(uow.as_mut(), &mut Names::default(), group).await
        }
        .await;
        finish(uow, result).await
    }
}
