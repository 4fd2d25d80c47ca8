#![allow(dead_code)]

use anyhow::Result;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use school_api_rust::database::MemoryState;
use school_api_rust::testing::{grade, TestContext};
use school_api_rust::types::ProgressStatus;

pub const TEACHER: i64 = 700;
pub const OTHER_TEACHER: i64 = 701;

/// A small school: one four-term course with two subjects in term 1
/// (Algebra, Physics), Calculus in term 2 requiring Algebra, and Drawing in
/// term 2 without prerequisites. Ada is in term 1 and enrolled in both
/// term-1 groups, ungraded.
pub struct Campus {
    pub ctx: TestContext,
    pub course: i64,
    pub algebra: i64,
    pub physics: i64,
    pub calculus: i64,
    pub drawing: i64,
    pub ada: i64,
    pub algebra_group: i64,
    pub physics_group: i64,
    pub calculus_group: i64,
    pub drawing_group: i64,
}

impl Campus {
    pub fn new() -> Self {
        Self::build(|_| {})
    }

    /// Build the campus and let the caller extend the seed before the store is created
    pub fn build(extend: impl FnOnce(&mut CampusSeed)) -> Self {
        let mut state = MemoryState::default();
        let course = state.add_course("Engineering", 4);
        let algebra = state.add_subject("Algebra", 8);
        let physics = state.add_subject("Physics", 6);
        let calculus = state.add_subject("Calculus", 8);
        let drawing = state.add_subject("Drawing", 4);
        state.add_curriculum_entry(course, algebra, 1);
        state.add_curriculum_entry(course, physics, 1);
        state.add_curriculum_entry(course, calculus, 2);
        state.add_curriculum_entry(course, drawing, 2);
        state.add_prerequisite(calculus, algebra);

        let ada = state.add_student(course, 1);
        let algebra_group = state.add_group(course, algebra, TEACHER, 1);
        let physics_group = state.add_group(course, physics, TEACHER, 1);
        let calculus_group = state.add_group(course, calculus, TEACHER, 2);
        let drawing_group = state.add_group(course, drawing, OTHER_TEACHER, 2);
        state.enroll(algebra_group, ada, None);
        state.enroll(physics_group, ada, None);
        state.set_progress(ada, algebra, ProgressStatus::InProgress, None);
        state.set_progress(ada, physics, ProgressStatus::InProgress, None);

        let mut seed = CampusSeed {
            state,
            course,
            algebra,
            physics,
            ada,
            algebra_group,
            physics_group,
        };
        extend(&mut seed);

        Self {
            ctx: TestContext::new(seed.state),
            course,
            algebra,
            physics,
            calculus,
            drawing,
            ada,
            algebra_group,
            physics_group,
            calculus_group,
            drawing_group,
        }
    }

    pub fn admin(&self) -> String {
        self.ctx.admin_token().expect("admin token")
    }

    pub fn teacher(&self) -> String {
        self.ctx.teacher_token(TEACHER).expect("teacher token")
    }

    pub fn student(&self, id: i64) -> String {
        self.ctx.student_token(id).expect("student token")
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Result<(StatusCode, Value)> {
        self.call(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        self.call(Method::POST, uri, token, body).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::PATCH, uri, token, Some(body)).await
    }

    /// Drive one request through a fresh router over the shared store
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.ctx.router().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok((status, json))
    }
}

/// Seed handle passed to [`Campus::build`]
pub struct CampusSeed {
    pub state: MemoryState,
    pub course: i64,
    pub algebra: i64,
    pub physics: i64,
    pub ada: i64,
    pub algebra_group: i64,
    pub physics_group: i64,
}

impl CampusSeed {
    /// Add a term-1 student enrolled, ungraded, in both term-1 groups
    pub fn add_enrolled_student(&mut self) -> i64 {
        let student = self.state.add_student(self.course, 1);
        self.state.enroll(self.algebra_group, student, None);
        self.state.enroll(self.physics_group, student, None);
        student
    }

    pub fn pass(&mut self, student: i64, subject: i64) {
        self.state
            .set_progress(student, subject, ProgressStatus::Passed, Some(grade("8")));
    }
}
