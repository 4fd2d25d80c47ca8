mod common;

use anyhow::Result;
use axum::http::StatusCode;
use rust_decimal::Decimal;

use common::Campus;
use school_api_rust::database::FailPoint;
use school_api_rust::testing::grade;
use school_api_rust::types::{GradeSource, ProgressStatus, SystemMode};

const END_QUARTER: &str = "/api/admin/system/end-quarter";

#[tokio::test]
async fn ungraded_cohort_is_failed_and_held_back() -> Result<()> {
    let mut others = Vec::new();
    let campus = Campus::build(|seed| {
        others.push(seed.add_enrolled_student());
        others.push(seed.add_enrolled_student());
    });
    let token = campus.admin();

    let (status, body) = campus.post(END_QUARTER, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["message"], "Quarter closed successfully");
    assert_eq!(body["data"]["quarterClosed"], true);
    assert_eq!(body["data"]["studentsAdvanced"], 0);
    assert_eq!(body["data"]["stragglersFinalized"], 6);

    let snapshot = campus.ctx.snapshot().await;
    for student in std::iter::once(campus.ada).chain(others) {
        assert_eq!(snapshot.students[&student].term, 1);
        for (group, subject) in [(campus.algebra_group, campus.algebra), (campus.physics_group, campus.physics)] {
            let enrollment = &snapshot.enrollments[&(group, student)];
            assert_eq!(enrollment.grade, Some(Decimal::ZERO));
            assert!(!enrollment.active);
            assert_eq!(snapshot.progress[&(student, subject)].status, ProgressStatus::Failed);
        }
    }
    assert!(snapshot
        .grade_audit
        .iter()
        .all(|entry| entry.source == GradeSource::TermClose));
    Ok(())
}

#[tokio::test]
async fn graded_students_advance_while_stragglers_stay() -> Result<()> {
    let mut bea = 0;
    let campus = Campus::build(|seed| {
        bea = seed.state.add_student(seed.course, 1);
        seed.state.enroll(seed.algebra_group, bea, Some(grade("9")));
        seed.state.enroll(seed.physics_group, bea, Some(grade("7")));
    });
    let token = campus.admin();

    let (status, body) = campus.post(END_QUARTER, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["studentsAdvanced"], 1);
    assert_eq!(body["data"]["stragglersFinalized"], 2);

    let snapshot = campus.ctx.snapshot().await;
    assert_eq!(snapshot.students[&bea].term, 2);
    assert_eq!(snapshot.progress[&(bea, campus.algebra)].status, ProgressStatus::Passed);
    assert_eq!(snapshot.progress[&(bea, campus.calculus)].status, ProgressStatus::Pending);
    assert_eq!(snapshot.students[&campus.ada].term, 1);
    Ok(())
}

#[tokio::test]
async fn term_close_runs_during_maintenance() -> Result<()> {
    let campus = Campus::build(|seed| seed.state.set_mode(SystemMode::Maintenance));
    let token = campus.admin();

    let (status, _) = campus.post(END_QUARTER, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn failure_midway_leaves_no_trace() -> Result<()> {
    let campus = Campus::new();
    let token = campus.admin();
    let before = campus.ctx.snapshot().await;
    campus.ctx.store.inject_failure(FailPoint::ListStudents);

    let (status, body) = campus.post(END_QUARTER, Some(&token), None).await?;
    assert!(status.is_server_error(), "unexpected status {}: {}", status, body);

    let after = campus.ctx.snapshot().await;
    assert_eq!(after.enrollments, before.enrollments);
    assert_eq!(after.progress, before.progress);
    assert!(after.grade_audit.is_empty());
    assert_eq!(after.students[&campus.ada].term, 1);

    campus.ctx.store.clear_failures();
    let (status, _) = campus.post(END_QUARTER, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn second_close_has_nothing_left_to_finalize() -> Result<()> {
    let campus = Campus::new();
    let token = campus.admin();

    campus.post(END_QUARTER, Some(&token), None).await?;
    let (status, body) = campus.post(END_QUARTER, Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stragglersFinalized"], 0);
    assert_eq!(body["data"]["studentsAdvanced"], 0);
    Ok(())
}
