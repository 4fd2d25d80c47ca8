mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::{Campus, OTHER_TEACHER};

#[tokio::test]
async fn teacher_lists_own_groups_with_roster() -> Result<()> {
    let mut bea = 0;
    let campus = Campus::build(|seed| bea = seed.add_enrolled_student());
    let token = campus.teacher();

    let (status, body) = campus.get("/api/teachers/groups", Some(&token)).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let groups = body["data"].as_array().cloned().unwrap_or_default();
    let ids: Vec<i64> = groups.iter().filter_map(|g| g["id"].as_i64()).collect();
    assert_eq!(ids, vec![campus.algebra_group, campus.physics_group, campus.calculus_group]);

    assert_eq!(groups[0]["courseName"], "Engineering");
    assert_eq!(groups[0]["subjectName"], "Algebra");
    let roster: Vec<i64> = groups[0]["roster"]
        .as_array()
        .map(|r| r.iter().filter_map(|e| e["studentId"].as_i64()).collect())
        .unwrap_or_default();
    assert_eq!(roster, vec![campus.ada, bea]);
    assert_eq!(groups[0]["roster"][0]["status"], "IN_PROGRESS");
    assert_eq!(groups[2]["roster"], serde_json::json!([]));
    Ok(())
}

#[tokio::test]
async fn group_detail_is_limited_to_its_teacher() -> Result<()> {
    let campus = Campus::new();

    let token = campus.teacher();
    let (status, body) = campus
        .get(&format!("/api/teachers/groups/{}", campus.physics_group), Some(&token))
        .await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["subjectId"], campus.physics);
    assert_eq!(body["data"]["roster"][0]["studentId"], campus.ada);

    let (status, _) = campus
        .get(&format!("/api/teachers/groups/{}", campus.drawing_group), Some(&token))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let other = campus.ctx.teacher_token(OTHER_TEACHER)?;
    let (status, body) = campus
        .get(&format!("/api/teachers/groups/{}", campus.drawing_group), Some(&other))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["roster"], serde_json::json!([]));

    let (status, _) = campus.get("/api/teachers/groups/9999", Some(&token)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn students_cannot_read_teacher_groups() -> Result<()> {
    let campus = Campus::new();
    let token = campus.student(campus.ada);

    let (status, _) = campus.get("/api/teachers/groups", Some(&token)).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
