mod common;

use anyhow::Result;
use axum::http::StatusCode;
use common::{body_to_vec, TestApp};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct StudentInfo {
    id: i64,
    name: String,
    email: String,
    #[serde(rename = "collegeDomain")]
    college_domain: String,
}

fn registration(email: &str, name: &str) -> Value {
    json!({
        "email": email,
        "name": name,
        "linkedin": "linkedin.com/in/test-student",
    })
}

#[tokio::test]
async fn first_registration_asks_for_a_college_name() -> Result<()> {
    let app = TestApp::new().await?;

    let response = app
        .post_json("/api/register", &registration("priya@nitk.edu.in", "Priya"))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(body["status"], "new_college_needed");
    assert_eq!(body["domain"], "nitk.edu.in");

    // Nothing was created and no session was saved.
    let colleges = app.get("/api/colleges").await?;
    let body: Value = serde_json::from_slice(&body_to_vec(colleges.into_body()).await?)?;
    assert_eq!(body, json!({}));
    assert!(!app.session_path().exists());
    Ok(())
}

#[tokio::test]
async fn college_creation_registers_the_founding_student() -> Result<()> {
    let app = TestApp::new().await?;

    let response = app
        .post_json(
            "/api/colleges",
            &json!({
                "collegeName": "NITK Surathkal",
                "email": "priya@nitk.edu.in",
                "name": "Priya",
                "linkedin": "linkedin.com/in/priya",
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let student: StudentInfo = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(student.name, "Priya");
    assert_eq!(student.college_domain, "nitk.edu.in");

    // Key is the domain with dots replaced, and the write reached the store.
    let remote = app.remote_data().expect("store should hold the college");
    assert_eq!(remote["nitk_edu_in"].name, "NITK Surathkal");
    assert_eq!(remote["nitk_edu_in"].students.len(), 1);

    // A second registration with the same email is a login, not a duplicate.
    let response = app
        .post_json("/api/register", &registration("priya@nitk.edu.in", "Priya"))
        .await?;
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(body["status"], "logged_in");
    assert_eq!(body["student"]["id"], student.id);
    Ok(())
}

#[tokio::test]
async fn registration_joins_an_existing_college() -> Result<()> {
    let app = TestApp::new().await?;
    app.post_json(
        "/api/colleges",
        &json!({
            "collegeName": "NITK Surathkal",
            "email": "priya@nitk.edu.in",
            "name": "Priya",
            "linkedin": "linkedin.com/in/priya",
        }),
    )
    .await?;

    let response = app
        .post_json("/api/register", &registration("arjun@nitk.edu.in", "Arjun"))
        .await?;
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(body["status"], "registered");
    assert_eq!(body["student"]["name"], "Arjun");

    let college = app.get("/api/colleges/nitk_edu_in").await?;
    let body: Value = serde_json::from_slice(&body_to_vec(college.into_body()).await?)?;
    assert_eq!(body["students"].as_array().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn malformed_registrations_are_rejected() -> Result<()> {
    let app = TestApp::new().await?;

    let response = app
        .post_json("/api/register", &registration("not-an-email", "Priya"))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(body["error"].as_str().unwrap().contains("valid email"));

    let response = app
        .post_json(
            "/api/register",
            &json!({
                "email": "priya@nitk.edu.in",
                "name": "Priya",
                "linkedin": "twitter.com/priya",
            }),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .post_json("/api/register", &registration("priya@nitk.edu.in", "  "))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn session_survives_registration_and_clears_on_logout() -> Result<()> {
    let app = TestApp::new().await?;
    app.post_json(
        "/api/colleges",
        &json!({
            "collegeName": "NITK Surathkal",
            "email": "priya@nitk.edu.in",
            "name": "Priya",
            "linkedin": "linkedin.com/in/priya",
        }),
    )
    .await?;

    let response = app.get("/api/session").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(body["student"]["email"], "priya@nitk.edu.in");

    let response = app.delete("/api/session").await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.get("/api/session").await?;
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert!(body["student"].is_null());
    Ok(())
}

#[tokio::test]
async fn health_reports_stats_and_degraded_flag() -> Result<()> {
    let app = TestApp::new().await?;
    app.post_json(
        "/api/colleges",
        &json!({
            "collegeName": "NITK Surathkal",
            "email": "priya@nitk.edu.in",
            "name": "Priya",
            "linkedin": "linkedin.com/in/priya",
        }),
    )
    .await?;

    let response = app.get("/api/health").await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&body_to_vec(response.into_body()).await?)?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["degraded"], false);
    assert_eq!(body["stats"]["colleges"], 1);
    assert_eq!(body["stats"]["students"], 1);
    Ok(())
}
