use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::directory::{NewCompanyVisit, PendingRegistration, RegisterOutcome};
use crate::error::{AppError, AppResult};
use crate::models::{College, CompanyVisit, Directory, Student};
use crate::state::AppState;

/// Registers a student against the college matching their email domain. When
/// no such college exists yet, responds with `new_college_needed` and leaves
/// the directory untouched.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<PendingRegistration>,
) -> AppResult<Json<RegisterOutcome>> {
    let outcome = state.directory.register(&payload).await?;
    match &outcome {
        RegisterOutcome::LoggedIn { student } | RegisterOutcome::Registered { student } => {
            state.sessions.save(student)?;
        }
        RegisterOutcome::NewCollegeNeeded { .. } => {}
    }
    Ok(Json(outcome))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCollegeRequest {
    pub college_name: String,
    #[serde(flatten)]
    pub registration: PendingRegistration,
}

/// Completes the new-college handshake: creates the college and its first
/// student in one transition.
pub async fn create_college(
    State(state): State<AppState>,
    Json(payload): Json<CreateCollegeRequest>,
) -> AppResult<(StatusCode, Json<Student>)> {
    let student = state
        .directory
        .create_college(&payload.college_name, &payload.registration)
        .await?;
    state.sessions.save(&student)?;
    Ok((StatusCode::CREATED, Json(student)))
}

pub async fn list_colleges(State(state): State<AppState>) -> Json<Directory> {
    Json(state.directory.snapshot().await)
}

pub async fn get_college(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<Json<College>> {
    let directory = state.directory.snapshot().await;
    let college = directory.get(&key).cloned().ok_or_else(AppError::not_found)?;
    Ok(Json(college))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCompanyRequest {
    pub student_id: i64,
    #[serde(flatten)]
    pub company: NewCompanyVisit,
}

pub async fn add_company(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<AddCompanyRequest>,
) -> AppResult<(StatusCode, Json<CompanyVisit>)> {
    let visit = state
        .directory
        .add_company_visit(&key, payload.student_id, payload.company)
        .await?;
    Ok((StatusCode::CREATED, Json(visit)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleSelectionRequest {
    pub student_id: i64,
    pub company_name: String,
}

/// Flips the student's membership for the named company. A company that does
/// not exist yields `"student": null` rather than an error.
pub async fn toggle_selection(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(payload): Json<ToggleSelectionRequest>,
) -> AppResult<Json<Value>> {
    let student = state
        .directory
        .toggle_selection(&key, payload.student_id, &payload.company_name)
        .await?;
    if let Some(student) = &student {
        // Keep the saved session in step with the student it belongs to.
        if state
            .sessions
            .load()?
            .is_some_and(|saved| saved.id == student.id)
        {
            state.sessions.save(student)?;
        }
    }
    Ok(Json(json!({ "student": student })))
}
