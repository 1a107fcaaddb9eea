use std::str::FromStr;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::warn;

use redress_db::complaints::NewComplaint;
use redress_db::models::{CommentRow, ComplaintRow, StatusHistoryRow};
use redress_db::time;
use redress_types::api::{
    AssignRequest, ChangeStatusRequest, Claims, CommentRequest, CommentResponse,
    ComplaintRequest, ComplaintResponse, StatusHistoryResponse,
};
use redress_types::models::{ComplaintStatus, ComplaintType, Role};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::middleware::require_role;

const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 2000;

/// Optional filters for the complaint listing. At most one filter applies;
/// when several are present the most specific one wins in the order below.
#[derive(Debug, Default, Deserialize)]
pub struct ComplaintFilter {
    pub status: Option<ComplaintStatus>,
    #[serde(rename = "type")]
    pub complaint_type: Option<ComplaintType>,
    pub department_id: Option<i64>,
    pub created_by: Option<i64>,
    pub assigned_to: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentFilter {
    pub include_internal: Option<bool>,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ComplaintRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Student])?;
    validate_complaint(&req)?;

    let row = tokio::task::spawn_blocking(move || {
        state.db.create_complaint(
            &NewComplaint {
                title: req.title,
                description: req.description,
                complaint_type: req.complaint_type,
                target_department_id: req.target_department_id,
            },
            claims.sub,
        )
    })
    .await??;

    Ok((StatusCode::CREATED, Json(complaint_response(&row))))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Query(filter): Query<ComplaintFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = tokio::task::spawn_blocking(move || {
        if let Some(status) = filter.status {
            state.db.complaints_by_status(status)
        } else if let Some(complaint_type) = filter.complaint_type {
            state.db.complaints_by_type(complaint_type)
        } else if let Some(department_id) = filter.department_id {
            state.db.complaints_by_department(department_id)
        } else if let Some(created_by) = filter.created_by {
            state.db.complaints_by_creator(created_by)
        } else if let Some(assigned_to) = filter.assigned_to {
            state.db.complaints_by_assignee(assigned_to)
        } else {
            state.db.list_complaints()
        }
    })
    .await??;

    Ok(Json(responses(&rows)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = tokio::task::spawn_blocking(move || state.db.get_complaint(id))
        .await??
        .ok_or_else(|| ApiError::NotFound(format!("Complaint not found with ID: {id}")))?;
    Ok(Json(complaint_response(&row)))
}

/// Public prioritization view, no authentication required.
pub async fn top_voted(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = tokio::task::spawn_blocking(move || state.db.top_voted_complaints()).await??;
    Ok(Json(responses(&rows)))
}

pub async fn requiring_confirmation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Staff, Role::Admin])?;
    let rows =
        tokio::task::spawn_blocking(move || state.db.complaints_requiring_confirmation()).await??;
    Ok(Json(responses(&rows)))
}

pub async fn vote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Student])?;
    tokio::task::spawn_blocking(move || state.db.vote(id, claims.sub)).await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unvote(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Student])?;
    tokio::task::spawn_blocking(move || state.db.unvote(id, claims.sub)).await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Staff, Role::Admin])?;
    let row = tokio::task::spawn_blocking(move || {
        state
            .db
            .change_status(id, req.status, claims.sub, req.notes.as_deref())?;
        state.db.get_complaint(id)
    })
    .await??
    .ok_or_else(|| ApiError::NotFound(format!("Complaint not found with ID: {id}")))?;
    Ok(Json(complaint_response(&row)))
}

/// Student confirmation of an announced resolution. Only the complaint's
/// creator may confirm.
pub async fn confirm(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Student])?;
    let row = tokio::task::spawn_blocking(move || {
        let complaint = state
            .db
            .get_complaint(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Complaint not found with ID: {id}")))?;
        if complaint.created_by != claims.sub {
            return Err(ApiError::Forbidden);
        }
        state
            .db
            .change_status(id, ComplaintStatus::ConfirmedByStudent, claims.sub, None)?;
        state
            .db
            .get_complaint(id)?
            .ok_or_else(|| ApiError::NotFound(format!("Complaint not found with ID: {id}")))
    })
    .await??;
    Ok(Json(complaint_response(&row)))
}

pub async fn assign(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<AssignRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Staff, Role::Admin])?;
    let row = tokio::task::spawn_blocking(move || {
        state.db.assign_complaint(id, req.staff_id, claims.sub)?;
        state.db.get_complaint(id)
    })
    .await??
    .ok_or_else(|| ApiError::NotFound(format!("Complaint not found with ID: {id}")))?;
    Ok(Json(complaint_response(&row)))
}

pub async fn list_comments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(filter): Query<CommentFilter>,
) -> Result<impl IntoResponse, ApiError> {
    // Students never see internal comments regardless of what they ask for.
    let include_internal = claims.role != Role::Student && filter.include_internal.unwrap_or(true);
    let rows =
        tokio::task::spawn_blocking(move || state.db.comments(id, include_internal)).await??;
    Ok(Json(
        rows.iter().map(comment_response).collect::<Vec<_>>(),
    ))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.comment.trim().is_empty() {
        return Err(ApiError::Validation("Comment must not be empty".to_string()));
    }

    let is_internal = req.is_internal && claims.role != Role::Student;
    let row = tokio::task::spawn_blocking(move || {
        state.db.add_comment(id, claims.sub, &req.comment, is_internal)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(comment_response(&row))))
}

pub async fn history(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = tokio::task::spawn_blocking(move || state.db.status_history(id)).await??;
    Ok(Json(
        rows.iter().map(history_response).collect::<Vec<_>>(),
    ))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    tokio::task::spawn_blocking(move || state.db.delete_complaint(id)).await??;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_complaint(req: &ComplaintRequest) -> Result<(), ApiError> {
    if req.title.trim().is_empty() || req.title.len() > MAX_TITLE_LEN {
        return Err(ApiError::Validation(format!(
            "Title must be between 1 and {MAX_TITLE_LEN} characters"
        )));
    }
    if req.description.trim().is_empty() || req.description.len() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::Validation(format!(
            "Description must be between 1 and {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn parse_status(raw: &str) -> ComplaintStatus {
    ComplaintStatus::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt complaint status '{}': {}", raw, e);
        ComplaintStatus::New
    })
}

fn parse_type(raw: &str) -> ComplaintType {
    ComplaintType::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt complaint type '{}': {}", raw, e);
        ComplaintType::Academic
    })
}

pub(crate) fn complaint_response(row: &ComplaintRow) -> ComplaintResponse {
    ComplaintResponse {
        id: row.id,
        title: row.title.clone(),
        description: row.description.clone(),
        complaint_type: parse_type(&row.complaint_type),
        status: parse_status(&row.status),
        created_by: row.created_by,
        created_by_username: row.created_by_username.clone(),
        target_department_id: row.target_department_id,
        target_department_name: row.target_department_name.clone(),
        assigned_to: row.assigned_to,
        assigned_to_username: row.assigned_to_username.clone(),
        total_votes: row.total_votes,
        student_confirmation: row.student_confirmation,
        resolution_announced_at: row.resolution_announced_at.as_deref().map(time::parse),
        confirmed_by_student_at: row.confirmed_by_student_at.as_deref().map(time::parse),
        created_at: time::parse(&row.created_at),
        updated_at: time::parse(&row.updated_at),
    }
}

fn responses(rows: &[ComplaintRow]) -> Vec<ComplaintResponse> {
    rows.iter().map(complaint_response).collect()
}

fn comment_response(row: &CommentRow) -> CommentResponse {
    CommentResponse {
        id: row.id,
        complaint_id: row.complaint_id,
        user_id: row.user_id,
        username: row.username.clone(),
        comment: row.comment.clone(),
        is_internal: row.is_internal,
        created_at: time::parse(&row.created_at),
    }
}

fn history_response(row: &StatusHistoryRow) -> StatusHistoryResponse {
    StatusHistoryResponse {
        id: row.id,
        complaint_id: row.complaint_id,
        status: parse_status(&row.status),
        comment: row.comment.clone(),
        changed_by: row.changed_by,
        changed_by_username: row.changed_by_username.clone(),
        created_at: time::parse(&row.created_at),
    }
}
