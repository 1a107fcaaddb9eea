//! Admin-only surface: user management and the statistics dashboard.
//! Every handler here gates on the ADMIN role before touching the database.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use redress_types::api::{
    Claims, MostActiveDepartmentResponse, ResolutionTimeResponse, SatisfactionRateResponse,
    SystemStatsResponse, ToggleActiveRequest, TypeCounts, UserUpdate,
};
use redress_types::models::Role;

use crate::auth::{AppState, user_response};
use crate::error::ApiError;
use crate::middleware::require_role;

#[derive(Debug, Default, Deserialize)]
pub struct UserListFilter {
    pub role: Option<Role>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<UserListFilter>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    let rows = tokio::task::spawn_blocking(move || match filter.role {
        Some(role) => state.db.users_by_role(role),
        None => state.db.list_users(),
    })
    .await??;
    Ok(Json(rows.iter().map(user_response).collect::<Vec<_>>()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    let row = tokio::task::spawn_blocking(move || state.db.get_user(id))
        .await??
        .ok_or_else(|| ApiError::NotFound(format!("User not found with ID: {id}")))?;
    Ok(Json(user_response(&row)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(update): Json<UserUpdate>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;

    if let Some(username) = &update.username {
        if username.len() < 3 || username.len() > 32 {
            return Err(ApiError::Validation(
                "Username must be between 3 and 32 characters".to_string(),
            ));
        }
    }
    if let Some(email) = &update.email {
        if !email.contains('@') {
            return Err(ApiError::Validation("Email address is invalid".to_string()));
        }
    }
    if let Some(full_name) = &update.full_name {
        if full_name.trim().is_empty() {
            return Err(ApiError::Validation("Full name is required".to_string()));
        }
    }

    let row = tokio::task::spawn_blocking(move || state.db.update_user(id, &update)).await??;
    Ok(Json(user_response(&row)))
}

pub async fn set_user_active(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<ToggleActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    tokio::task::spawn_blocking(move || state.db.set_user_active(id, req.enabled)).await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    if id == claims.sub {
        return Err(ApiError::InvalidState(
            "Cannot delete your own account".to_string(),
        ));
    }
    tokio::task::spawn_blocking(move || state.db.delete_user(id)).await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn system_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    let (users, complaints) = tokio::task::spawn_blocking(move || {
        let users = state.db.user_stats()?;
        let complaints = state.db.complaint_stats()?;
        Ok::<_, redress_db::DbError>((users, complaints))
    })
    .await??;

    Ok(Json(SystemStatsResponse {
        total_users: users.total,
        active_users: users.active,
        total_complaints: complaints.total,
        pending_complaints: complaints.pending,
        in_progress_complaints: complaints.in_progress,
        resolved_complaints: complaints.resolved,
        confirmed_by_student_complaints: complaints.confirmed_by_student,
        by_type: TypeCounts {
            academic: complaints.academic,
            facility: complaints.facility,
        },
    }))
}

pub async fn avg_resolution_time(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    let average_hours =
        tokio::task::spawn_blocking(move || state.db.average_resolution_hours()).await??;
    Ok(Json(ResolutionTimeResponse { average_hours }))
}

pub async fn most_active_department(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    let (department_name, complaint_count) =
        tokio::task::spawn_blocking(move || state.db.most_active_department()).await??;
    Ok(Json(MostActiveDepartmentResponse {
        department_name,
        complaint_count,
    }))
}

pub async fn satisfaction_rate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    let rate = tokio::task::spawn_blocking(move || state.db.satisfaction_rate()).await??;
    Ok(Json(SatisfactionRateResponse { rate }))
}
