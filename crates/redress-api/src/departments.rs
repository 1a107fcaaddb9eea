use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use redress_db::models::DepartmentRow;
use redress_db::time;
use redress_types::api::{Claims, DepartmentRequest, DepartmentResponse, ToggleActiveRequest};
use redress_types::models::Role;

use crate::auth::{AppState, user_response};
use crate::error::ApiError;
use crate::middleware::require_role;

#[derive(Debug, Default, Deserialize)]
pub struct DepartmentListFilter {
    pub active: Option<bool>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Query(filter): Query<DepartmentListFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = tokio::task::spawn_blocking(move || {
        if filter.active == Some(true) {
            state.db.active_departments()
        } else {
            state.db.list_departments()
        }
    })
    .await??;
    Ok(Json(
        rows.iter().map(department_response).collect::<Vec<_>>(),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let row = tokio::task::spawn_blocking(move || state.db.get_department(id))
        .await??
        .ok_or_else(|| ApiError::NotFound(format!("Department not found with ID: {id}")))?;
    Ok(Json(department_response(&row)))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<DepartmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    validate_name(&req.name)?;

    let row = tokio::task::spawn_blocking(move || {
        state
            .db
            .create_department(&req.name, req.description.as_deref())
    })
    .await??;
    Ok((StatusCode::CREATED, Json(department_response(&row))))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<DepartmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    validate_name(&req.name)?;

    let row = tokio::task::spawn_blocking(move || {
        state
            .db
            .update_department(id, &req.name, req.description.as_deref())
    })
    .await??;
    Ok(Json(department_response(&row)))
}

pub async fn set_active(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<ToggleActiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    tokio::task::spawn_blocking(move || state.db.set_department_active(id, req.enabled)).await??;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Admin])?;
    tokio::task::spawn_blocking(move || state.db.delete_department(id)).await??;
    Ok(StatusCode::NO_CONTENT)
}

/// Active staff members of a department.
pub async fn staff(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_role(&claims, &[Role::Staff, Role::Admin])?;
    let rows = tokio::task::spawn_blocking(move || state.db.staff_in_department(id)).await??;
    Ok(Json(rows.iter().map(user_response).collect::<Vec<_>>()))
}

fn validate_name(name: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() || name.len() > 100 {
        return Err(ApiError::Validation(
            "Department name must be between 1 and 100 characters".to_string(),
        ));
    }
    Ok(())
}

fn department_response(row: &DepartmentRow) -> DepartmentResponse {
    DepartmentResponse {
        id: row.id,
        name: row.name.clone(),
        description: row.description.clone(),
        active: row.is_active,
        created_at: time::parse(&row.created_at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validation() {
        assert!(validate_name("Facilities").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }
}
