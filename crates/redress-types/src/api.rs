use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ComplaintStatus, ComplaintType, Role};

// -- JWT Claims --

/// JWT claims shared between token issuance (auth handlers) and the
/// authentication middleware. Canonical definition lives here in
/// redress-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub role: Role,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub password: String,
}

// -- Users --

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub role: Role,
    pub enabled: bool,
    pub department_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Typed partial update for admin user edits. Absent fields are left
/// untouched; each present field is validated independently.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub department_id: Option<i64>,
}

/// Body for the user and department enable/disable endpoints.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToggleActiveRequest {
    pub enabled: bool,
}

// -- Departments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DepartmentRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DepartmentResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

// -- Complaints --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComplaintRequest {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub complaint_type: ComplaintType,
    pub target_department_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ComplaintResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub complaint_type: ComplaintType,
    pub status: ComplaintStatus,
    pub created_by: i64,
    pub created_by_username: String,
    pub target_department_id: Option<i64>,
    pub target_department_name: Option<String>,
    pub assigned_to: Option<i64>,
    pub assigned_to_username: Option<String>,
    pub total_votes: i64,
    pub student_confirmation: bool,
    pub resolution_announced_at: Option<DateTime<Utc>>,
    pub confirmed_by_student_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeStatusRequest {
    pub status: ComplaintStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignRequest {
    pub staff_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommentRequest {
    pub comment: String,
    #[serde(default)]
    pub is_internal: bool,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: i64,
    pub complaint_id: i64,
    pub user_id: i64,
    pub username: String,
    pub comment: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusHistoryResponse {
    pub id: i64,
    pub complaint_id: i64,
    pub status: ComplaintStatus,
    pub comment: String,
    pub changed_by: i64,
    pub changed_by_username: String,
    pub created_at: DateTime<Utc>,
}

// -- Statistics --

#[derive(Debug, Serialize)]
pub struct TypeCounts {
    pub academic: i64,
    pub facility: i64,
}

#[derive(Debug, Serialize)]
pub struct SystemStatsResponse {
    pub total_users: i64,
    pub active_users: i64,
    pub total_complaints: i64,
    pub pending_complaints: i64,
    pub in_progress_complaints: i64,
    pub resolved_complaints: i64,
    pub confirmed_by_student_complaints: i64,
    pub by_type: TypeCounts,
}

#[derive(Debug, Serialize)]
pub struct ResolutionTimeResponse {
    pub average_hours: f64,
}

#[derive(Debug, Serialize)]
pub struct MostActiveDepartmentResponse {
    pub department_name: String,
    pub complaint_count: i64,
}

#[derive(Debug, Serialize)]
pub struct SatisfactionRateResponse {
    pub rate: f64,
}
