//! Database row types: these map directly to SQLite rows.
//! Distinct from the redress-types API models to keep the DB layer
//! independent; enum-valued columns stay raw TEXT here and are parsed
//! at the API boundary.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    pub department_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }
}

#[derive(Debug, Clone)]
pub struct DepartmentRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ComplaintRow {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub complaint_type: String,
    pub status: String,
    pub created_by: i64,
    pub created_by_username: String,
    pub target_department_id: Option<i64>,
    pub target_department_name: Option<String>,
    pub assigned_to: Option<i64>,
    pub assigned_to_username: Option<String>,
    pub total_votes: i64,
    pub student_confirmation: bool,
    pub resolution_announced_at: Option<String>,
    pub confirmed_by_student_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct VoteRow {
    pub id: i64,
    pub complaint_id: i64,
    pub user_id: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct StatusHistoryRow {
    pub id: i64,
    pub complaint_id: i64,
    pub status: String,
    pub comment: String,
    pub changed_by: i64,
    pub changed_by_username: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: i64,
    pub complaint_id: i64,
    pub user_id: i64,
    pub username: String,
    pub comment: String,
    pub is_internal: bool,
    pub created_at: String,
    pub updated_at: String,
}
