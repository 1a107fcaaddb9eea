use std::str::FromStr;
use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::warn;

use redress_db::models::UserRow;
use redress_db::users::{NewUser, split_full_name};
use redress_db::{Database, time};
use redress_types::api::{
    AuthResponse, ChangePasswordRequest, Claims, LoginRequest, RegisterRequest, UserResponse,
};
use redress_types::models::Role;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_registration(&req)?;

    // Password hashing is deliberately slow, so it runs off the async runtime
    // together with the insert.
    let user = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            let password_hash = hash_password(&req.password)?;
            let (first_name, last_name) = split_full_name(&req.full_name);
            state
                .db
                .create_user(&NewUser {
                    username: req.username,
                    email: req.email,
                    password_hash,
                    first_name,
                    last_name,
                    role: req.role.unwrap_or(Role::Student),
                    department_id: None,
                })
                .map_err(ApiError::from)
        })
        .await??
    };

    let token = create_token(&state.jwt_secret, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user_response(&user),
        }),
    ))
}

/// Login by username or email. All failure modes (unknown account, wrong
/// password, deactivated account) collapse into a uniform 401 so the
/// response does not reveal which check failed.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = {
        let state = state.clone();
        tokio::task::spawn_blocking(move || {
            let user = match state.db.get_user_by_username(&req.username_or_email)? {
                Some(user) => user,
                None => state
                    .db
                    .get_user_by_email(&req.username_or_email)?
                    .ok_or(ApiError::Unauthorized)?,
            };

            if !verify_password(&req.password, &user.password) {
                return Err(ApiError::Unauthorized);
            }

            if !user.is_active {
                warn!("Login attempt on deactivated account: {}", user.username);
                return Err(ApiError::Unauthorized);
            }

            Ok(user)
        })
        .await??
    };

    let token = create_token(&state.jwt_secret, &user)?;

    Ok(Json(AuthResponse {
        token,
        user: user_response(&user),
    }))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let user = tokio::task::spawn_blocking(move || state.db.get_user(user_id))
        .await??
        .ok_or_else(|| ApiError::NotFound(format!("User not found with ID: {user_id}")))?;
    Ok(Json(user_response(&user)))
}

/// Self-service password change for the authenticated user.
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    tokio::task::spawn_blocking(move || {
        let hash = hash_password(&req.password)?;
        state
            .db
            .change_password(claims.sub, &hash)
            .map_err(ApiError::from)
    })
    .await??;
    Ok(StatusCode::NO_CONTENT)
}

fn validate_registration(req: &RegisterRequest) -> Result<(), ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::Validation(
            "Username must be between 3 and 32 characters".to_string(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::Validation(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    if !req.email.contains('@') {
        return Err(ApiError::Validation("Email address is invalid".to_string()));
    }
    if req.full_name.trim().is_empty() {
        return Err(ApiError::Validation("Full name is required".to_string()));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub(crate) fn create_token(secret: &str, user: &UserRow) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user.id,
        username: user.username.clone(),
        role: parse_role(&user.role),
        exp: (chrono::Utc::now() + chrono::Duration::hours(24)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow::anyhow!("token encoding failed: {e}")))
}

pub(crate) fn parse_role(raw: &str) -> Role {
    Role::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt role '{}': {}", raw, e);
        Role::Student
    })
}

pub(crate) fn user_response(user: &UserRow) -> UserResponse {
    UserResponse {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        full_name: user.full_name(),
        role: parse_role(&user.role),
        enabled: user.is_active,
        department_id: user.department_id,
        created_at: time::parse(&user.created_at),
    }
}
