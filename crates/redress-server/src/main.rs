use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use redress_api::auth::{self, AppState, AppStateInner};
use redress_api::middleware::require_auth;
use redress_api::{admin, complaints, departments};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redress=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("REDRESS_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("REDRESS_DB_PATH").unwrap_or_else(|_| "redress.db".into());
    let host = std::env::var("REDRESS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("REDRESS_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = redress_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner { db, jwt_secret });

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/complaints/top-voted", get(complaints::top_voted))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/password", put(auth::change_password))
        .route("/complaints", post(complaints::create))
        .route("/complaints", get(complaints::list))
        .route(
            "/complaints/requiring-confirmation",
            get(complaints::requiring_confirmation),
        )
        .route("/complaints/{id}", get(complaints::get))
        .route("/complaints/{id}", delete(complaints::delete))
        .route("/complaints/{id}/status", put(complaints::change_status))
        .route("/complaints/{id}/assign", put(complaints::assign))
        .route("/complaints/{id}/confirm", put(complaints::confirm))
        .route("/complaints/{id}/vote", post(complaints::vote))
        .route("/complaints/{id}/vote", delete(complaints::unvote))
        .route("/complaints/{id}/comments", get(complaints::list_comments))
        .route("/complaints/{id}/comments", post(complaints::add_comment))
        .route("/complaints/{id}/history", get(complaints::history))
        .route("/departments", get(departments::list))
        .route("/departments", post(departments::create))
        .route("/departments/{id}", get(departments::get))
        .route("/departments/{id}", put(departments::update))
        .route("/departments/{id}", delete(departments::delete))
        .route("/departments/{id}/status", put(departments::set_active))
        .route("/departments/{id}/staff", get(departments::staff))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{id}", get(admin::get_user))
        .route("/admin/users/{id}", put(admin::update_user))
        .route("/admin/users/{id}", delete(admin::delete_user))
        .route("/admin/users/{id}/status", put(admin::set_user_active))
        .route("/admin/stats", get(admin::system_stats))
        .route(
            "/admin/stats/avg-resolution-time",
            get(admin::avg_resolution_time),
        )
        .route(
            "/admin/stats/most-active-department",
            get(admin::most_active_department),
        )
        .route(
            "/admin/stats/satisfaction-rate",
            get(admin::satisfaction_rate),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Redress server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
