//! Barangay Desk Server - realtime store and admin API for the complaint desk
//!
//! This server handles:
//! - Staff sign-in with bearer sessions
//! - The realtime document store (REST plus WebSocket subscriptions)
//! - Complaint, messaging, validation and roster operations
//! - Analytics and dashboard projections

pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod storage;
pub mod websocket;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::database::Database;
use crate::storage::Storage;
use crate::websocket::SubscriptionManager;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
}

impl AppState {
    pub fn new(config: Arc<Config>, storage: Storage) -> Self {
        let db = Database::new(Arc::new(storage), Arc::new(SubscriptionManager::new()));
        Self {
            config,
            db: Arc::new(db),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.limits.max_body_kb * 1024;

    Router::new()
        // Health check
        .route("/health", get(handlers::health::health_check))

        // Authentication
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/logout", post(handlers::auth::logout))
        .route("/api/v1/auth/password-reset", post(handlers::auth::password_reset))

        // Realtime store
        .route(
            "/api/v1/db",
            get(handlers::db::export_tree).post(handlers::db::update_many),
        )
        .route(
            "/api/v1/db/*path",
            get(handlers::db::get_value)
                .put(handlers::db::put_value)
                .patch(handlers::db::patch_value)
                .post(handlers::db::push_value)
                .delete(handlers::db::delete_value),
        )
        .route("/ws", get(handlers::websocket::websocket_handler))

        // Complaints
        .route("/api/v1/complaints", get(handlers::complaints::list_complaints))
        .route(
            "/api/v1/complaints/:user_id/:complaint_id/status",
            put(handlers::complaints::update_complaint_status),
        )

        // Messaging
        .route("/api/v1/conversations", get(handlers::conversations::list_conversations))
        .route(
            "/api/v1/conversations/:user_id/:complaint_id/open",
            post(handlers::conversations::open_conversation),
        )
        .route(
            "/api/v1/conversations/:user_id/:complaint_id/reply",
            post(handlers::conversations::reply),
        )

        // Resident validation
        .route("/api/v1/validations", get(handlers::validations::list_validations))
        .route(
            "/api/v1/validations/:user_id/decision",
            post(handlers::validations::decide),
        )

        // Employees and officials
        .route(
            "/api/v1/staff/:kind",
            get(handlers::rated::list_entities).post(handlers::rated::create),
        )
        .route(
            "/api/v1/staff/:kind/:id",
            put(handlers::rated::update).delete(handlers::rated::delete),
        )

        // Analytics and dashboard
        .route("/api/v1/analytics/monthly", get(handlers::analytics::monthly))
        .route("/api/v1/analytics/weekly", get(handlers::analytics::weekly))
        .route("/api/v1/analytics/breakdown", get(handlers::analytics::breakdown))
        .route("/api/v1/puroks", get(handlers::dashboard::puroks))
        .route("/api/v1/dashboard/summary", get(handlers::dashboard::summary))

        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

pub async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("Starting Barangay Desk Server v{}", env!("CARGO_PKG_VERSION"));

    if config.uses_default_password() {
        tracing::warn!("Admin password is still the default; set [admin].password_hash");
    }

    let storage = Storage::new(&config.storage.database_path).await?;
    let state = AppState::new(config.clone(), storage);
    let db_for_cleanup = Arc::clone(&state.db);

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;

    // Start session cleanup task
    let cleanup_interval = config.storage.cleanup_interval_minutes.max(1);
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(cleanup_interval * 60));
        loop {
            interval.tick().await;
            match db_for_cleanup.storage().cleanup_expired().await {
                Ok(sessions) => {
                    if sessions > 0 {
                        tracing::info!("Cleanup: removed {} sessions", sessions);
                    }
                }
                Err(e) => {
                    tracing::error!("Cleanup failed: {}", e);
                }
            }
        }
    });

    axum::serve(listener, app).await?;

    Ok(())
}
