//! HTTP request handlers for the Barangay Desk server

pub mod analytics;
pub mod auth;
pub mod complaints;
pub mod conversations;
pub mod dashboard;
pub mod db;
pub mod health;
pub mod rated;
pub mod validations;
pub mod websocket;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use crate::{error::AppError, AppState};

/// Signed-in staff context extracted from the bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub email: String,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // Extract Authorization header
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        // Parse "Bearer <token>"
        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::Unauthorized)?;

        let session = state
            .db
            .storage()
            .validate_session(token)
            .await
            .map_err(|_| AppError::Unauthorized)?
            .ok_or(AppError::Unauthorized)?;

        Ok(AuthUser {
            email: session.email,
            token: token.to_string(),
        })
    }
}
