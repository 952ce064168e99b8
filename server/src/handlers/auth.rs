//! Authentication handlers

use axum::{extract::State, Json};
use crate::{
    config::AdminConfig,
    crypto,
    error::{AppError, Result},
    models::*,
    AppState,
};

use super::AuthUser;

/// Map what the operator typed onto the backing account email. The
/// configured username and the email itself are both accepted.
pub fn resolve_login_email<'a>(admin: &'a AdminConfig, username: &str) -> Option<&'a str> {
    let typed = username.trim();
    if typed.is_empty() {
        return None;
    }
    if typed.eq_ignore_ascii_case(&admin.username) || typed.eq_ignore_ascii_case(&admin.email) {
        Some(&admin.email)
    } else {
        None
    }
}

/// Sign in with username (or email) and password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let admin = &state.config.admin;

    let email = resolve_login_email(admin, &req.username).ok_or(AppError::InvalidCredentials)?;
    if !crypto::verify_secret(&req.password, &admin.password_hash) {
        tracing::warn!("Failed sign-in for {}", req.username.trim());
        return Err(AppError::InvalidCredentials);
    }

    let token = crypto::generate_session_token()?;
    let expires_at = state
        .db
        .storage()
        .create_session(email, &token, admin.session_ttl_hours)
        .await?;

    tracing::info!("{} signed in", email);

    Ok(Json(LoginResponse {
        token,
        email: email.to_string(),
        expires_at: expires_at.timestamp(),
    }))
}

/// Logout and invalidate session
pub async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>> {
    state.db.storage().invalidate_session(&auth.token).await?;

    tracing::info!("{} signed out", auth.email);

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Request a password reset link for the account behind `username`
pub async fn password_reset(
    State(state): State<AppState>,
    Json(req): Json<PasswordResetRequest>,
) -> Result<Json<PasswordResetResponse>> {
    let email = resolve_login_email(&state.config.admin, &req.username)
        .ok_or_else(|| AppError::NotFound(format!("no account for {}", req.username.trim())))?;

    state.db.storage().record_password_reset(email).await?;
    tracing::info!("Password reset requested for {}", email);

    Ok(Json(PasswordResetResponse {
        email: email.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_username_or_email_resolves_to_backing_email() {
        let config = Config::default();
        let admin = &config.admin;

        assert_eq!(resolve_login_email(admin, " Admin "), Some("admin@barangay.local"));
        assert_eq!(
            resolve_login_email(admin, "admin@barangay.local"),
            Some("admin@barangay.local")
        );
        assert_eq!(resolve_login_email(admin, "captain"), None);
        assert_eq!(resolve_login_email(admin, ""), None);
    }
}
