//! Registration, login and session handlers

use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{bearer_token, AppError, AppState, Principal, SuccessResponse};
use finsight_core::models::{NewUser, User};

/// Shortest accepted password
pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Token plus the user it belongs to
#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

/// Response for the /api/me endpoint
#[derive(Serialize)]
pub struct MeResponse {
    /// Present for session logins
    pub user: Option<User>,
    /// How the request was authenticated
    pub auth_method: &'static str,
}

/// POST /api/auth/register - Create an account and log in
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if [&req.name, &req.username, &req.email, &req.password]
        .iter()
        .any(|field| field.trim().is_empty())
    {
        return Err(AppError::bad_request(
            "Name, username, email and password are required",
        ));
    }
    if !req.email.contains('@') {
        return Err(AppError::bad_request("Invalid email address"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(&format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let user = state.db.create_user(&NewUser {
        name: req.name,
        username: req.username,
        email: req.email,
        password: req.password,
    })?;
    let token = state.db.create_session(user.id, state.config.session_ttl())?;

    info!(user = %user.username, "Registered new user");
    state
        .db
        .log_audit(&user.username, "register", Some("user"), Some(user.id), None)?;

    Ok(Json(SessionResponse { token, user }))
}

/// POST /api/auth/login - Exchange credentials for a session token
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = state
        .db
        .verify_credentials(&req.username, &req.password)?
        .ok_or_else(|| AppError::unauthorized("Invalid username or password"))?;

    let token = state.db.create_session(user.id, state.config.session_ttl())?;
    state
        .db
        .log_audit(&user.username, "login", Some("user"), Some(user.id), None)?;

    Ok(Json(SessionResponse { token, user }))
}

/// POST /api/auth/logout - End the current session
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
) -> Result<Json<SuccessResponse>, AppError> {
    let user = principal.user()?;
    if let Some(token) = bearer_token(&headers) {
        state.db.delete_session(token)?;
    }
    state
        .db
        .log_audit(&user.username, "logout", Some("user"), Some(user.id), None)?;

    Ok(Json(SuccessResponse { success: true }))
}

/// GET /api/me - The currently authenticated identity
pub async fn get_me(Extension(principal): Extension<Principal>) -> Json<MeResponse> {
    let response = match principal {
        Principal::User(user) => MeResponse {
            user: Some(user),
            auth_method: "session",
        },
        Principal::ApiKey => MeResponse {
            user: None,
            auth_method: "api_key",
        },
    };
    Json(response)
}
