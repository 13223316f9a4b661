//! Authentication API Endpoints
//! Mission: Provide registration, login and session endpoints

use crate::api::ApiError;
use crate::auth::{
    middleware::bearer_token,
    models::{
        AccountResponse, AuthenticateRequest, AuthenticateResponse, NewAccount, Principal,
        RegisterRequest, SessionResponse,
    },
};
use crate::error::ServiceError;
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use tracing::info;

/// Registration endpoint - POST /api/users
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountResponse>), ApiError> {
    let Json(payload) = payload?;
    let new_account = NewAccount::parse(payload)?;

    info!("📝 Registration attempt: {}", new_account.username());

    // bcrypt runs on the blocking pool
    let gate = state.gate.clone();
    let account = tokio::task::spawn_blocking(move || gate.register(new_account)).await??;

    Ok((
        StatusCode::CREATED,
        Json(AccountResponse::from_account(&account)),
    ))
}

/// Login endpoint - POST /api/authenticate
pub async fn authenticate(
    State(state): State<AppState>,
    payload: Result<Json<AuthenticateRequest>, JsonRejection>,
) -> Result<Json<AuthenticateResponse>, ApiError> {
    let Json(payload) = payload?;
    let (Some(username), Some(password)) = (payload.username, payload.password) else {
        return Err(ServiceError::invalid("username and password are required").into());
    };

    info!("🔐 Login attempt: {}", username);

    let gate = state.gate.clone();
    let issued =
        tokio::task::spawn_blocking(move || gate.authenticate(&username, &password)).await??;

    Ok(Json(AuthenticateResponse::from_issued(issued)))
}

/// Logout endpoint - POST /api/logout (revokes the presented token)
pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = bearer_token(&headers).map(str::to_owned) {
        let gate = state.gate.clone();
        tokio::task::spawn_blocking(move || gate.logout(&token)).await??;
    }

    info!("👋 Logout: {}", principal.username);
    Ok(StatusCode::NO_CONTENT)
}

/// Get current session - GET /api/me
pub async fn current_session(Extension(principal): Extension<Principal>) -> Json<SessionResponse> {
    Json(SessionResponse::from_principal(&principal))
}
