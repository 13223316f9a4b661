//! Authentication Middleware
//! Mission: Protect API endpoints with bearer-token role checks

use crate::api::ApiError;
use crate::auth::{gate::AuthGate, models::Role};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Middleware state: which gate to ask, and what role the wrapped routes need.
#[derive(Clone)]
pub struct RoleGuard {
    gate: Arc<AuthGate>,
    required: Role,
}

impl RoleGuard {
    pub fn new(gate: Arc<AuthGate>, required: Role) -> Self {
        Self { gate, required }
    }
}

/// Auth middleware that resolves the bearer token and enforces the guard's role.
///
/// On success the resolved [`Principal`](crate::auth::models::Principal) is added to the request extensions.
pub async fn require_role(
    State(guard): State<RoleGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers()).map(str::to_owned);
    let principal = guard.gate.authorize(token.as_deref(), guard.required)?;

    // Add principal to request extensions so handlers can access it
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}

/// Token from an `Authorization: Bearer <token>` header. The scheme is case-insensitive.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}
