//! Bearer-token middleware.
//!
//! Verification is split into three independently testable steps: pure
//! token decode (token module), user lookup, and account-status check.
//! `require_auth` rejects on any failure; `optional_auth` silently
//! yields an anonymous request instead.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use keepsake_types::models::Role;

use crate::{AppState, error::ApiError};

/// The authenticated requester, available to handlers via `Extension`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub memorial_slots: i64,
}

/// Optional-auth requests carry this instead; `None` means anonymous.
#[derive(Debug, Clone, Default)]
pub struct MaybeUser(pub Option<AuthUser>);

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn resolve_user(state: &AppState, token: &str) -> Result<AuthUser, ApiError> {
    let claims = state
        .tokens
        .verify(token)
        .map_err(|_| ApiError::Unauthenticated)?;

    let row = state
        .db
        .find_user_by_id(&claims.sub.to_string())?
        .ok_or(ApiError::Unauthenticated)?;

    if !row.is_active() {
        return Err(ApiError::AccountInactive);
    }

    Ok(AuthUser {
        id: claims.sub,
        email: row.email,
        name: row.name,
        role: Role::parse(&row.role).unwrap_or(Role::User),
        memorial_slots: row.memorial_slots,
    })
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or(ApiError::Unauthenticated)?;
    let user = resolve_user(&state, token)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Endpoints that vary by viewer identity without requiring login.
pub async fn optional_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let user = bearer_token(&req).and_then(|token| resolve_user(&state, token).ok());
    req.extensions_mut().insert(MaybeUser(user));
    next.run(req).await
}
