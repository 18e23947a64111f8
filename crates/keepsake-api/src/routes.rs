//! Router assembly: public auth endpoints, optional-auth viewer
//! endpoints, and bearer-protected account/editor endpoints.

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};

use crate::middleware::{optional_auth, require_auth};
use crate::{AppState, auth, memorials, tributes};

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/verify-email", post(auth::verify_email))
        .route("/auth/login", post(auth::login))
        .route("/auth/magic-link", post(auth::request_magic_link))
        .route("/auth/magic-login", post(auth::magic_login))
        .route("/auth/forgot-password", post(auth::forgot_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/auth/confirm-email-change", post(auth::confirm_email_change))
        .with_state(state.clone());

    // Viewer endpoints vary by identity but never require it. The path
    // parameter is the public slug; it shares the `{id}` name with the
    // editor routes because the router requires one name per position.
    let viewer = Router::new()
        .route("/memorials/{id}", get(memorials::get_by_slug))
        .route(
            "/memorials/{id}/tributes",
            get(tributes::list).post(tributes::submit),
        )
        .layer(middleware::from_fn_with_state(state.clone(), optional_auth))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/change-email", post(auth::change_email))
        .route("/memorials", post(memorials::create))
        .route("/memorials/mine", get(memorials::my_memorials))
        .route("/memorials/edit/{id}", get(memorials::get_for_edit))
        .route("/memorials/{id}", put(memorials::update))
        .route("/memorials/{id}", delete(memorials::trash))
        .route("/memorials/{id}/managers", post(memorials::invite_manager))
        .route(
            "/memorials/invites/{id}/accept",
            post(memorials::accept_invitation),
        )
        .route("/tributes/{id}/moderate", post(tributes::moderate))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public).merge(viewer).merge(protected)
}

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "keepsake-server"
    }))
}
