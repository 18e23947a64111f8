//! Account and session handlers: registration, email verification,
//! password and passwordless login, password reset, email change.

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{TimeDelta, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use keepsake_db::models::UserRow;
use keepsake_types::api::{
    ChangeEmailRequest, ChangePasswordRequest, ConfirmEmailChangeRequest, ForgotPasswordRequest,
    LoginRequest, MagicLinkRequest, MagicLoginRequest, MessageResponse, RegisterRequest,
    RegisterResponse, ResetPasswordRequest, SessionResponse, UserSummary, VerifyEmailRequest,
};
use keepsake_types::models::{AccountStatus, Role};

use crate::middleware::AuthUser;
use crate::{AppState, error::ApiError, magic, mailer, token};

const PASSWORD_RESET_EXPIRY_SECS: i64 = 60 * 60;
const EMAIL_CHANGE_EXPIRY_SECS: i64 = 60 * 60;
const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();
    Ok(hash)
}

/// One-way comparison. A user with no stored hash matches nothing.
pub(crate) fn password_matches(stored: Option<&str>, candidate: &str) -> bool {
    let Some(stored) = stored else {
        return false;
    };
    let Ok(parsed) = PasswordHash::new(stored) else {
        warn!("Unparseable password hash on record");
        return false;
    };
    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

fn check_password_strength(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn summary(row: &UserRow) -> UserSummary {
    UserSummary {
        id: row.id.parse().unwrap_or_default(),
        email: row.email.clone(),
        name: row.name.clone(),
        role: Role::parse(&row.role).unwrap_or(Role::User),
        memorial_slots: row.memorial_slots,
    }
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::Validation("Name is required".to_string()));
    }
    // Normalize once; the duplicate check and the insert must agree on
    // the stored form.
    let email = req.email.trim().to_lowercase();
    if !email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if let Some(password) = &req.password {
        check_password_strength(password)?;
    }

    if state.db.email_exists(&email)? {
        return Err(ApiError::DuplicateEmail);
    }

    let password_hash = req.password.as_deref().map(hash_password).transpose()?;
    let verification_token = token::opaque_token();
    let now = Utc::now().to_rfc3339();

    let user = UserRow {
        id: Uuid::new_v4().to_string(),
        email,
        name: req.name.trim().to_string(),
        password_hash,
        role: "user".to_string(),
        custom_permissions: "[]".to_string(),
        memorial_slots: 0,
        max_memorials: None,
        max_photos_per_memorial: 20,
        email_verified: false,
        email_verification_token: Some(verification_token.clone()),
        magic_link_token: None,
        magic_link_expires: None,
        magic_link_uses: 0,
        password_reset_token: None,
        password_reset_expires: None,
        pending_email: None,
        pending_email_token: None,
        pending_email_expires: None,
        account_status: AccountStatus::Active.as_str().to_string(),
        deleted_at: None,
        last_login: None,
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.create_user(&user)?;
    info!("Registered user {}", user.id);

    let link = format!("{}/verify-email/{}", state.frontend_url, verification_token);
    let (subject, html) = mailer::verification_email(&user.name, &link);
    state.mailer.send_detached(user.email, user.name, subject, html);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Registration successful. Please check your email to verify your account."
                .to_string(),
            requires_verification: true,
        }),
    ))
}

/// Verification doubles as login: a session token is issued immediately.
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_verification_token(&req.token)?
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    let now = Utc::now().to_rfc3339();
    state.db.mark_email_verified(&user.id, &now)?;

    let session = state.tokens.issue(user.id.parse().unwrap_or_default())?;
    Ok(Json(SessionResponse {
        token: session,
        user: summary(&user),
    }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_email(&req.email)?
        .filter(|u| u.is_active())
        .ok_or(ApiError::InvalidCredentials)?;

    if !password_matches(user.password_hash.as_deref(), &req.password) {
        return Err(ApiError::InvalidCredentials);
    }
    if !user.email_verified {
        return Err(ApiError::EmailNotVerified);
    }

    state.db.set_last_login(&user.id, &Utc::now().to_rfc3339())?;
    let session = state.tokens.issue(user.id.parse().unwrap_or_default())?;
    info!("User {} logged in", user.id);

    Ok(Json(SessionResponse {
        token: session,
        user: summary(&user),
    }))
}

/// Enumeration-safe: the response is identical whether or not the email
/// matches an account.
pub async fn request_magic_link(
    State(state): State<AppState>,
    Json(req): Json<MagicLinkRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_email(&req.email)?
        .filter(|u| u.is_active());

    if let Some(user) = user {
        let link = magic::issue(state.magic, Utc::now());
        state.db.set_magic_link(
            &user.id,
            &link.token,
            &link.expires.to_rfc3339(),
            &Utc::now().to_rfc3339(),
        )?;

        let url = format!("{}/auth/magic/{}", state.frontend_url, link.token);
        let (subject, html) = mailer::magic_link_email(
            &user.name,
            &url,
            state.magic.expiry_secs / 60,
            state.magic.max_uses,
        );
        state.mailer.send_detached(user.email, user.name, subject, html);
    }

    Ok(Json(MessageResponse {
        message: "If account exists, magic link has been sent".to_string(),
    }))
}

pub async fn magic_login(
    State(state): State<AppState>,
    Json(req): Json<MagicLoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_active_user_by_magic_token(&req.token)?
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    let expires = user
        .magic_link_expires
        .as_deref()
        .and_then(|s| s.parse().ok());

    match magic::evaluate(expires, user.magic_link_uses, state.magic.max_uses, Utc::now()) {
        magic::Consumption::Rejected => Err(ApiError::InvalidOrExpiredToken),
        magic::Consumption::Exhausted => Err(ApiError::UsesExceeded),
        magic::Consumption::Accepted { uses, retire } => {
            state
                .db
                .record_magic_link_use(&user.id, uses, retire, &Utc::now().to_rfc3339())?;

            let session = state.tokens.issue(user.id.parse().unwrap_or_default())?;
            info!("User {} logged in via magic link (use {})", user.id, uses);
            Ok(Json(SessionResponse {
                token: session,
                user: summary(&user),
            }))
        }
    }
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_email(&req.email)?
        .filter(|u| u.is_active());

    if let Some(user) = user {
        let reset_token = token::opaque_token();
        let expires = (Utc::now() + TimeDelta::seconds(PASSWORD_RESET_EXPIRY_SECS)).to_rfc3339();
        state
            .db
            .set_password_reset(&user.id, &reset_token, &expires, &Utc::now().to_rfc3339())?;

        let link = format!("{}/reset-password/{}", state.frontend_url, reset_token);
        let (subject, html) = mailer::password_reset_email(&user.name, &link);
        state.mailer.send_detached(user.email, user.name, subject, html);
    }

    Ok(Json(MessageResponse {
        message: "If account exists, password reset email has been sent".to_string(),
    }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_reset_token(&req.token)?
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    let unexpired = user
        .password_reset_expires
        .as_deref()
        .and_then(|s| s.parse::<chrono::DateTime<Utc>>().ok())
        .is_some_and(|expires| expires > Utc::now());
    if !unexpired {
        return Err(ApiError::InvalidOrExpiredToken);
    }

    check_password_strength(&req.new_password)?;
    let hash = hash_password(&req.new_password)?;
    state
        .db
        .apply_password_reset(&user.id, &hash, &Utc::now().to_rfc3339())?;
    info!("Password reset for user {}", user.id);

    Ok(Json(MessageResponse {
        message: "Password reset successful".to_string(),
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_id(&actor.id.to_string())?
        .ok_or(ApiError::Unauthenticated)?;

    // Passwordless accounts set their first password without a current
    // one; everyone else must prove the old password.
    if user.password_hash.is_some() {
        let current = req.current_password.as_deref().unwrap_or_default();
        if !password_matches(user.password_hash.as_deref(), current) {
            return Err(ApiError::InvalidCredentials);
        }
    }

    check_password_strength(&req.new_password)?;
    let hash = hash_password(&req.new_password)?;
    state
        .db
        .update_password(&user.id, &hash, &Utc::now().to_rfc3339())?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

pub async fn change_email(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(req): Json<ChangeEmailRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !req.new_email.contains('@') {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }
    if state.db.email_exists(&req.new_email)? {
        return Err(ApiError::DuplicateEmail);
    }

    let confirm_token = token::opaque_token();
    let expires = (Utc::now() + TimeDelta::seconds(EMAIL_CHANGE_EXPIRY_SECS)).to_rfc3339();
    state.db.set_pending_email(
        &actor.id.to_string(),
        &req.new_email,
        &confirm_token,
        &expires,
        &Utc::now().to_rfc3339(),
    )?;

    // Confirmation goes to the current address, not the new one.
    let link = format!("{}/confirm-email-change/{}", state.frontend_url, confirm_token);
    let (subject, html) = mailer::email_change_email(&actor.name, &req.new_email, &link);
    state
        .mailer
        .send_detached(actor.email, actor.name, subject, html);

    Ok(Json(MessageResponse {
        message: "Confirmation email sent to your current email address".to_string(),
    }))
}

pub async fn confirm_email_change(
    State(state): State<AppState>,
    Json(req): Json<ConfirmEmailChangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .find_user_by_pending_email_token(&req.token)?
        .ok_or(ApiError::InvalidOrExpiredToken)?;

    let unexpired = user
        .pending_email_expires
        .as_deref()
        .and_then(|s| s.parse::<chrono::DateTime<Utc>>().ok())
        .is_some_and(|expires| expires > Utc::now());
    let Some(new_email) = user.pending_email.as_deref().filter(|_| unexpired) else {
        return Err(ApiError::InvalidOrExpiredToken);
    };

    // The address may have been claimed since the request was made.
    if state.db.email_exists(new_email)? {
        return Err(ApiError::DuplicateEmail);
    }

    state
        .db
        .apply_pending_email(&user.id, new_email, &Utc::now().to_rfc3339())?;
    info!("Email changed for user {}", user.id);

    Ok(Json(MessageResponse {
        message: "Email address updated".to_string(),
    }))
}

pub async fn me(Extension(actor): Extension<AuthUser>) -> impl IntoResponse {
    Json(serde_json::json!({
        "user": UserSummary {
            id: actor.id,
            email: actor.email,
            name: actor.name,
            role: actor.role,
            memorial_slots: actor.memorial_slots,
        }
    }))
}

/// Session tokens are purely time-bound; logout is a client-side token
/// drop acknowledged here.
pub async fn logout(Extension(actor): Extension<AuthUser>) -> impl IntoResponse {
    info!("User {} logged out", actor.id);
    Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_roundtrip() {
        let hash = hash_password("correct horse battery").unwrap();
        assert!(password_matches(Some(&hash), "correct horse battery"));
        assert!(!password_matches(Some(&hash), "wrong"));
    }

    #[test]
    fn missing_hash_matches_nothing() {
        assert!(!password_matches(None, ""));
        assert!(!password_matches(None, "anything"));
    }

    #[test]
    fn corrupt_hash_matches_nothing() {
        assert!(!password_matches(Some("not-a-phc-string"), "anything"));
    }
}
