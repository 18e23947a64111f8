//! Guestbook tributes: public submission on viewable memorials, a
//! moderation queue visible to owners and moderating managers, and
//! approve/reject handling.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use keepsake_db::models::TributeRow;
use keepsake_types::api::{
    ModerateTributeRequest, ModerationAction, SubmitTributeRequest, TributeListResponse,
    TributeResponse,
};

use crate::authz::{Action, decide};
use crate::middleware::{AuthUser, MaybeUser};
use crate::{AppState, error::ApiError, mailer};

const MAX_AUTHOR_NAME_LEN: usize = 250;

pub async fn submit(
    State(state): State<AppState>,
    Extension(MaybeUser(viewer)): Extension<MaybeUser>,
    Path(slug): Path<String>,
    Json(req): Json<SubmitTributeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.author_name.trim().is_empty() || req.author_name.len() > MAX_AUTHOR_NAME_LEN {
        return Err(ApiError::Validation("Author name is required".to_string()));
    }
    if req.message.trim().is_empty() {
        return Err(ApiError::Validation("Message is required".to_string()));
    }

    let memorial = state
        .db
        .get_memorial_by_slug(&slug)?
        .ok_or(ApiError::NotFound)?;
    let managers = state.db.managers_for(&memorial.id)?;

    let actor = viewer.as_ref().map(|u| u.id.to_string());
    if !decide(&memorial, &managers, actor.as_deref(), Action::View).allowed {
        return Err(ApiError::NotFound);
    }

    let row = TributeRow {
        id: Uuid::new_v4().to_string(),
        memorial_id: memorial.id.clone(),
        author_name: req.author_name.trim().to_string(),
        message: req.message.trim().to_string(),
        status: "pending".to_string(),
        moderated_by: None,
        moderated_at: None,
        rejection_reason: None,
        submitted_at: Utc::now().to_rfc3339(),
    };
    state.db.insert_tribute(&row)?;
    info!("Tribute {} submitted for memorial {}", row.id, memorial.id);

    // Best-effort heads-up to the owner.
    if let Some(owner) = state.db.find_user_by_id(&memorial.owner_id)? {
        let (subject, html) =
            mailer::tribute_pending_email(&owner.name, &memorial.full_name, &row.author_name);
        state.mailer.send_detached(owner.email, owner.name, subject, html);
    }

    Ok((
        StatusCode::CREATED,
        Json(TributeResponse {
            tribute: row.into_tribute(),
        }),
    ))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(MaybeUser(viewer)): Extension<MaybeUser>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let memorial = state
        .db
        .get_memorial_by_slug(&slug)?
        .ok_or(ApiError::NotFound)?;
    let managers = state.db.managers_for(&memorial.id)?;

    let actor = viewer.as_ref().map(|u| u.id.to_string());
    if !decide(&memorial, &managers, actor.as_deref(), Action::View).allowed {
        return Err(ApiError::NotFound);
    }

    // Moderators see the pending queue alongside approved entries.
    let include_pending = decide(&memorial, &managers, actor.as_deref(), Action::Moderate).allowed;
    let rows = state.db.list_tributes(&memorial.id, include_pending)?;

    Ok(Json(TributeListResponse {
        tributes: rows.into_iter().map(TributeRow::into_tribute).collect(),
    }))
}

pub async fn moderate(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<ModerateTributeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tribute = state
        .db
        .get_tribute(&id.to_string())?
        .ok_or(ApiError::NotFound)?;
    let memorial = state
        .db
        .get_memorial(&tribute.memorial_id)?
        .ok_or(ApiError::NotFound)?;
    let managers = state.db.managers_for(&memorial.id)?;

    if !decide(&memorial, &managers, Some(&actor.id.to_string()), Action::Moderate).allowed {
        return Err(ApiError::Forbidden);
    }

    let (status, reason) = match req.action {
        ModerationAction::Approve => ("approved", None),
        ModerationAction::Reject => ("rejected", req.reason.as_deref()),
    };
    state.db.moderate_tribute(
        &tribute.id,
        status,
        &actor.id.to_string(),
        reason,
        &Utc::now().to_rfc3339(),
    )?;
    info!("Tribute {} {} by {}", tribute.id, status, actor.id);

    let updated = state
        .db
        .get_tribute(&tribute.id)?
        .ok_or(ApiError::NotFound)?;
    Ok(Json(TributeResponse {
        tribute: updated.into_tribute(),
    }))
}
