//! Memorial lifecycle handlers: creation against purchased slots, owner
//! listings, the visibility-gated public viewer fetch, authorized edits,
//! trash, and manager invitations.

use anyhow::Context;
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use keepsake_db::Database;
use keepsake_db::models::MemorialRow;
use keepsake_types::api::{
    CreateMemorialRequest, InviteManagerRequest, MemorialListResponse, MemorialResponse,
    MessageResponse, UpdateMemorialRequest,
};
use keepsake_types::models::{Biography, Memorial};

use crate::authz::{Action, decide};
use crate::middleware::{AuthUser, MaybeUser};
use crate::{AppState, error::ApiError, mailer};

const SLUG_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const SLUG_LEN: usize = 8;

/// Random slug, collision-checked against existing memorials. The slug is
/// the shareable URL segment and never changes after creation.
fn generate_slug(db: &Database) -> Result<String, ApiError> {
    let mut rng = rand::rng();
    loop {
        let slug: String = (0..SLUG_LEN)
            .map(|_| SLUG_CHARS[rng.random_range(0..SLUG_CHARS.len())] as char)
            .collect();
        if !db.slug_exists(&slug)? {
            return Ok(slug);
        }
    }
}

fn hydrate(state: &AppState, row: MemorialRow) -> Result<Memorial, ApiError> {
    let managers = state.db.managers_for(&row.id)?;
    Ok(row.into_memorial(managers))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, ApiError> {
    let raw = serde_json::to_string(value).context("serialize memorial aggregate")?;
    Ok(raw)
}

pub async fn create(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Json(req): Json<CreateMemorialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.full_name.trim().is_empty() {
        return Err(ApiError::Validation("Full name is required".to_string()));
    }

    let used = state.db.count_active_for_owner(&actor.id.to_string())?;
    if used >= actor.memorial_slots {
        return Err(ApiError::Validation("No available memorial slots".to_string()));
    }

    let slug = generate_slug(&state.db)?;
    let now = Utc::now().to_rfc3339();
    let biography = Biography {
        content: req.biography,
        show_biography: true,
    };

    let row = MemorialRow {
        id: Uuid::new_v4().to_string(),
        owner_id: actor.id.to_string(),
        slug,
        status: req
            .status
            .unwrap_or(keepsake_types::models::MemorialStatus::Unpublished)
            .as_str()
            .to_string(),
        password: None,
        full_name: req.full_name.trim().to_string(),
        birth_date: req.birth_date.map(|d| d.to_string()),
        death_date: req.death_date.map(|d| d.to_string()),
        show_dates: req.show_dates.unwrap_or(true),
        profile_photo: to_json(&req.profile_photo.unwrap_or_default())?,
        cover_photo: "{}".to_string(),
        biography: to_json(&biography)?,
        gallery: "{}".to_string(),
        timeline: "{}".to_string(),
        family_members: "[]".to_string(),
        show_family: true,
        favorites: "[]".to_string(),
        show_favorites: true,
        theme: "{}".to_string(),
        view_count: 0,
        unique_views: 0,
        share_counts: "{}".to_string(),
        in_trash: false,
        trashed_at: None,
        created_at: now.clone(),
        updated_at: now,
    };
    state.db.insert_memorial(&row)?;
    info!("Memorial {} created by {}", row.id, actor.id);

    Ok((
        StatusCode::CREATED,
        Json(MemorialResponse {
            memorial: row.into_memorial(vec![]),
        }),
    ))
}

pub async fn my_memorials(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = state.db.list_memorials_for_owner(&actor.id.to_string())?;
    let memorials = rows
        .into_iter()
        .map(|row| hydrate(&state, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(MemorialListResponse { memorials }))
}

/// Full document for the editor; requires the Edit capability.
pub async fn get_for_edit(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_memorial(&id.to_string())?
        .ok_or(ApiError::NotFound)?;
    let managers = state.db.managers_for(&row.id)?;

    if !decide(&row, &managers, Some(&actor.id.to_string()), Action::Edit).allowed {
        return Err(ApiError::Forbidden);
    }

    Ok(Json(MemorialResponse {
        memorial: row.into_memorial(managers),
    }))
}

/// Public viewer fetch. A denied View comes back as NotFound so the
/// existence of unpublished memorials is never confirmed. Every
/// successful fetch bumps the view counter, repeat views included.
pub async fn get_by_slug(
    State(state): State<AppState>,
    Extension(MaybeUser(viewer)): Extension<MaybeUser>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let mut row = state
        .db
        .get_memorial_by_slug(&slug)?
        .ok_or(ApiError::NotFound)?;
    let managers = state.db.managers_for(&row.id)?;

    let actor = viewer.as_ref().map(|u| u.id.to_string());
    if !decide(&row, &managers, actor.as_deref(), Action::View).allowed {
        return Err(ApiError::NotFound);
    }

    state.db.increment_view_count(&row.id)?;
    row.view_count += 1;

    Ok(Json(MemorialResponse {
        memorial: row.into_memorial(managers),
    }))
}

pub async fn update(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMemorialRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut row = state
        .db
        .get_memorial(&id.to_string())?
        .ok_or(ApiError::NotFound)?;
    let managers = state.db.managers_for(&row.id)?;

    if !decide(&row, &managers, Some(&actor.id.to_string()), Action::Edit).allowed {
        return Err(ApiError::Forbidden);
    }

    if let Some(full_name) = req.full_name {
        if full_name.trim().is_empty() {
            return Err(ApiError::Validation("Full name is required".to_string()));
        }
        row.full_name = full_name.trim().to_string();
    }
    if let Some(birth_date) = req.birth_date {
        row.birth_date = birth_date.map(|d| d.to_string());
    }
    if let Some(death_date) = req.death_date {
        row.death_date = death_date.map(|d| d.to_string());
    }
    if let Some(content) = req.biography {
        // Only the text is writable here; the display toggle survives.
        let mut biography: Biography = serde_json::from_str(&row.biography).unwrap_or_default();
        biography.content = Some(content);
        row.biography = to_json(&biography)?;
    }
    if let Some(profile_photo) = req.profile_photo {
        row.profile_photo = to_json(&profile_photo)?;
    }
    if let Some(cover_photo) = req.cover_photo {
        row.cover_photo = to_json(&cover_photo)?;
    }
    if let Some(show_dates) = req.show_dates {
        row.show_dates = show_dates;
    }
    if let Some(status) = req.status {
        row.status = status.as_str().to_string();
    }
    if let Some(gallery) = req.gallery {
        row.gallery = to_json(&gallery)?;
    }
    if let Some(timeline) = req.timeline {
        row.timeline = to_json(&timeline)?;
    }
    if let Some(family_members) = req.family_members {
        row.family_members = to_json(&family_members)?;
    }
    if let Some(show_family) = req.show_family {
        row.show_family = show_family;
    }
    if let Some(favorites) = req.favorites {
        row.favorites = to_json(&favorites)?;
    }
    if let Some(show_favorites) = req.show_favorites {
        row.show_favorites = show_favorites;
    }
    if let Some(theme) = req.theme {
        row.theme = to_json(&theme)?;
    }
    row.updated_at = Utc::now().to_rfc3339();

    state.db.update_memorial(&row)?;

    Ok(Json(MemorialResponse {
        memorial: row.into_memorial(managers),
    }))
}

pub async fn trash(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_memorial(&id.to_string())?
        .ok_or(ApiError::NotFound)?;
    let managers = state.db.managers_for(&row.id)?;

    if !decide(&row, &managers, Some(&actor.id.to_string()), Action::Delete).allowed {
        return Err(ApiError::Forbidden);
    }

    state.db.trash_memorial(&row.id, &Utc::now().to_rfc3339())?;
    info!("Memorial {} moved to trash by {}", row.id, actor.id);

    Ok(Json(MessageResponse {
        message: "Memorial moved to trash".to_string(),
    }))
}

/// Only the owner manages the manager list itself.
pub async fn invite_manager(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<InviteManagerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = state
        .db
        .get_memorial(&id.to_string())?
        .ok_or(ApiError::NotFound)?;
    if row.owner_id != actor.id.to_string() {
        return Err(ApiError::Forbidden);
    }

    let invitee = state
        .db
        .find_user_by_email(&req.email)?
        .ok_or(ApiError::NotFound)?;
    if invitee.id == row.owner_id {
        return Err(ApiError::Validation("Owner cannot be a manager".to_string()));
    }

    let permissions = req.permissions.unwrap_or_default();
    let added = state.db.add_manager(
        &row.id,
        &invitee.id,
        permissions.can_edit,
        permissions.can_moderate,
        permissions.can_manage_gallery,
        &Utc::now().to_rfc3339(),
    )?;
    if !added {
        return Err(ApiError::Validation("User is already a manager".to_string()));
    }

    let (subject, html) = mailer::manager_invitation_email(&invitee.name, &row.full_name);
    state
        .mailer
        .send_detached(invitee.email, invitee.name, subject, html);

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Invitation sent".to_string(),
        }),
    ))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(actor): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let accepted = state
        .db
        .accept_invitation(&id.to_string(), &actor.id.to_string(), &Utc::now().to_rfc3339())?;
    if !accepted {
        return Err(ApiError::NotFound);
    }
    info!("User {} accepted manager invitation for {}", actor.id, id);

    Ok(Json(MessageResponse {
        message: "Invitation accepted".to_string(),
    }))
}
