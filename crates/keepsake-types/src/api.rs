use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    CoverPhoto, Favorite, FamilyMember, Gallery, ManagerPermissions, Memorial, MemorialStatus,
    ProfilePhoto, Role, Theme, Timeline, Tribute,
};

// -- JWT Claims --

/// Session token claims. The token carries only the user id; everything
/// else (role, status) is re-read from the store on each request so that
/// suspensions take effect immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub iat: usize,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub message: String,
    pub requires_verification: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MagicLinkRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MagicLoginRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangeEmailRequest {
    pub new_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfirmEmailChangeRequest {
    pub token: String,
}

/// Slim user view returned alongside session tokens and from /auth/me.
/// Never carries the password hash or any lifecycle token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub memorial_slots: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Memorials --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMemorialRequest {
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub biography: Option<String>,
    pub profile_photo: Option<ProfilePhoto>,
    pub show_dates: Option<bool>,
    pub status: Option<MemorialStatus>,
}

/// Writable field subset for updates. Slug and owner are never writable.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateMemorialRequest {
    pub full_name: Option<String>,
    pub birth_date: Option<Option<NaiveDate>>,
    pub death_date: Option<Option<NaiveDate>>,
    pub biography: Option<String>,
    pub profile_photo: Option<ProfilePhoto>,
    pub cover_photo: Option<CoverPhoto>,
    pub show_dates: Option<bool>,
    pub status: Option<MemorialStatus>,
    pub gallery: Option<Gallery>,
    pub timeline: Option<Timeline>,
    pub family_members: Option<Vec<FamilyMember>>,
    pub show_family: Option<bool>,
    pub favorites: Option<Vec<Favorite>>,
    pub show_favorites: Option<bool>,
    pub theme: Option<Theme>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemorialResponse {
    pub memorial: Memorial,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MemorialListResponse {
    pub memorials: Vec<Memorial>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteManagerRequest {
    pub email: String,
    pub permissions: Option<ManagerPermissions>,
}

// -- Tributes --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SubmitTributeRequest {
    pub author_name: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModerationAction {
    Approve,
    Reject,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModerateTributeRequest {
    pub action: ModerationAction,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TributeResponse {
    pub tribute: Tribute,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TributeListResponse {
    pub tributes: Vec<Tribute>,
}
