use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Accounts --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
    Moderator,
    Support,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Support => "support",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "moderator" => Some(Role::Moderator),
            "support" => Some(Role::Support),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AccountStatus::Active),
            "suspended" => Some(AccountStatus::Suspended),
            "deleted" => Some(AccountStatus::Deleted),
            _ => None,
        }
    }
}

// -- Memorials --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemorialStatus {
    Public,
    Private,
    Unpublished,
}

impl MemorialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemorialStatus::Public => "public",
            MemorialStatus::Private => "private",
            MemorialStatus::Unpublished => "unpublished",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(MemorialStatus::Public),
            "private" => Some(MemorialStatus::Private),
            "unpublished" => Some(MemorialStatus::Unpublished),
            _ => None,
        }
    }
}

/// Capability flags attached to a manager record. A record only grants
/// anything once the invitation has been accepted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagerPermissions {
    pub can_edit: bool,
    pub can_moderate: bool,
    pub can_manage_gallery: bool,
}

impl Default for ManagerPermissions {
    fn default() -> Self {
        Self {
            can_edit: true,
            can_moderate: true,
            can_manage_gallery: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manager {
    pub user_id: Uuid,
    pub permissions: ManagerPermissions,
    pub invited_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
}

// -- Memorial content aggregates --
//
// Each aggregate carries its own display toggle so the viewer page can
// hide sections without losing their content.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePhoto {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_photo_shape")]
    pub shape: String,
}

fn default_photo_shape() -> String {
    "circle".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverPhoto {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_cover_size")]
    pub size: String,
    #[serde(default = "default_cover_position")]
    pub position: String,
    #[serde(default = "default_true")]
    pub show_gradient: bool,
}

fn default_cover_size() -> String {
    "medium".to_string()
}

fn default_cover_position() -> String {
    "center".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Biography {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default = "default_true")]
    pub show_biography: bool,
}

impl Default for Biography {
    fn default() -> Self {
        Self {
            content: None,
            show_biography: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPhoto {
    pub url: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryVideo {
    pub url: String,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub autoplay: bool,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Gallery {
    #[serde(default)]
    pub photos: Vec<GalleryPhoto>,
    #[serde(default)]
    pub videos: Vec<GalleryVideo>,
    #[serde(default = "default_display_style")]
    pub display_style: String,
    #[serde(default = "default_true")]
    pub show_gallery: bool,
}

fn default_display_style() -> String {
    "grid".to_string()
}

impl Default for Gallery {
    fn default() -> Self {
        Self {
            photos: vec![],
            videos: vec![],
            display_style: default_display_style(),
            show_gallery: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub year_only: bool,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub photo_ref: Option<String>,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    #[serde(default)]
    pub events: Vec<TimelineEvent>,
    #[serde(default = "default_true")]
    pub show_timeline: bool,
}

impl Default for Timeline {
    fn default() -> Self {
        Self {
            events: vec![],
            show_timeline: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMember {
    pub name: String,
    #[serde(default)]
    pub relationship: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub category: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub order: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    #[serde(default)]
    pub accent_color: Option<String>,
    #[serde(default)]
    pub heading_font: Option<String>,
    #[serde(default)]
    pub body_font: Option<String>,
    #[serde(default = "default_header_layout")]
    pub header_layout: String,
}

fn default_header_layout() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareCounts {
    #[serde(default)]
    pub social: i64,
    #[serde(default)]
    pub qr: i64,
    #[serde(default)]
    pub link: i64,
}

/// Fully hydrated memorial as served to clients. Storage keeps the nested
/// aggregates as JSON columns; this is the typed view of one row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memorial {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub slug: String,
    pub status: MemorialStatus,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub show_dates: bool,
    pub profile_photo: ProfilePhoto,
    pub cover_photo: CoverPhoto,
    pub biography: Biography,
    pub gallery: Gallery,
    pub timeline: Timeline,
    pub family_members: Vec<FamilyMember>,
    pub show_family: bool,
    pub favorites: Vec<Favorite>,
    pub show_favorites: bool,
    pub theme: Theme,
    pub managers: Vec<Manager>,
    pub view_count: i64,
    pub unique_views: i64,
    pub share_counts: ShareCounts,
    pub in_trash: bool,
    pub trashed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// -- Tributes --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TributeStatus {
    Pending,
    Approved,
    Rejected,
}

impl TributeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TributeStatus::Pending => "pending",
            TributeStatus::Approved => "approved",
            TributeStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TributeStatus::Pending),
            "approved" => Some(TributeStatus::Approved),
            "rejected" => Some(TributeStatus::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tribute {
    pub id: Uuid,
    pub memorial_id: Uuid,
    pub author_name: String,
    pub message: String,
    pub status: TributeStatus,
    pub moderated_by: Option<Uuid>,
    pub moderated_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub submitted_at: DateTime<Utc>,
}
