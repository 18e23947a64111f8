//! Database row types — these map directly to SQLite rows.
//! Nested memorial aggregates are stored as JSON columns and hydrated into
//! the typed keepsake-types models on the way out.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;
use uuid::Uuid;

use keepsake_types::models::{
    AccountStatus, Biography, CoverPhoto, Favorite, FamilyMember, Gallery, Manager,
    ManagerPermissions, Memorial, MemorialStatus, ProfilePhoto, ShareCounts, Theme, Timeline,
    Tribute, TributeStatus,
};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub custom_permissions: String,
    pub memorial_slots: i64,
    pub max_memorials: Option<i64>,
    pub max_photos_per_memorial: i64,
    pub email_verified: bool,
    pub email_verification_token: Option<String>,
    pub magic_link_token: Option<String>,
    pub magic_link_expires: Option<String>,
    pub magic_link_uses: i64,
    pub password_reset_token: Option<String>,
    pub password_reset_expires: Option<String>,
    pub pending_email: Option<String>,
    pub pending_email_token: Option<String>,
    pub pending_email_expires: Option<String>,
    pub account_status: String,
    pub deleted_at: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRow {
    /// Unknown status values count as inactive.
    pub fn is_active(&self) -> bool {
        AccountStatus::parse(&self.account_status) == Some(AccountStatus::Active)
    }

    /// Effective permission check: admins hold every permission, everyone
    /// else needs explicit membership in custom_permissions.
    pub fn has_permission(&self, permission: &str) -> bool {
        if self.role == "admin" {
            return true;
        }
        match serde_json::from_str::<Vec<String>>(&self.custom_permissions) {
            Ok(perms) => perms.iter().any(|p| p == permission),
            Err(e) => {
                warn!("Corrupt custom_permissions on user '{}': {}", self.id, e);
                false
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemorialRow {
    pub id: String,
    pub owner_id: String,
    pub slug: String,
    pub status: String,
    pub password: Option<String>,
    pub full_name: String,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
    pub show_dates: bool,
    pub profile_photo: String,
    pub cover_photo: String,
    pub biography: String,
    pub gallery: String,
    pub timeline: String,
    pub family_members: String,
    pub show_family: bool,
    pub favorites: String,
    pub show_favorites: bool,
    pub theme: String,
    pub view_count: i64,
    pub unique_views: i64,
    pub share_counts: String,
    pub in_trash: bool,
    pub trashed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct ManagerRow {
    pub memorial_id: String,
    pub user_id: String,
    pub can_edit: bool,
    pub can_moderate: bool,
    pub can_manage_gallery: bool,
    pub invited_at: String,
    pub accepted_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TributeRow {
    pub id: String,
    pub memorial_id: String,
    pub author_name: String,
    pub message: String,
    pub status: String,
    pub moderated_by: Option<String>,
    pub moderated_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub submitted_at: String,
}

// -- Hydration helpers --

pub(crate) fn parse_uuid(s: &str, context: &str) -> Uuid {
    s.parse().unwrap_or_else(|e| {
        warn!("Corrupt uuid '{}' in {}: {}", s, context, e);
        Uuid::default()
    })
}

pub(crate) fn parse_ts(s: &str, context: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt timestamp '{}' in {}: {}", s, context, e);
        DateTime::default()
    })
}

pub(crate) fn parse_opt_ts(s: Option<&str>, context: &str) -> Option<DateTime<Utc>> {
    s.map(|v| parse_ts(v, context))
}

fn parse_date(s: Option<&str>, context: &str) -> Option<NaiveDate> {
    s.and_then(|v| {
        v.parse::<NaiveDate>()
            .map_err(|e| warn!("Corrupt date '{}' in {}: {}", v, context, e))
            .ok()
    })
}

fn parse_json<T: serde::de::DeserializeOwned + Default>(raw: &str, context: &str) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Corrupt JSON column in {}: {}", context, e);
        T::default()
    })
}

impl ManagerRow {
    pub fn into_manager(self) -> Manager {
        let ctx = format!("manager on memorial '{}'", self.memorial_id);
        Manager {
            user_id: parse_uuid(&self.user_id, &ctx),
            permissions: ManagerPermissions {
                can_edit: self.can_edit,
                can_moderate: self.can_moderate,
                can_manage_gallery: self.can_manage_gallery,
            },
            invited_at: parse_ts(&self.invited_at, &ctx),
            accepted_at: parse_opt_ts(self.accepted_at.as_deref(), &ctx),
        }
    }
}

impl MemorialRow {
    pub fn into_memorial(self, managers: Vec<ManagerRow>) -> Memorial {
        let ctx = format!("memorial '{}'", self.id);
        Memorial {
            id: parse_uuid(&self.id, &ctx),
            owner_id: parse_uuid(&self.owner_id, &ctx),
            slug: self.slug,
            status: MemorialStatus::parse(&self.status).unwrap_or_else(|| {
                warn!("Corrupt status '{}' in {}", self.status, ctx);
                MemorialStatus::Unpublished
            }),
            full_name: self.full_name,
            birth_date: parse_date(self.birth_date.as_deref(), &ctx),
            death_date: parse_date(self.death_date.as_deref(), &ctx),
            show_dates: self.show_dates,
            profile_photo: parse_json::<ProfilePhoto>(&self.profile_photo, &ctx),
            cover_photo: parse_json::<CoverPhoto>(&self.cover_photo, &ctx),
            biography: parse_json::<Biography>(&self.biography, &ctx),
            gallery: parse_json::<Gallery>(&self.gallery, &ctx),
            timeline: parse_json::<Timeline>(&self.timeline, &ctx),
            family_members: parse_json::<Vec<FamilyMember>>(&self.family_members, &ctx),
            show_family: self.show_family,
            favorites: parse_json::<Vec<Favorite>>(&self.favorites, &ctx),
            show_favorites: self.show_favorites,
            theme: parse_json::<Theme>(&self.theme, &ctx),
            managers: managers.into_iter().map(ManagerRow::into_manager).collect(),
            view_count: self.view_count,
            unique_views: self.unique_views,
            share_counts: parse_json::<ShareCounts>(&self.share_counts, &ctx),
            in_trash: self.in_trash,
            trashed_at: parse_opt_ts(self.trashed_at.as_deref(), &ctx),
            created_at: parse_ts(&self.created_at, &ctx),
            updated_at: parse_ts(&self.updated_at, &ctx),
        }
    }
}

impl TributeRow {
    pub fn into_tribute(self) -> Tribute {
        let ctx = format!("tribute '{}'", self.id);
        Tribute {
            id: parse_uuid(&self.id, &ctx),
            memorial_id: parse_uuid(&self.memorial_id, &ctx),
            author_name: self.author_name,
            message: self.message,
            status: TributeStatus::parse(&self.status).unwrap_or_else(|| {
                warn!("Corrupt status '{}' in {}", self.status, ctx);
                TributeStatus::Pending
            }),
            moderated_by: self.moderated_by.as_deref().map(|s| parse_uuid(s, &ctx)),
            moderated_at: parse_opt_ts(self.moderated_at.as_deref(), &ctx),
            rejection_reason: self.rejection_reason,
            submitted_at: parse_ts(&self.submitted_at, &ctx),
        }
    }
}
