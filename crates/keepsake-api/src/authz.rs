//! Authorization decisions for memorials.
//!
//! Pure function of the memorial's state at read time: (actor, resource,
//! action) in, allow/deny plus reason out. No caching — manager records
//! can change between requests, so every check recomputes.

use keepsake_db::models::{ManagerRow, MemorialRow};
use keepsake_types::models::MemorialStatus;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    Edit,
    Moderate,
    ManageGallery,
    /// Trash/delete. Owner only — manager edit rights never extend here.
    Delete,
}

#[derive(Debug, Clone, Copy)]
pub struct Decision {
    pub allowed: bool,
    pub reason: &'static str,
}

impl Decision {
    fn allow(reason: &'static str) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny(reason: &'static str) -> Self {
        Self {
            allowed: false,
            reason,
        }
    }
}

/// `actor` is the requesting user's id, or None for anonymous requests.
/// `managers` must be the memorial's current manager rows.
pub fn decide(
    memorial: &MemorialRow,
    managers: &[ManagerRow],
    actor: Option<&str>,
    action: Action,
) -> Decision {
    let is_owner = actor == Some(memorial.owner_id.as_str());

    // Pending invitations grant nothing.
    let accepted_manager = actor.and_then(|uid| {
        managers
            .iter()
            .find(|m| m.user_id == uid && m.accepted_at.is_some())
    });

    match action {
        Action::View => {
            let status = MemorialStatus::parse(&memorial.status).unwrap_or_else(|| {
                warn!("Corrupt status '{}' on memorial '{}'", memorial.status, memorial.id);
                MemorialStatus::Unpublished
            });
            match status {
                MemorialStatus::Public => Decision::allow("public"),
                MemorialStatus::Unpublished => {
                    if is_owner {
                        Decision::allow("owner")
                    } else {
                        Decision::deny("unpublished")
                    }
                }
                // The password gate for private memorials lives outside
                // this service; owner and accepted managers pass directly.
                MemorialStatus::Private => {
                    if is_owner {
                        Decision::allow("owner")
                    } else if accepted_manager.is_some() {
                        Decision::allow("manager")
                    } else {
                        Decision::deny("private")
                    }
                }
            }
        }
        Action::Edit => {
            if is_owner {
                Decision::allow("owner")
            } else if accepted_manager.is_some_and(|m| m.can_edit) {
                Decision::allow("manager")
            } else {
                Decision::deny("no edit grant")
            }
        }
        Action::Moderate => {
            if is_owner {
                Decision::allow("owner")
            } else if accepted_manager.is_some_and(|m| m.can_moderate) {
                Decision::allow("manager")
            } else {
                Decision::deny("no moderate grant")
            }
        }
        Action::ManageGallery => {
            if is_owner {
                Decision::allow("owner")
            } else if accepted_manager.is_some_and(|m| m.can_manage_gallery) {
                Decision::allow("manager")
            } else {
                Decision::deny("no gallery grant")
            }
        }
        Action::Delete => {
            if is_owner {
                Decision::allow("owner")
            } else {
                Decision::deny("owner only")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memorial(status: &str) -> MemorialRow {
        MemorialRow {
            id: "m1".to_string(),
            owner_id: "owner".to_string(),
            slug: "abcd1234".to_string(),
            status: status.to_string(),
            password: None,
            full_name: "In Memory".to_string(),
            birth_date: None,
            death_date: None,
            show_dates: true,
            profile_photo: "{}".to_string(),
            cover_photo: "{}".to_string(),
            biography: "{}".to_string(),
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
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn manager(user_id: &str, can_edit: bool, can_moderate: bool, accepted: bool) -> ManagerRow {
        ManagerRow {
            memorial_id: "m1".to_string(),
            user_id: user_id.to_string(),
            can_edit,
            can_moderate,
            can_manage_gallery: true,
            invited_at: "2025-01-02T00:00:00Z".to_string(),
            accepted_at: accepted.then(|| "2025-01-03T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn owner_can_always_edit() {
        let m = memorial("unpublished");
        assert!(decide(&m, &[], Some("owner"), Action::Edit).allowed);
        assert!(decide(&m, &[], Some("owner"), Action::Moderate).allowed);
        assert!(decide(&m, &[], Some("owner"), Action::Delete).allowed);
    }

    #[test]
    fn accepted_manager_edits_iff_flag_set() {
        let m = memorial("public");
        let accepted_with_edit = [manager("mgr", true, false, true)];
        let accepted_without_edit = [manager("mgr", false, true, true)];

        assert!(decide(&m, &accepted_with_edit, Some("mgr"), Action::Edit).allowed);
        assert!(!decide(&m, &accepted_with_edit, Some("mgr"), Action::Moderate).allowed);
        assert!(!decide(&m, &accepted_without_edit, Some("mgr"), Action::Edit).allowed);
        assert!(decide(&m, &accepted_without_edit, Some("mgr"), Action::Moderate).allowed);
    }

    #[test]
    fn pending_invitation_grants_nothing() {
        let m = memorial("public");
        let pending = [manager("mgr", true, true, false)];
        assert!(!decide(&m, &pending, Some("mgr"), Action::Edit).allowed);
        assert!(!decide(&m, &pending, Some("mgr"), Action::Moderate).allowed);
        assert!(!decide(&m, &pending, Some("mgr"), Action::ManageGallery).allowed);
    }

    #[test]
    fn managers_never_delete() {
        let m = memorial("public");
        let accepted = [manager("mgr", true, true, true)];
        let d = decide(&m, &accepted, Some("mgr"), Action::Delete);
        assert!(!d.allowed);
        assert_eq!(d.reason, "owner only");
    }

    #[test]
    fn public_memorial_viewable_by_anyone() {
        let m = memorial("public");
        assert!(decide(&m, &[], None, Action::View).allowed);
        assert!(decide(&m, &[], Some("stranger"), Action::View).allowed);
    }

    #[test]
    fn unpublished_memorial_owner_only() {
        let m = memorial("unpublished");
        assert!(decide(&m, &[], Some("owner"), Action::View).allowed);
        assert!(!decide(&m, &[], Some("stranger"), Action::View).allowed);
        assert!(!decide(&m, &[], None, Action::View).allowed);
    }

    #[test]
    fn private_memorial_admits_owner_and_accepted_managers() {
        let m = memorial("private");
        let accepted = [manager("mgr", false, false, true)];
        let pending = [manager("mgr", true, true, false)];

        assert!(decide(&m, &[], Some("owner"), Action::View).allowed);
        assert!(decide(&m, &accepted, Some("mgr"), Action::View).allowed);
        assert!(!decide(&m, &pending, Some("mgr"), Action::View).allowed);
        assert!(!decide(&m, &[], None, Action::View).allowed);
    }

    #[test]
    fn trash_does_not_change_view_decision() {
        let mut m = memorial("public");
        m.in_trash = true;
        assert!(decide(&m, &[], None, Action::View).allowed);
    }
}
