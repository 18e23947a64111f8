use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Database;
use crate::models::{ManagerRow, MemorialRow};

const MEMORIAL_COLUMNS: &str = "id, owner_id, slug, status, password, full_name, birth_date, \
     death_date, show_dates, profile_photo, cover_photo, biography, gallery, timeline, \
     family_members, show_family, favorites, show_favorites, theme, view_count, unique_views, \
     share_counts, in_trash, trashed_at, created_at, updated_at";

fn map_memorial(row: &Row) -> rusqlite::Result<MemorialRow> {
    Ok(MemorialRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        slug: row.get(2)?,
        status: row.get(3)?,
        password: row.get(4)?,
        full_name: row.get(5)?,
        birth_date: row.get(6)?,
        death_date: row.get(7)?,
        show_dates: row.get(8)?,
        profile_photo: row.get(9)?,
        cover_photo: row.get(10)?,
        biography: row.get(11)?,
        gallery: row.get(12)?,
        timeline: row.get(13)?,
        family_members: row.get(14)?,
        show_family: row.get(15)?,
        favorites: row.get(16)?,
        show_favorites: row.get(17)?,
        theme: row.get(18)?,
        view_count: row.get(19)?,
        unique_views: row.get(20)?,
        share_counts: row.get(21)?,
        in_trash: row.get(22)?,
        trashed_at: row.get(23)?,
        created_at: row.get(24)?,
        updated_at: row.get(25)?,
    })
}

fn map_manager(row: &Row) -> rusqlite::Result<ManagerRow> {
    Ok(ManagerRow {
        memorial_id: row.get(0)?,
        user_id: row.get(1)?,
        can_edit: row.get(2)?,
        can_moderate: row.get(3)?,
        can_manage_gallery: row.get(4)?,
        invited_at: row.get(5)?,
        accepted_at: row.get(6)?,
    })
}

fn query_memorial_where(conn: &Connection, clause: &str, param: &str) -> Result<Option<MemorialRow>> {
    let sql = format!("SELECT {} FROM memorials WHERE {}", MEMORIAL_COLUMNS, clause);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([param], map_memorial).optional()?;
    Ok(row)
}

impl Database {
    pub fn insert_memorial(&self, memorial: &MemorialRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO memorials (id, owner_id, slug, status, password, full_name, \
                 birth_date, death_date, show_dates, profile_photo, cover_photo, biography, \
                 gallery, timeline, family_members, show_family, favorites, show_favorites, \
                 theme, view_count, unique_views, share_counts, in_trash, trashed_at, \
                 created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26)",
                rusqlite::params![
                    memorial.id,
                    memorial.owner_id,
                    memorial.slug,
                    memorial.status,
                    memorial.password,
                    memorial.full_name,
                    memorial.birth_date,
                    memorial.death_date,
                    memorial.show_dates,
                    memorial.profile_photo,
                    memorial.cover_photo,
                    memorial.biography,
                    memorial.gallery,
                    memorial.timeline,
                    memorial.family_members,
                    memorial.show_family,
                    memorial.favorites,
                    memorial.show_favorites,
                    memorial.theme,
                    memorial.view_count,
                    memorial.unique_views,
                    memorial.share_counts,
                    memorial.in_trash,
                    memorial.trashed_at,
                    memorial.created_at,
                    memorial.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn slug_exists(&self, slug: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM memorials WHERE slug = ?1", [slug], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Trashed memorials do not count against the owner's slots.
    pub fn count_active_for_owner(&self, owner_id: &str) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM memorials WHERE owner_id = ?1 AND in_trash = 0",
                [owner_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Owner listing: non-trashed only, newest first.
    pub fn list_memorials_for_owner(&self, owner_id: &str) -> Result<Vec<MemorialRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM memorials WHERE owner_id = ?1 AND in_trash = 0 \
                 ORDER BY created_at DESC",
                MEMORIAL_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([owner_id], map_memorial)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_memorial(&self, id: &str) -> Result<Option<MemorialRow>> {
        self.with_conn(|conn| query_memorial_where(conn, "id = ?1", id))
    }

    /// Slug lookup ignores the trash flag: a trashed memorial stays
    /// reachable by its public URL until it is purged.
    pub fn get_memorial_by_slug(&self, slug: &str) -> Result<Option<MemorialRow>> {
        self.with_conn(|conn| query_memorial_where(conn, "slug = ?1", slug))
    }

    /// Writes the editable column subset. Slug, owner and counters are
    /// deliberately absent from the SET list.
    pub fn update_memorial(&self, memorial: &MemorialRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE memorials SET status = ?2, full_name = ?3, birth_date = ?4, \
                 death_date = ?5, show_dates = ?6, profile_photo = ?7, cover_photo = ?8, \
                 biography = ?9, gallery = ?10, timeline = ?11, family_members = ?12, \
                 show_family = ?13, favorites = ?14, show_favorites = ?15, theme = ?16, \
                 updated_at = ?17 WHERE id = ?1",
                rusqlite::params![
                    memorial.id,
                    memorial.status,
                    memorial.full_name,
                    memorial.birth_date,
                    memorial.death_date,
                    memorial.show_dates,
                    memorial.profile_photo,
                    memorial.cover_photo,
                    memorial.biography,
                    memorial.gallery,
                    memorial.timeline,
                    memorial.family_members,
                    memorial.show_family,
                    memorial.favorites,
                    memorial.show_favorites,
                    memorial.theme,
                    memorial.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn increment_view_count(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE memorials SET view_count = view_count + 1 WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    pub fn trash_memorial(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE memorials SET in_trash = 1, trashed_at = ?2, updated_at = ?2 \
                 WHERE id = ?1",
                (id, now),
            )?;
            Ok(())
        })
    }

    // -- Managers --

    pub fn managers_for(&self, memorial_id: &str) -> Result<Vec<ManagerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT memorial_id, user_id, can_edit, can_moderate, can_manage_gallery, \
                 invited_at, accepted_at FROM memorial_managers WHERE memorial_id = ?1",
            )?;
            let rows = stmt
                .query_map([memorial_id], map_manager)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns false if this user is already on the manager list.
    pub fn add_manager(
        &self,
        memorial_id: &str,
        user_id: &str,
        can_edit: bool,
        can_moderate: bool,
        can_manage_gallery: bool,
        invited_at: &str,
    ) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO memorial_managers \
                 (memorial_id, user_id, can_edit, can_moderate, can_manage_gallery, invited_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    memorial_id,
                    user_id,
                    can_edit,
                    can_moderate,
                    can_manage_gallery,
                    invited_at
                ],
            )?;
            Ok(inserted > 0)
        })
    }

    /// Returns false when there is no pending invitation for this user.
    pub fn accept_invitation(&self, memorial_id: &str, user_id: &str, now: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE memorial_managers SET accepted_at = ?3 \
                 WHERE memorial_id = ?1 AND user_id = ?2 AND accepted_at IS NULL",
                (memorial_id, user_id, now),
            )?;
            Ok(updated > 0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRow;

    fn seed_user(db: &Database, id: &str, email: &str) {
        db.create_user(&UserRow {
            id: id.to_string(),
            email: email.to_string(),
            name: "Owner".to_string(),
            password_hash: None,
            role: "user".to_string(),
            custom_permissions: "[]".to_string(),
            memorial_slots: 1,
            max_memorials: None,
            max_photos_per_memorial: 20,
            email_verified: true,
            email_verification_token: None,
            magic_link_token: None,
            magic_link_expires: None,
            magic_link_uses: 0,
            password_reset_token: None,
            password_reset_expires: None,
            pending_email: None,
            pending_email_token: None,
            pending_email_expires: None,
            account_status: "active".to_string(),
            deleted_at: None,
            last_login: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
            updated_at: "2025-01-01T00:00:00Z".to_string(),
        })
        .unwrap();
    }

    fn blank_memorial(id: &str, owner: &str, slug: &str) -> MemorialRow {
        MemorialRow {
            id: id.to_string(),
            owner_id: owner.to_string(),
            slug: slug.to_string(),
            status: "unpublished".to_string(),
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

    #[test]
    fn slug_is_unique() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "a@x.com");
        db.insert_memorial(&blank_memorial("m1", "u1", "abcd1234")).unwrap();
        assert!(db.slug_exists("abcd1234").unwrap());
        assert!(!db.slug_exists("zzzz9999").unwrap());
        assert!(db.insert_memorial(&blank_memorial("m2", "u1", "abcd1234")).is_err());
    }

    #[test]
    fn trash_hides_from_listing_and_count_but_not_slug_lookup() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "a@x.com");
        let mut m = blank_memorial("m1", "u1", "abcd1234");
        m.status = "public".to_string();
        db.insert_memorial(&m).unwrap();

        assert_eq!(db.count_active_for_owner("u1").unwrap(), 1);
        db.trash_memorial("m1", "2025-02-01T00:00:00Z").unwrap();

        assert_eq!(db.count_active_for_owner("u1").unwrap(), 0);
        assert!(db.list_memorials_for_owner("u1").unwrap().is_empty());
        // Still reachable by slug: trash only affects listings.
        let fetched = db.get_memorial_by_slug("abcd1234").unwrap().unwrap();
        assert!(fetched.in_trash);
    }

    #[test]
    fn listing_is_newest_first() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "a@x.com");
        let mut old = blank_memorial("m1", "u1", "aaaa1111");
        old.created_at = "2025-01-01T00:00:00Z".to_string();
        let mut new = blank_memorial("m2", "u1", "bbbb2222");
        new.created_at = "2025-03-01T00:00:00Z".to_string();
        db.insert_memorial(&old).unwrap();
        db.insert_memorial(&new).unwrap();

        let list = db.list_memorials_for_owner("u1").unwrap();
        assert_eq!(list[0].id, "m2");
        assert_eq!(list[1].id, "m1");
    }

    #[test]
    fn update_never_touches_slug_or_counters() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "a@x.com");
        db.insert_memorial(&blank_memorial("m1", "u1", "abcd1234")).unwrap();
        db.increment_view_count("m1").unwrap();

        let mut edited = db.get_memorial("m1").unwrap().unwrap();
        edited.slug = "hacked99".to_string();
        edited.full_name = "New Name".to_string();
        db.update_memorial(&edited).unwrap();

        let reloaded = db.get_memorial("m1").unwrap().unwrap();
        assert_eq!(reloaded.slug, "abcd1234");
        assert_eq!(reloaded.full_name, "New Name");
        assert_eq!(reloaded.view_count, 1);
    }

    #[test]
    fn invitation_accept_is_single_shot() {
        let db = Database::open_in_memory().unwrap();
        seed_user(&db, "u1", "a@x.com");
        seed_user(&db, "u2", "b@x.com");
        db.insert_memorial(&blank_memorial("m1", "u1", "abcd1234")).unwrap();

        assert!(db.add_manager("m1", "u2", true, false, true, "2025-01-02T00:00:00Z").unwrap());
        // Second invite for the same user is a no-op.
        assert!(!db.add_manager("m1", "u2", true, true, true, "2025-01-03T00:00:00Z").unwrap());

        assert!(db.accept_invitation("m1", "u2", "2025-01-04T00:00:00Z").unwrap());
        assert!(!db.accept_invitation("m1", "u2", "2025-01-05T00:00:00Z").unwrap());

        let managers = db.managers_for("m1").unwrap();
        assert_eq!(managers.len(), 1);
        assert!(managers[0].accepted_at.is_some());
        assert!(managers[0].can_edit);
        assert!(!managers[0].can_moderate);
    }
}
