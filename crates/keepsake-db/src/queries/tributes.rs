use anyhow::Result;
use rusqlite::{OptionalExtension, Row};

use crate::Database;
use crate::models::TributeRow;

const TRIBUTE_COLUMNS: &str = "id, memorial_id, author_name, message, status, moderated_by, \
     moderated_at, rejection_reason, submitted_at";

fn map_tribute(row: &Row) -> rusqlite::Result<TributeRow> {
    Ok(TributeRow {
        id: row.get(0)?,
        memorial_id: row.get(1)?,
        author_name: row.get(2)?,
        message: row.get(3)?,
        status: row.get(4)?,
        moderated_by: row.get(5)?,
        moderated_at: row.get(6)?,
        rejection_reason: row.get(7)?,
        submitted_at: row.get(8)?,
    })
}

impl Database {
    pub fn insert_tribute(&self, tribute: &TributeRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tributes (id, memorial_id, author_name, message, status, \
                 moderated_by, moderated_at, rejection_reason, submitted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    tribute.id,
                    tribute.memorial_id,
                    tribute.author_name,
                    tribute.message,
                    tribute.status,
                    tribute.moderated_by,
                    tribute.moderated_at,
                    tribute.rejection_reason,
                    tribute.submitted_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_tribute(&self, id: &str) -> Result<Option<TributeRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM tributes WHERE id = ?1", TRIBUTE_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt.query_row([id], map_tribute).optional()?;
            Ok(row)
        })
    }

    /// Public viewers see approved tributes only; moderators also see the
    /// pending queue. Rejected tributes never leave moderation views.
    pub fn list_tributes(&self, memorial_id: &str, include_pending: bool) -> Result<Vec<TributeRow>> {
        self.with_conn(|conn| {
            let sql = if include_pending {
                format!(
                    "SELECT {} FROM tributes WHERE memorial_id = ?1 AND status != 'rejected' \
                     ORDER BY submitted_at DESC",
                    TRIBUTE_COLUMNS
                )
            } else {
                format!(
                    "SELECT {} FROM tributes WHERE memorial_id = ?1 AND status = 'approved' \
                     ORDER BY submitted_at DESC",
                    TRIBUTE_COLUMNS
                )
            };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([memorial_id], map_tribute)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn moderate_tribute(
        &self,
        id: &str,
        status: &str,
        moderator_id: &str,
        reason: Option<&str>,
        now: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE tributes SET status = ?2, moderated_by = ?3, moderated_at = ?4, \
                 rejection_reason = ?5 WHERE id = ?1",
                rusqlite::params![id, status, moderator_id, now, reason],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MemorialRow, UserRow};

    fn seed(db: &Database) {
        db.create_user(&UserRow {
            id: "u1".to_string(),
            email: "a@x.com".to_string(),
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
        db.insert_memorial(&MemorialRow {
            id: "m1".to_string(),
            owner_id: "u1".to_string(),
            slug: "abcd1234".to_string(),
            status: "public".to_string(),
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
        })
        .unwrap();
    }

    fn tribute(id: &str, status: &str) -> TributeRow {
        TributeRow {
            id: id.to_string(),
            memorial_id: "m1".to_string(),
            author_name: "A Friend".to_string(),
            message: "Fondly remembered.".to_string(),
            status: status.to_string(),
            moderated_by: None,
            moderated_at: None,
            rejection_reason: None,
            submitted_at: "2025-01-02T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn listing_filters_by_moderation_state() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.insert_tribute(&tribute("t1", "approved")).unwrap();
        db.insert_tribute(&tribute("t2", "pending")).unwrap();
        db.insert_tribute(&tribute("t3", "rejected")).unwrap();

        let public = db.list_tributes("m1", false).unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].id, "t1");

        let moderation = db.list_tributes("m1", true).unwrap();
        assert_eq!(moderation.len(), 2);
    }

    #[test]
    fn moderation_records_actor_and_reason() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.insert_tribute(&tribute("t1", "pending")).unwrap();

        db.moderate_tribute("t1", "rejected", "u1", Some("off topic"), "2025-01-03T00:00:00Z")
            .unwrap();

        let row = db.get_tribute("t1").unwrap().unwrap();
        assert_eq!(row.status, "rejected");
        assert_eq!(row.moderated_by.as_deref(), Some("u1"));
        assert_eq!(row.rejection_reason.as_deref(), Some("off topic"));
        assert!(row.moderated_at.is_some());
    }
}
