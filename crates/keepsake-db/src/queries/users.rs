use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::Database;
use crate::models::UserRow;

const USER_COLUMNS: &str = "id, email, name, password_hash, role, custom_permissions, \
     memorial_slots, max_memorials, max_photos_per_memorial, email_verified, \
     email_verification_token, magic_link_token, magic_link_expires, magic_link_uses, \
     password_reset_token, password_reset_expires, pending_email, pending_email_token, \
     pending_email_expires, account_status, deleted_at, last_login, created_at, updated_at";

fn map_user(row: &Row) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        role: row.get(4)?,
        custom_permissions: row.get(5)?,
        memorial_slots: row.get(6)?,
        max_memorials: row.get(7)?,
        max_photos_per_memorial: row.get(8)?,
        email_verified: row.get(9)?,
        email_verification_token: row.get(10)?,
        magic_link_token: row.get(11)?,
        magic_link_expires: row.get(12)?,
        magic_link_uses: row.get(13)?,
        password_reset_token: row.get(14)?,
        password_reset_expires: row.get(15)?,
        pending_email: row.get(16)?,
        pending_email_token: row.get(17)?,
        pending_email_expires: row.get(18)?,
        account_status: row.get(19)?,
        deleted_at: row.get(20)?,
        last_login: row.get(21)?,
        created_at: row.get(22)?,
        updated_at: row.get(23)?,
    })
}

fn query_user_where(conn: &Connection, clause: &str, param: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, clause);
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([param], map_user).optional()?;
    Ok(row)
}

impl Database {
    pub fn create_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, name, password_hash, role, custom_permissions, \
                 memorial_slots, max_memorials, max_photos_per_memorial, email_verified, \
                 email_verification_token, magic_link_token, magic_link_expires, magic_link_uses, \
                 password_reset_token, password_reset_expires, pending_email, pending_email_token, \
                 pending_email_expires, account_status, deleted_at, last_login, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, \
                 ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
                rusqlite::params![
                    user.id,
                    user.email.to_lowercase(),
                    user.name,
                    user.password_hash,
                    user.role,
                    user.custom_permissions,
                    user.memorial_slots,
                    user.max_memorials,
                    user.max_photos_per_memorial,
                    user.email_verified,
                    user.email_verification_token,
                    user.magic_link_token,
                    user.magic_link_expires,
                    user.magic_link_uses,
                    user.password_reset_token,
                    user.password_reset_expires,
                    user.pending_email,
                    user.pending_email_token,
                    user.pending_email_expires,
                    user.account_status,
                    user.deleted_at,
                    user.last_login,
                    user.created_at,
                    user.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Email lookups are case-insensitive: addresses are stored lowercased.
    pub fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let email = email.to_lowercase();
        self.with_conn(|conn| query_user_where(conn, "email = ?1", &email))
    }

    pub fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.find_user_by_email(email)?.is_some())
    }

    pub fn find_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_where(conn, "id = ?1", id))
    }

    pub fn find_user_by_verification_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_where(conn, "email_verification_token = ?1", token))
    }

    pub fn find_user_by_reset_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_where(conn, "password_reset_token = ?1", token))
    }

    /// Magic tokens only authenticate active accounts. Expiry and use-count
    /// checks live in the protocol layer, not here.
    pub fn find_active_user_by_magic_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user_where(
                conn,
                "magic_link_token = ?1 AND account_status = 'active'",
                token,
            )
        })
    }

    pub fn find_user_by_pending_email_token(&self, token: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_where(conn, "pending_email_token = ?1", token))
    }

    /// Consumes the verification token: single use by construction.
    pub fn mark_email_verified(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET email_verified = 1, email_verification_token = NULL, \
                 updated_at = ?2 WHERE id = ?1",
                (id, now),
            )?;
            Ok(())
        })
    }

    pub fn set_last_login(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET last_login = ?2, updated_at = ?2 WHERE id = ?1",
                (id, now),
            )?;
            Ok(())
        })
    }

    pub fn update_password(&self, id: &str, password_hash: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?2, updated_at = ?3 WHERE id = ?1",
                (id, password_hash, now),
            )?;
            Ok(())
        })
    }

    pub fn set_password_reset(&self, id: &str, token: &str, expires: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_reset_token = ?2, password_reset_expires = ?3, \
                 updated_at = ?4 WHERE id = ?1",
                (id, token, expires, now),
            )?;
            Ok(())
        })
    }

    /// Clears the reset token pair and installs the new hash in one step.
    pub fn apply_password_reset(&self, id: &str, password_hash: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_hash = ?2, password_reset_token = NULL, \
                 password_reset_expires = NULL, updated_at = ?3 WHERE id = ?1",
                (id, password_hash, now),
            )?;
            Ok(())
        })
    }

    /// Issuing a fresh magic link resets the use counter, which is what
    /// invalidates any previously issued link for this user.
    pub fn set_magic_link(&self, id: &str, token: &str, expires: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET magic_link_token = ?2, magic_link_expires = ?3, \
                 magic_link_uses = 0, updated_at = ?4 WHERE id = ?1",
                (id, token, expires, now),
            )?;
            Ok(())
        })
    }

    /// Records one consumption. When `clear` is set the token is retired
    /// immediately, even inside its original validity window.
    pub fn record_magic_link_use(&self, id: &str, uses: i64, clear: bool, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            if clear {
                conn.execute(
                    "UPDATE users SET magic_link_uses = ?2, magic_link_token = NULL, \
                     magic_link_expires = NULL, last_login = ?3, updated_at = ?3 WHERE id = ?1",
                    (id, uses, now),
                )?;
            } else {
                conn.execute(
                    "UPDATE users SET magic_link_uses = ?2, last_login = ?3, updated_at = ?3 \
                     WHERE id = ?1",
                    (id, uses, now),
                )?;
            }
            Ok(())
        })
    }

    pub fn set_pending_email(
        &self,
        id: &str,
        new_email: &str,
        token: &str,
        expires: &str,
        now: &str,
    ) -> Result<()> {
        let new_email = new_email.to_lowercase();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET pending_email = ?2, pending_email_token = ?3, \
                 pending_email_expires = ?4, updated_at = ?5 WHERE id = ?1",
                (id, new_email, token, expires, now),
            )?;
            Ok(())
        })
    }

    pub fn apply_pending_email(&self, id: &str, new_email: &str, now: &str) -> Result<()> {
        let new_email = new_email.to_lowercase();
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET email = ?2, pending_email = NULL, pending_email_token = NULL, \
                 pending_email_expires = NULL, updated_at = ?3 WHERE id = ?1",
                (id, new_email, now),
            )?;
            Ok(())
        })
    }

    pub fn set_memorial_slots(&self, id: &str, slots: i64, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET memorial_slots = ?2, updated_at = ?3 WHERE id = ?1",
                (id, slots, now),
            )?;
            Ok(())
        })
    }

    pub fn soft_delete_user(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET account_status = 'deleted', deleted_at = ?2, updated_at = ?2 \
                 WHERE id = ?1",
                (id, now),
            )?;
            Ok(())
        })
    }

    pub fn restore_user(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET account_status = 'active', deleted_at = NULL, updated_at = ?2 \
                 WHERE id = ?1",
                (id, now),
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_user(id: &str, email: &str) -> UserRow {
        UserRow {
            id: id.to_string(),
            email: email.to_string(),
            name: "Test User".to_string(),
            password_hash: None,
            role: "user".to_string(),
            custom_permissions: "[]".to_string(),
            memorial_slots: 0,
            max_memorials: None,
            max_photos_per_memorial: 20,
            email_verified: false,
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
        }
    }

    #[test]
    fn email_lookup_is_case_insensitive() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&blank_user("u1", "Amy@Example.COM")).unwrap();

        let found = db.find_user_by_email("amy@example.com").unwrap().unwrap();
        assert_eq!(found.id, "u1");
        assert_eq!(found.email, "amy@example.com");
        assert!(db.email_exists("AMY@EXAMPLE.COM").unwrap());
    }

    #[test]
    fn duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&blank_user("u1", "a@x.com")).unwrap();
        assert!(db.create_user(&blank_user("u2", "A@X.com")).is_err());
    }

    #[test]
    fn verification_token_is_single_use() {
        let db = Database::open_in_memory().unwrap();
        let mut user = blank_user("u1", "a@x.com");
        user.email_verification_token = Some("tok".to_string());
        db.create_user(&user).unwrap();

        let found = db.find_user_by_verification_token("tok").unwrap().unwrap();
        db.mark_email_verified(&found.id, "2025-01-02T00:00:00Z").unwrap();

        assert!(db.find_user_by_verification_token("tok").unwrap().is_none());
        let reloaded = db.find_user_by_id("u1").unwrap().unwrap();
        assert!(reloaded.email_verified);
        assert!(reloaded.email_verification_token.is_none());
    }

    #[test]
    fn magic_token_lookup_excludes_inactive_accounts() {
        let db = Database::open_in_memory().unwrap();
        let mut user = blank_user("u1", "a@x.com");
        user.magic_link_token = Some("magic".to_string());
        user.account_status = "suspended".to_string();
        db.create_user(&user).unwrap();

        assert!(db.find_active_user_by_magic_token("magic").unwrap().is_none());

        db.restore_user("u1", "2025-01-02T00:00:00Z").unwrap();
        assert!(db.find_active_user_by_magic_token("magic").unwrap().is_some());
    }

    #[test]
    fn record_magic_use_can_retire_token() {
        let db = Database::open_in_memory().unwrap();
        let mut user = blank_user("u1", "a@x.com");
        user.magic_link_token = Some("magic".to_string());
        user.magic_link_expires = Some("2025-06-01T00:00:00Z".to_string());
        db.create_user(&user).unwrap();

        db.record_magic_link_use("u1", 1, false, "2025-01-02T00:00:00Z").unwrap();
        let row = db.find_user_by_id("u1").unwrap().unwrap();
        assert_eq!(row.magic_link_uses, 1);
        assert!(row.magic_link_token.is_some());

        db.record_magic_link_use("u1", 3, true, "2025-01-02T00:01:00Z").unwrap();
        let row = db.find_user_by_id("u1").unwrap().unwrap();
        assert_eq!(row.magic_link_uses, 3);
        assert!(row.magic_link_token.is_none());
        assert!(row.magic_link_expires.is_none());
        assert_eq!(row.last_login.as_deref(), Some("2025-01-02T00:01:00Z"));
    }

    #[test]
    fn only_active_status_counts_as_active() {
        let mut user = blank_user("u1", "a@x.com");
        assert!(user.is_active());

        user.account_status = "suspended".to_string();
        assert!(!user.is_active());
        user.account_status = "deleted".to_string();
        assert!(!user.is_active());
        user.account_status = "mystery".to_string();
        assert!(!user.is_active());
    }

    #[test]
    fn admin_has_every_permission() {
        let mut admin = blank_user("u1", "a@x.com");
        admin.role = "admin".to_string();
        assert!(admin.has_permission("manage_templates"));

        let mut user = blank_user("u2", "b@x.com");
        user.custom_permissions = r#"["manage_templates"]"#.to_string();
        assert!(user.has_permission("manage_templates"));
        assert!(!user.has_permission("manage_users"));
    }

    #[test]
    fn soft_delete_and_restore_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&blank_user("u1", "a@x.com")).unwrap();

        db.soft_delete_user("u1", "2025-01-02T00:00:00Z").unwrap();
        let row = db.find_user_by_id("u1").unwrap().unwrap();
        assert_eq!(row.account_status, "deleted");
        assert!(row.deleted_at.is_some());

        db.restore_user("u1", "2025-01-03T00:00:00Z").unwrap();
        let row = db.find_user_by_id("u1").unwrap().unwrap();
        assert_eq!(row.account_status, "active");
        assert!(row.deleted_at.is_none());
    }
}
