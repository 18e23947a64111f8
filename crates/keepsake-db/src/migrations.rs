use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id                          TEXT PRIMARY KEY,
            email                       TEXT NOT NULL UNIQUE,
            name                        TEXT NOT NULL,
            password_hash               TEXT,
            role                        TEXT NOT NULL DEFAULT 'user',
            custom_permissions          TEXT NOT NULL DEFAULT '[]',
            memorial_slots              INTEGER NOT NULL DEFAULT 0,
            max_memorials               INTEGER,
            max_photos_per_memorial     INTEGER NOT NULL DEFAULT 20,
            email_verified              INTEGER NOT NULL DEFAULT 0,
            email_verification_token    TEXT,
            magic_link_token            TEXT,
            magic_link_expires          TEXT,
            magic_link_uses             INTEGER NOT NULL DEFAULT 0,
            password_reset_token        TEXT,
            password_reset_expires      TEXT,
            pending_email               TEXT,
            pending_email_token         TEXT,
            pending_email_expires       TEXT,
            account_status              TEXT NOT NULL DEFAULT 'active',
            deleted_at                  TEXT,
            last_login                  TEXT,
            created_at                  TEXT NOT NULL,
            updated_at                  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_users_verification_token
            ON users(email_verification_token);
        CREATE INDEX IF NOT EXISTS idx_users_magic_token
            ON users(magic_link_token);
        CREATE INDEX IF NOT EXISTS idx_users_reset_token
            ON users(password_reset_token);

        CREATE TABLE IF NOT EXISTS memorials (
            id              TEXT PRIMARY KEY,
            owner_id        TEXT NOT NULL REFERENCES users(id),
            slug            TEXT NOT NULL UNIQUE,
            status          TEXT NOT NULL DEFAULT 'unpublished',
            password        TEXT,
            full_name       TEXT NOT NULL,
            birth_date      TEXT,
            death_date      TEXT,
            show_dates      INTEGER NOT NULL DEFAULT 1,
            profile_photo   TEXT NOT NULL DEFAULT '{}',
            cover_photo     TEXT NOT NULL DEFAULT '{}',
            biography       TEXT NOT NULL DEFAULT '{}',
            gallery         TEXT NOT NULL DEFAULT '{}',
            timeline        TEXT NOT NULL DEFAULT '{}',
            family_members  TEXT NOT NULL DEFAULT '[]',
            show_family     INTEGER NOT NULL DEFAULT 1,
            favorites       TEXT NOT NULL DEFAULT '[]',
            show_favorites  INTEGER NOT NULL DEFAULT 1,
            theme           TEXT NOT NULL DEFAULT '{}',
            view_count      INTEGER NOT NULL DEFAULT 0,
            unique_views    INTEGER NOT NULL DEFAULT 0,
            share_counts    TEXT NOT NULL DEFAULT '{}',
            in_trash        INTEGER NOT NULL DEFAULT 0,
            trashed_at      TEXT,
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_memorials_owner
            ON memorials(owner_id, in_trash, created_at);

        CREATE TABLE IF NOT EXISTS memorial_managers (
            memorial_id         TEXT NOT NULL REFERENCES memorials(id),
            user_id             TEXT NOT NULL REFERENCES users(id),
            can_edit            INTEGER NOT NULL DEFAULT 1,
            can_moderate        INTEGER NOT NULL DEFAULT 1,
            can_manage_gallery  INTEGER NOT NULL DEFAULT 1,
            invited_at          TEXT NOT NULL,
            accepted_at         TEXT,
            UNIQUE(memorial_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS tributes (
            id                  TEXT PRIMARY KEY,
            memorial_id         TEXT NOT NULL REFERENCES memorials(id),
            author_name         TEXT NOT NULL,
            message             TEXT NOT NULL,
            status              TEXT NOT NULL DEFAULT 'pending',
            moderated_by        TEXT REFERENCES users(id),
            moderated_at        TEXT,
            rejection_reason    TEXT,
            submitted_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tributes_memorial
            ON tributes(memorial_id, status, submitted_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
