pub mod auth;
pub mod authz;
pub mod error;
pub mod magic;
pub mod mailer;
pub mod memorials;
pub mod middleware;
pub mod routes;
pub mod token;
pub mod tributes;

use std::sync::Arc;

use keepsake_db::Database;

use crate::magic::MagicLinkConfig;
use crate::mailer::Mailer;
use crate::token::TokenKeys;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenKeys,
    pub magic: MagicLinkConfig,
    pub mailer: Mailer,
    /// Base URL the emailed links point at.
    pub frontend_url: String,
}
