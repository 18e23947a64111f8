use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use keepsake_api::magic::{self, MagicLinkConfig};
use keepsake_api::mailer::{MailConfig, Mailer};
use keepsake_api::routes::build_router;
use keepsake_api::token::{self, TokenKeys};
use keepsake_api::{AppState, AppStateInner};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn mail_config_from_env() -> Option<MailConfig> {
    let api_url = std::env::var("KEEPSAKE_MAIL_API_URL").ok()?;
    let api_key = std::env::var("KEEPSAKE_MAIL_API_KEY").ok()?;
    Some(MailConfig {
        api_url,
        api_key,
        from_email: env_or("KEEPSAKE_MAIL_FROM", "noreply@keepsake.local"),
        from_name: std::env::var("KEEPSAKE_MAIL_FROM_NAME").ok(),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keepsake=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret = env_or("KEEPSAKE_JWT_SECRET", "dev-secret-change-me");
    let session_expiry = env_parse("KEEPSAKE_SESSION_EXPIRY_SECS", token::DEFAULT_SESSION_EXPIRY_SECS);
    let db_path = env_or("KEEPSAKE_DB_PATH", "keepsake.db");
    let host = env_or("KEEPSAKE_HOST", "0.0.0.0");
    let port: u16 = env_parse("KEEPSAKE_PORT", 3000);
    let frontend_url = env_or("KEEPSAKE_FRONTEND_URL", "http://localhost:5173");

    let magic = MagicLinkConfig {
        max_uses: env_parse("KEEPSAKE_MAGIC_LINK_MAX_USES", magic::DEFAULT_MAX_USES),
        expiry_secs: env_parse("KEEPSAKE_MAGIC_LINK_EXPIRY_SECS", magic::DEFAULT_EXPIRY_SECS),
    };

    let mailer = Mailer::new(mail_config_from_env());
    if !mailer.is_configured() {
        warn!("Outbound mail not configured; verification and login links will only be logged");
    }

    // Init database
    let db = keepsake_db::Database::open(Path::new(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenKeys::new(&jwt_secret, session_expiry),
        magic,
        mailer,
        frontend_url,
    });

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Keepsake server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
