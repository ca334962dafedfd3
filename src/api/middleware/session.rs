use axum::extract::FromRef;
use sqlx::PgPool;
use tower_sessions::{cookie::SameSite, Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::Config;
use crate::services::billing::BillingClient;
use crate::services::mailer::DynMailer;
use crate::services::password::Passwords;

pub const SESSION_COOKIE_NAME: &str = "campusdeals.sid";

/// Session keys used in the application. Each role has its own key, so one
/// browser can hold an admin and a business sign-in side by side.
pub const SESSION_KEY_ADMIN_ID: &str = "admin_id";
pub const SESSION_KEY_BUSINESS_ID: &str = "business_id";
pub const SESSION_KEY_STUDENT_ID: &str = "student_id";

fn configure<S: SessionStore>(store: S, secure: bool) -> SessionManagerLayer<S> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_secure(secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)))
}

/// Creates a session layer backed by PostgreSQL
pub async fn create_session_layer(
    pool: PgPool,
    secure: bool,
) -> Result<SessionManagerLayer<PostgresStore>, sqlx::Error> {
    let session_store = PostgresStore::new(pool);
    session_store.migrate().await?;

    Ok(configure(session_store, secure))
}

#[cfg(test)]
pub(crate) fn memory_session_layer() -> SessionManagerLayer<tower_sessions::MemoryStore> {
    configure(tower_sessions::MemoryStore::default(), false)
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub mailer: DynMailer,
    pub passwords: Passwords,
    pub billing: Option<BillingClient>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> PgPool {
        state.pool.clone()
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    AppState {
        pool: crate::db::unreachable_pool(),
        config: crate::config::test_config(),
        mailer: std::sync::Arc::new(crate::services::mailer::LogMailer),
        passwords: Passwords::new(1024, 1).unwrap(),
        billing: None,
    }
}
