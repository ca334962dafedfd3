use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campusdeals::api::middleware::session::{create_session_layer, AppState};
use campusdeals::config::Config;
use campusdeals::services::{accounts, billing::BillingClient, mailer, password::Passwords};
use campusdeals::{db, jobs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campusdeals=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting CampusDeals server...");

    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let session_layer = create_session_layer(pool.clone(), config.secure_cookies).await?;
    tracing::info!("Session layer initialized");

    let passwords = Passwords::new(config.password_memory_kib, config.password_iterations)?;
    let mailer = mailer::create_mailer(config.smtp.as_ref())?;
    let billing = config
        .stripe_secret_key
        .clone()
        .map(|key| BillingClient::new(&config.stripe_api_base, key));
    if billing.is_none() {
        tracing::warn!("No billing key configured; subscription cancellation is disabled");
    }

    accounts::bootstrap_admin(&pool, &passwords, &config).await?;

    // Kept alive for the lifetime of the server
    let _scheduler = jobs::start_scheduler(pool.clone()).await?;

    let addr = format!("{}:{}", config.host, config.port);

    let state = AppState {
        pool,
        config,
        mailer,
        passwords,
        billing,
    };

    let app = campusdeals::api::app(state)
        .layer(session_layer)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
