//! Inventory Loans Server
//!
//! REST API server for equipment loans and stock reconciliation.

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inventory_loans::{
    api,
    config::AppConfig,
    repository::Repository,
    services::{
        email::EmailService,
        notifications::{LogSink, NotificationSink, NotificationWorker, Notifier},
        reminders::ReminderScheduler,
        Services,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Starting Inventory Loans Server v{}", env!("CARGO_PKG_VERSION"));

    // Create database connection pool
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let repository = Repository::postgres(pool);

    // Notification pipeline
    let (notifier, events) = Notifier::channel(config.notifications.queue_capacity);
    let sink: Arc<dyn NotificationSink> = if config.email.enabled {
        tracing::info!("Email notifications enabled via {}", config.email.smtp_host);
        Arc::new(EmailService::new(config.email.clone()))
    } else {
        tracing::info!("Email notifications disabled, events will be logged");
        Arc::new(LogSink)
    };
    NotificationWorker::new(events, repository.clone(), sink).spawn();

    let services = Services::new(repository, notifier);

    if config.reminders.enabled {
        ReminderScheduler::new(
            services.loans.clone(),
            services.notifier.clone(),
            &config.reminders,
        )
        .context("Invalid reminder settings")?
        .spawn();
    }

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    // Create application state
    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("inventory_loans={},tower_http=debug", config.logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
