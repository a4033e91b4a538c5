use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rideshare_api::{app, AppState, AuthConfig};
use rideshare_booking::{Collaborators, DispatchMode, EngineSettings, RetryPolicy, RideEngine};
use rideshare_core::policy::CancellationPolicy;
use rideshare_core::repository::{NotificationStore, RideStore};
use rideshare_store::app_config::Config;
use rideshare_store::{DbClient, MemoryNotificationStore, MemoryRideStore, PgNotificationStore, PgRideStore, RedisClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn engine_settings(config: &Config) -> EngineSettings {
    let rules = &config.booking;
    EngineSettings {
        retry: RetryPolicy::new(rules.max_attempts, Duration::from_millis(rules.retry_backoff_ms)),
        policy: CancellationPolicy::from_rate(rules.late_fee_rate),
        pin_window_minutes: rules.pin_window_minutes,
        dispatch: if config.notifications.background {
            DispatchMode::Background
        } else {
            DispatchMode::Inline
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rideshare_api=debug,rideshare_booking=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting rideshare API on port {}", config.server.port);

    let db = DbClient::from_config(&config.database)
        .await
        .context("Failed to connect to Postgres")?;

    let rides: Arc<dyn RideStore>;
    let notifications: Arc<dyn NotificationStore>;
    match db {
        Some(db) => {
            db.migrate().await.context("Failed to run migrations")?;
            rides = Arc::new(PgRideStore::new(db.pool.clone()));
            notifications = Arc::new(PgNotificationStore::new(db.pool.clone()));
        }
        None => {
            tracing::warn!("No database configured, rides are kept in memory");
            rides = Arc::new(MemoryRideStore::new());
            notifications = Arc::new(MemoryNotificationStore::new());
        }
    }

    let redis = match config.redis.url.as_deref() {
        Some(url) => match RedisClient::new(url) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                tracing::warn!("Redis unavailable, rate limiting disabled: {}", e);
                None
            }
        },
        None => None,
    };

    let engine = RideEngine::new(rides, notifications, engine_settings(&config), Collaborators::default());

    let app_state = AppState {
        engine: Arc::new(engine),
        redis,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
