use anyhow::Context;
use gatepass_api::{app, AppState, AuthConfig};
use gatepass_core::VnpayGateway;
use gatepass_order::{LogNotifier, OrderNotifier};
use gatepass_store::{
    Config, DbClient, KafkaNotifier, PgCatalogRepository, PgOrderRepository, RedisClient,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gatepass_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Gatepass API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    let notifier: Arc<dyn OrderNotifier> = match &config.kafka {
        Some(kafka) => Arc::new(
            KafkaNotifier::new(kafka).context("Failed to create Kafka producer")?,
        ),
        None => {
            tracing::warn!("Kafka not configured, notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let mut app_state = AppState::new(
        Arc::new(PgOrderRepository::new(db.pool.clone())),
        Arc::new(PgCatalogRepository::new(db.pool.clone())),
        Arc::new(VnpayGateway::new(config.gateway.clone())),
        notifier,
        config.checkout,
        config.store_retry,
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    if let Some(redis) = &config.redis {
        let client = RedisClient::new(&redis.url)
            .await
            .context("Failed to connect to Redis")?;
        app_state = app_state.with_rate_limit(Arc::new(client), config.rate_limit.clone());
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
