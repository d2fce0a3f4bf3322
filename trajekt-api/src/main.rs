use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trajekt_api::{app, AppState};
use trajekt_booking::notify::{LogSink, NotificationDispatcher};
use trajekt_booking::{BookingEngine, EngineConfig};
use trajekt_domain::repository::BookingStore;
use trajekt_payment::{HttpTransport, PaymentGateway, ReconEngine, RetryPolicy, SignaturePolicy};
use trajekt_store::{Config, DbClient, PgStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trajekt_api=debug,trajekt_booking=debug,trajekt_payment=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Trajekt API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url, config.database.max_connections).await?;
    db.migrate().await?;
    let store: Arc<dyn BookingStore> = Arc::new(PgStore::new(db.pool.clone()));

    let notifier = Arc::new(NotificationDispatcher::new(
        Arc::new(LogSink),
        Duration::from_secs(config.business_rules.notification_dedupe_ttl_secs),
    ));
    let engine = Arc::new(BookingEngine::with_config(
        store,
        notifier.clone(),
        EngineConfig {
            cancellation_cutoff_days: config.business_rules.cancellation_cutoff_days,
            ..EngineConfig::default()
        },
    ));

    let transport = HttpTransport::new(
        config.gateway.base_url.clone(),
        config.gateway.server_key.clone(),
        Duration::from_secs(config.gateway.request_timeout_secs),
    )?;
    let gateway = Arc::new(PaymentGateway::new(
        Arc::new(transport),
        RetryPolicy {
            max_attempts: config.gateway.max_attempts,
            base_delay: Duration::from_millis(config.gateway.base_delay_ms),
        },
    ));

    let policy = if config.unsigned_callbacks_allowed() {
        tracing::warn!("accepting unsigned gateway callbacks, do not run this in production");
        SignaturePolicy::AllowUnsigned
    } else {
        SignaturePolicy::Enforce
    };
    let recon = Arc::new(ReconEngine::new(
        engine.clone(),
        gateway,
        notifier,
        config.gateway.server_key.clone(),
        policy,
        config.business_rules.payment_expiry_minutes,
    ));

    let state = AppState { engine, recon };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
