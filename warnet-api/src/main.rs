use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warnet_api::{app, worker, AppState};
use warnet_catalog::{PricingEngine, StaticVenueCatalog};
use warnet_core::{BroadcastPublisher, EventPublisher, FanoutPublisher, MockPaymentGateway, SystemClock};
use warnet_order::{InMemoryRepository, RemoteSource, SessionOrchestrator, SnapshotRepository};
use warnet_store::{Config, EventProducer, RedisRemoteSource, RedisRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warnet_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting Warnet API on port {}", config.server.port);

    let repo: Arc<dyn SnapshotRepository> = match &config.redis.url {
        Some(url) => Arc::new(RedisRepository::new(url, &config.redis.key_prefix)?),
        None => {
            tracing::warn!("No redis.url configured, state is kept in memory only");
            Arc::new(InMemoryRepository::new())
        }
    };

    // SSE fan-out always; Kafka when brokers are configured
    let events = BroadcastPublisher::new(256);
    let mut sinks: Vec<Arc<dyn EventPublisher>> = vec![Arc::new(events.clone())];
    if let Some(brokers) = &config.kafka.brokers {
        sinks.push(Arc::new(EventProducer::new(brokers, &config.kafka.topic)?));
    }

    let rules = config.business_rules.clone();
    let orchestrator = Arc::new(SessionOrchestrator::new(
        rules.booking_policy(),
        PricingEngine::default(),
        repo,
        Arc::new(StaticVenueCatalog::new(config.venues.clone())),
        Arc::new(FanoutPublisher::new(sinks)),
        Arc::new(SystemClock),
    ));
    orchestrator.load().await?;

    tokio::spawn(worker::start_tick_worker(orchestrator.clone(), rules.tick_interval()));

    if let (Some(url), Some(key)) = (&config.redis.url, &config.redis.remote_snapshot_key) {
        let source: Arc<dyn RemoteSource> = Arc::new(RedisRemoteSource::new(url, key)?);
        tokio::spawn(worker::start_reconcile_worker(
            orchestrator.clone(),
            source,
            rules.reconcile_interval(),
        ));
    }

    let app_state = AppState {
        orchestrator,
        payments: Arc::new(MockPaymentGateway),
        events,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(app_state)).await?;
    Ok(())
}
