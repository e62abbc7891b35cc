// PitchLink API Server
// Referral codes and join-request processing for clubs, academies, trainers and agents

mod config;
mod handlers;
mod jwt;
mod middleware;
mod routes;

use anyhow::Context;
use config::{Config, StorageBackend};
use dotenvy::dotenv;
use jwt::JwtService;
use pitchlink_database::{
    Database, DynJoinRequestStore, DynLinkageService, DynPlayerRepository, DynReferralStore,
    InMemoryStore, PgJoinRequestRepository, PgLinkageService, PgPlayerRepository,
    PgReferralRepository,
};
use pitchlink_models::PlayerLookup;
use pitchlink_referral::{
    DynNotificationDispatcher, JoinRequestWorkflow, NotificationPublisher, ReferralRegistry,
    TracingDispatcher, WebhookDispatcher,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::EnvFilter;

pub struct AppState {
    pub storage: StorageBackend,
    pub jwt: JwtService,
    pub registry: ReferralRegistry,
    pub workflow: JoinRequestWorkflow,
}

struct Stores {
    referrals: DynReferralStore,
    requests: DynJoinRequestStore,
    players: DynPlayerRepository,
    linkage: DynLinkageService,
}

impl Stores {
    fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            referrals: store.clone(),
            requests: store.clone(),
            players: store.clone(),
            linkage: store,
        }
    }

    async fn postgres(config: &Config) -> anyhow::Result<Self> {
        tracing::info!("🗄️  Connecting to database...");
        let database = Database::new(config.database.clone())
            .await
            .context("Failed to connect to database")?;
        database.ping().await.context("Database ping failed")?;
        database.migrate().await.context("Database migration failed")?;
        tracing::info!("✅ Database connected");

        let pool = database.pool().clone();
        Ok(Self {
            referrals: Arc::new(PgReferralRepository::new(pool.clone())),
            requests: Arc::new(PgJoinRequestRepository::new(pool.clone())),
            players: Arc::new(PgPlayerRepository::new(pool.clone())),
            linkage: Arc::new(PgLinkageService::new(pool)),
        })
    }
}

impl AppState {
    fn new(
        storage: StorageBackend,
        stores: Stores,
        jwt: JwtService,
        base_url: &str,
        max_code_attempts: usize,
        notifier: NotificationPublisher,
    ) -> Self {
        let registry = ReferralRegistry::new(stores.referrals, base_url)
            .with_max_code_attempts(max_code_attempts);
        let workflow = JoinRequestWorkflow::new(
            registry.clone(),
            stores.requests,
            stores.players,
            stores.linkage,
            notifier,
        );

        Self {
            storage,
            jwt,
            registry,
            workflow,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,pitchlink_api=debug,tower_http=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Players for the memory backend, as a JSON array of `{source, record}`
async fn seed_players(store: &InMemoryStore, path: &str) -> anyhow::Result<usize> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;
    let players: Vec<PlayerLookup> =
        serde_json::from_str(&raw).with_context(|| format!("Invalid player seed file {}", path))?;

    let count = players.len();
    for lookup in players {
        store.put_player(lookup.source, lookup.record).await;
    }
    Ok(count)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv().ok();

    init_tracing();

    tracing::info!("🚀 Starting PitchLink API Server");
    tracing::info!("📦 Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    tracing::info!("🔌 Server: {}:{}", config.server_host, config.server_port);
    tracing::info!("🗃️  Storage backend: {}", config.storage);

    let dispatcher: DynNotificationDispatcher = match (
        &config.notifications.webhook_url,
        &config.notifications.webhook_secret,
    ) {
        (Some(url), Some(secret)) => {
            tracing::info!("📬 Notifications delivered to webhook {}", url);
            Arc::new(WebhookDispatcher::new(url.clone(), secret.clone())?)
        }
        _ => {
            tracing::info!("📬 Notifications written to the log");
            Arc::new(TracingDispatcher)
        }
    };
    let (notifier, dispatcher_handle) = NotificationPublisher::spawn(dispatcher);

    let stores = match config.storage {
        StorageBackend::Postgres => Stores::postgres(&config).await?,
        StorageBackend::Memory => {
            let store = Arc::new(InMemoryStore::new());
            if let Some(path) = &config.memory_seed_file {
                let count = seed_players(&store, path).await?;
                tracing::info!("🌱 Seeded {} players from {}", count, path);
            }
            Stores::in_memory(store)
        }
    };

    let state = Arc::new(AppState::new(
        config.storage,
        stores,
        JwtService::new(&config.jwt_secret),
        &config.base_url,
        config.referral_code_max_attempts,
        notifier,
    ));

    let app = routes::create_router(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("✅ Server ready at http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    dispatcher_handle.abort();
    Ok(())
}
