use carenet_payments::config::{AppConfig, StorageBackend};
use carenet_payments::domain::payment::PaymentMethod;
use carenet_payments::gateways::bkash::BkashGateway;
use carenet_payments::gateways::mock::MockGateway;
use carenet_payments::gateways::nagad::NagadGateway;
use carenet_payments::gateways::GatewayRegistry;
use carenet_payments::http::middleware::rate_limit::RateLimitState;
use carenet_payments::http::routes::{build_router, RouterOptions};
use carenet_payments::repo::audit_log_repo::AuditLogRepo;
use carenet_payments::repo::memory::MemoryStore;
use carenet_payments::repo::payments_repo::PaymentsRepo;
use carenet_payments::repo::session_store::{MemorySessionStore, RedisSessionStore};
use carenet_payments::repo::users_repo::UsersRepo;
use carenet_payments::repo::{AuditLogStore, PaymentStore, SessionStore, UserStore};
use carenet_payments::service::bulk_actions::BulkActionProcessor;
use carenet_payments::service::payment_service::PaymentService;
use carenet_payments::service::user_service::UserService;
use carenet_payments::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

type Stores = (
    Arc<dyn PaymentStore>,
    Arc<dyn UserStore>,
    Arc<dyn AuditLogStore>,
    Arc<dyn SessionStore>,
    Option<redis::Client>,
);

async fn open_stores(cfg: &AppConfig) -> anyhow::Result<Stores> {
    match cfg.storage {
        StorageBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(&cfg.database_url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;

            let redis_client = redis::Client::open(cfg.redis_url.clone())?;
            let sessions = RedisSessionStore {
                redis_client: redis_client.clone(),
                prefix: cfg.session_key_prefix.clone(),
            };
            let payments: Arc<dyn PaymentStore> = Arc::new(PaymentsRepo { pool: pool.clone() });
            let users: Arc<dyn UserStore> = Arc::new(UsersRepo { pool: pool.clone() });
            let audit_log: Arc<dyn AuditLogStore> = Arc::new(AuditLogRepo { pool });
            let sessions: Arc<dyn SessionStore> = Arc::new(sessions);
            Ok((payments, users, audit_log, sessions, Some(redis_client)))
        }
        StorageBackend::Memory => {
            tracing::warn!("STORAGE=memory: records are lost on restart");
            let store = MemoryStore::new();
            let payments: Arc<dyn PaymentStore> = Arc::new(store.clone());
            let users: Arc<dyn UserStore> = Arc::new(store.clone());
            let audit_log: Arc<dyn AuditLogStore> = Arc::new(store);
            let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            Ok((payments, users, audit_log, sessions, None))
        }
    }
}

fn gateway_registry(cfg: &AppConfig) -> GatewayRegistry {
    let mut registry = GatewayRegistry::new()
        .register(
            PaymentMethod::Bkash,
            Arc::new(BkashGateway::new(cfg.bkash.clone(), cfg.gateway_timeout_ms)),
        )
        .register(
            PaymentMethod::Nagad,
            Arc::new(NagadGateway::new(cfg.nagad.clone(), cfg.gateway_timeout_ms)),
        );

    if let Some(behavior) = &cfg.mock_gateway_behavior {
        tracing::warn!(%behavior, "mock gateway serving CARD and BANK_TRANSFER");
        let mock = Arc::new(MockGateway::new(behavior, &cfg.internal_api_key));
        registry = registry
            .register(PaymentMethod::Card, mock.clone())
            .register(PaymentMethod::BankTransfer, mock);
    }
    registry
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let (payments, users, audit_log, sessions, redis_client) = open_stores(&cfg).await?;

    let registry = gateway_registry(&cfg);
    for method in [PaymentMethod::Bkash, PaymentMethod::Nagad] {
        if !registry.supported_methods().contains(&method) {
            tracing::warn!(%method, "gateway credentials missing; method disabled");
        }
    }

    let payment_service =
        PaymentService::new(payments, registry).with_callback_url(cfg.payment_callback_url.clone());
    let user_service = UserService::new(users.clone(), sessions.clone());
    let bulk_actions = BulkActionProcessor::new(users, sessions).with_concurrency(cfg.bulk_concurrency);

    let rate_limit = redis_client.clone().map(|client| RateLimitState {
        redis_client: client,
        max_per_minute: cfg.rate_limit_per_minute,
        key_prefix: "carenet:rate".to_string(),
    });

    let state = AppState {
        payment_service,
        user_service,
        bulk_actions,
        audit_log,
        redis_client,
    };

    let app = build_router(
        state,
        RouterOptions {
            internal_api_key: cfg.internal_api_key.clone(),
            rate_limit,
        },
    )
    .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
