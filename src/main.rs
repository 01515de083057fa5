use std::sync::Arc;

use parcelhub::api::router::create_router;
use parcelhub::config::AppConfig;
use parcelhub::db::{self, MemoryStore, PgStore, Store};
use parcelhub::models::Catalog;
use parcelhub::payments::{DryRunGateway, HttpGateway, PaymentGateway};
use parcelhub::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("Database connected, migrations applied");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    let catalog = match &config.catalog_path {
        Some(path) => {
            let catalog = Catalog::from_file(path)?;
            tracing::info!(path = %path, "Catalog loaded");
            catalog
        }
        None => Catalog::default(),
    };

    let gateway: Arc<dyn PaymentGateway> = match (&config.payment_gateway_url, &config.payment_gateway_key) {
        (Some(url), Some(key)) => {
            tracing::info!(url = %url, "Payment gateway configured");
            Arc::new(HttpGateway::new(reqwest::Client::new(), url.clone(), key.clone()))
        }
        _ => {
            tracing::warn!("No payment gateway credentials, payments will run in dry-run mode");
            Arc::new(DryRunGateway::new(config.processor_fee_rule()))
        }
    };

    if config.payment_webhook_secret.is_none() {
        tracing::warn!("PAYMENT_WEBHOOK_SECRET not set, capture callbacks are not signature-checked");
    }

    tracing::info!(
        commission = ?config.commission_rule(),
        payment_timeout_secs = config.payment_timeout().as_secs(),
        "Workflow configured"
    );

    let state = AppState::new(store, catalog, config, gateway);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
