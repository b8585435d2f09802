use axum::serve;
use micromap_db_rust::api::routes::build_app;
use micromap_db_rust::config::{AppConfig, StoreBackend};
use micromap_db_rust::seed;
use micromap_db_rust::store::{MemoryStore, PostgresStore, Store};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .parse_default_env()
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{} backend={:?}",
        config.server.host,
        config.server.port,
        config.database.backend
    );

    if config.api.api_key_hash.is_none() {
        log::warn!("No api.api_key_hash configured; every write request will be refused");
    }

    match config.database.backend {
        StoreBackend::Postgres => {
            log::info!("Connecting to PostgreSQL...");
            let database_url = config.database_url();
            let postgres_store = PostgresStore::new(
                &database_url,
                config.database.max_connections.unwrap_or(20),
            )
            .await?;

            if config.database.run_migrations {
                log::info!("Running database migrations...");
                postgres_store.migrate().await?;
            }

            run_server(Arc::new(postgres_store), &config).await
        }
        StoreBackend::Memory => {
            log::info!("Using in-memory store; data is lost on shutdown");
            run_server(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn run_server<S: Store + 'static>(store: Arc<S>, config: &AppConfig) -> anyhow::Result<()> {
    // Load seed data for demonstration (optional)
    if std::env::var("LOAD_SEED_DATA").unwrap_or_default() == "true" {
        log::info!("Loading seed data...");
        seed::load_seed_data(store.as_ref()).await?;
    }

    let app = build_app(store, config.api.clone());

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("MicroMap server running on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}
