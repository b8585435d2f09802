use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    pub connection_string: Option<String>,
    pub max_connections: Option<u32>,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Ceiling for `max_results` on item queries
    pub max_results: usize,
    /// Hex SHA-256 digest of the shared secret expected in `x-api-key`
    pub api_key_hash: Option<String>,
    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgres,
            connection_string: None,
            max_connections: Some(20),
            run_migrations: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            max_results: 500,
            api_key_hash: None,
            cors_origins: vec![
                "http://localhost:8081".to_string(),
                "http://localhost:8001".to_string(),
            ],
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("config").required(false));

        // Environment variables such as MICROMAP_API__MAX_RESULTS=200
        config = config.add_source(
            config::Environment::with_prefix("MICROMAP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("api.cors_origins")
                .try_parsing(true),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the database URL from config or environment
    pub fn database_url(&self) -> String {
        if let Some(connection_string) = &self.database.connection_string {
            return connection_string.clone();
        }

        if let Ok(url) = std::env::var("DATABASE_URL") {
            return url;
        }

        postgres_url_from(|key| std::env::var(key).ok())
    }

    /// Get the server bind address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Assemble a connection URL from the libpq-style PG* variables
fn postgres_url_from(lookup: impl Fn(&str) -> Option<String>) -> String {
    let host = lookup("PGHOSTADDR")
        .or_else(|| lookup("PGHOST"))
        .unwrap_or_else(|| "localhost".to_string());
    let port = lookup("PGPORT").unwrap_or_else(|| "5432".to_string());
    let database = lookup("PGDATABASE").unwrap_or_else(|| "micromap".to_string());
    let user = lookup("PGUSER").unwrap_or_else(|| "postgres".to_string());
    let password = lookup("PGPASSWORD").unwrap_or_else(|| "postgres".to_string());

    format!("postgres://{user}:{password}@{host}:{port}/{database}")
}
