use std::path::PathBuf;
use std::time::Duration;

use crate::aggregator::AggregatorSettings;

/// Which document store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub seed_file: Option<PathBuf>,
    pub port: u16,
    pub fetch_timeout_ms: u64,
    pub max_concurrent_customers: usize,
    pub max_concurrent_fetches: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(var: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_backend = match var("STORE_BACKEND")
            .unwrap_or_else(|| "postgres".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        };

        let database_url = var("DB_URL")
            .or_else(|| var("DATABASE_URL"))
            .filter(|s| !s.trim().is_empty());
        if store_backend == StoreBackend::Postgres {
            match database_url {
                None => anyhow::bail!(
                    "DB_URL or DATABASE_URL environment variable required for the postgres backend"
                ),
                Some(ref url)
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") =>
                {
                    anyhow::bail!("DB_URL must start with postgresql:// or postgres://")
                }
                Some(_) => {}
            }
        }

        let config = Self {
            store_backend,
            database_url,
            db_max_connections: parse_positive(&var, "DB_MAX_CONNECTIONS", 10)?,
            seed_file: var("SEED_FILE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            port: var("PORT")
                .unwrap_or_else(|| "2113".to_string())
                .parse()
                .ok()
                .filter(|p: &u16| *p != 0)
                .ok_or_else(|| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            fetch_timeout_ms: parse_positive(&var, "FETCH_TIMEOUT_MS", 5000)?,
            max_concurrent_customers: parse_positive(&var, "MAX_CONCURRENT_CUSTOMERS", 8)?,
            max_concurrent_fetches: parse_positive(&var, "MAX_CONCURRENT_FETCHES", 32)?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Store backend: {:?}", config.store_backend);
        if let Some(ref url) = config.database_url {
            tracing::debug!("Database URL: {}...", &url[..20.min(url.len())]);
        }
        if let Some(ref seed) = config.seed_file {
            tracing::debug!("Seed file: {}", seed.display());
        }
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!(
            "Fetch timeout: {}ms, customer concurrency: {}, fetch concurrency: {}",
            config.fetch_timeout_ms,
            config.max_concurrent_customers,
            config.max_concurrent_fetches
        );

        Ok(config)
    }

    pub fn aggregator_settings(&self) -> AggregatorSettings {
        AggregatorSettings {
            fetch_timeout: Duration::from_millis(self.fetch_timeout_ms),
            max_concurrent_customers: self.max_concurrent_customers,
            max_concurrent_fetches: self.max_concurrent_fetches,
        }
    }
}

fn parse_positive<F, T>(var: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = var(key).filter(|s| !s.trim().is_empty()) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => anyhow::bail!("{} must be a positive integer, got '{}'", key, raw),
    }
}
