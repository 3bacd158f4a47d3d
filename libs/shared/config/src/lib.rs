use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the database-service. Empty means the embedded store is used.
    pub database_service_url: String,
    pub jwt_secret: String,
    pub request_timeout_ms: u64,
    pub port: u16,
    /// Optional JSON file with doctors and users loaded into the embedded store.
    pub embedded_seed_path: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            database_service_url: env::var("DATABASE_SERVICE_URL")
                .unwrap_or_else(|_| {
                    warn!("DATABASE_SERVICE_URL not set, using embedded store");
                    String::new()
                }),
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("JWT_SECRET not set, using empty value");
                    String::new()
                }),
            request_timeout_ms: parse_or_default("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS),
            port: parse_or_default("PORT", DEFAULT_PORT),
            embedded_seed_path: env::var("EMBEDDED_SEED_PATH").unwrap_or_default(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.jwt_secret.is_empty()
    }

    pub fn uses_embedded_store(&self) -> bool {
        self.database_service_url.trim().is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
