use crate::error::app_error::AppError;
use rocket::figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE_PATH: &str = "/api";

const DEV_ACCESS_SECRET: &str = "dev-access-secret-change-me";
const DEV_REFRESH_SECRET: &str = "dev-refresh-secret-change-me";
const DEV_ENCRYPTION_KEY: &str = "dev-claim-encryption-key-change-me";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RedisConfig {
    pub url: String,
    /// Seconds to wait for the initial connection before ignition fails.
    pub connection_timeout: u64,
}

/// Secrets and lifetimes for the access/refresh token pair.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub encryption_key: String,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub address: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiConfig {
    pub base_path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/gatehouse".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout: 5,
            run_migrations: false,
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connection_timeout: 5,
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: DEV_ACCESS_SECRET.to_string(),
            refresh_secret: DEV_REFRESH_SECRET.to_string(),
            encryption_key: DEV_ENCRYPTION_KEY.to_string(),
            access_token_ttl_seconds: 5 * 60,
            refresh_token_ttl_seconds: 15 * 60,
        }
    }
}

impl JwtConfig {
    /// Returns the problems that make these secrets unfit for a deployed profile.
    pub fn production_issues(&self) -> Vec<&'static str> {
        let mut issues = Vec::new();
        if self.access_secret.is_empty() || self.access_secret == DEV_ACCESS_SECRET {
            issues.push("jwt.access_secret is unset or uses the development default");
        }
        if self.refresh_secret.is_empty() || self.refresh_secret == DEV_REFRESH_SECRET {
            issues.push("jwt.refresh_secret is unset or uses the development default");
        }
        if self.encryption_key.is_empty() || self.encryption_key == DEV_ENCRYPTION_KEY {
            issues.push("jwt.encryption_key is unset or uses the development default");
        }
        if self.access_secret == self.refresh_secret {
            issues.push("jwt.access_secret and jwt.refresh_secret must differ");
        }
        issues
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            address: "127.0.0.1".to_string(),
            request_timeout_seconds: 15,
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds.max(1))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_API_BASE_PATH.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from multiple sources in priority order:
    /// 1. Gatehouse.toml (base configuration file)
    /// 2. Environment variables prefixed with GATEHOUSE_, nested with `__`
    ///    (e.g. GATEHOUSE_JWT__ACCESS_SECRET)
    /// 3. Legacy variables DATABASE_URL, REDIS_URL, JWT_KEY, JWT_REF_KEY and ENC_KEY
    pub fn load() -> Result<Self, AppError> {
        Ok(Self::figment().extract()?)
    }

    fn figment() -> Figment {
        Figment::from(rocket::figment::providers::Serialized::defaults(Config::default()))
            .merge(Toml::file("Gatehouse.toml").nested())
            .merge(Env::prefixed("GATEHOUSE_").split("__"))
            .merge(Env::raw().only(&["DATABASE_URL", "REDIS_URL", "JWT_KEY", "JWT_REF_KEY", "ENC_KEY"]).map(|key| {
                match key.as_str().to_ascii_uppercase().as_str() {
                    "DATABASE_URL" => "database.url",
                    "REDIS_URL" => "redis.url",
                    "JWT_KEY" => "jwt.access_secret",
                    "JWT_REF_KEY" => "jwt.refresh_secret",
                    _ => "jwt.encryption_key",
                }
                .into()
            }))
    }
}
