mod auth;
mod cache;
mod config;
mod database;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod service;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use error::app_error::AppError;

use crate::auth::password::Argon2Hasher;
use crate::auth::token::TokenIssuer;
use crate::cache::stage_cache;
use crate::db::stage_db;
use crate::middleware::RequestLogger;
use crate::routes as app_routes;
use rocket::{Build, Rocket, catchers, http::Method};
use rocket_cors::{AllowedOrigins, CorsOptions};
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG overrides the configured level, e.g.
    //   RUST_LOG=gatehouse::auth=debug,info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // A subscriber may already be installed when several rockets are built in one process.
    let _ = if json_format { subscriber.json().try_init() } else { subscriber.try_init() };
}

fn ensure_production_secrets(config: &Config) {
    let profile = std::env::var("ROCKET_PROFILE").unwrap_or_else(|_| "debug".to_string());
    if profile == "debug" {
        return;
    }

    let issues = config.jwt.production_issues();
    if !issues.is_empty() {
        panic!("Refusing to start with profile '{}': {}", profile, issues.join("; "));
    }
}

fn build_cors(cors_config: &config::CorsConfig) -> CorsOptions {
    let is_wildcard = cors_config.allowed_origins.len() == 1 && cors_config.allowed_origins[0] == "*";

    if is_wildcard && cors_config.allow_credentials {
        panic!(
            "Invalid CORS configuration: Cannot use wildcard origins (*) with credentials enabled. \
            Either set specific origins or disable credentials."
        );
    }

    let allowed_origins = if cors_config.allowed_origins.is_empty() {
        AllowedOrigins::some_exact::<&str>(&[])
    } else if is_wildcard {
        AllowedOrigins::all()
    } else {
        AllowedOrigins::some_exact(&cors_config.allowed_origins.iter().map(String::as_str).collect::<Vec<_>>())
    };

    CorsOptions {
        allowed_origins,
        allowed_methods: vec![Method::Get, Method::Post, Method::Put, Method::Delete, Method::Options, Method::Head]
            .into_iter()
            .map(From::from)
            .collect(),
        allowed_headers: rocket_cors::AllowedHeaders::some(&["Content-Type", "Authorization", "Accept"]),
        allow_credentials: cors_config.allow_credentials,
        ..Default::default()
    }
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    normalized
}

fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    if base.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

fn mount_api_routes(rocket: Rocket<Build>, base_path: &str) -> Rocket<Build> {
    rocket
        .mount(join_base_path(base_path, "auth"), app_routes::auth::routes())
        .mount(join_base_path(base_path, "users"), app_routes::user::routes())
        .mount(join_base_path(base_path, "health"), app_routes::health::routes())
}

pub fn build_rocket(config: Config) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);
    ensure_production_secrets(&config);

    let cors = match build_cors(&config.cors).to_cors() {
        Ok(cors) => cors,
        Err(e) => panic!("Failed to create CORS fairing: {}", e),
    };

    let figment = rocket::Config::figment()
        .merge(("port", config.server.port))
        .merge(("address", config.server.address.clone()));

    let base_path = normalize_base_path(&config.api.base_path);

    let rocket = rocket::custom(figment)
        .attach(cors)
        .attach(RequestLogger)
        .attach(stage_db(config.database.clone()))
        .attach(stage_cache(config.redis.clone(), config.jwt.access_token_ttl_seconds))
        .manage(TokenIssuer::new(&config.jwt))
        .manage(Argon2Hasher)
        .manage(config);

    mount_api_routes(rocket, &base_path).register(
        base_path.as_str(),
        catchers![
            app_routes::error::bad_request,
            app_routes::error::unauthorized,
            app_routes::error::not_found,
            app_routes::error::conflict,
            app_routes::error::unprocessable_entity,
            app_routes::error::internal_error,
            app_routes::error::service_unavailable
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_is_normalized() {
        assert_eq!(normalize_base_path(""), "/api");
        assert_eq!(normalize_base_path("v1/"), "/v1");
        assert_eq!(normalize_base_path("/api//"), "/api");
        assert_eq!(normalize_base_path("/"), "/");
    }

    #[test]
    fn joined_paths_have_a_single_separator() {
        assert_eq!(join_base_path("/api", "users"), "/api/users");
        assert_eq!(join_base_path("/api/", "/auth"), "/api/auth");
        assert_eq!(join_base_path("/", "health"), "/health");
    }

    #[test]
    #[should_panic(expected = "wildcard origins")]
    fn wildcard_origins_with_credentials_are_refused() {
        build_cors(&config::CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allow_credentials: true,
        });
    }
}
