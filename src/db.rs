use crate::config::DatabaseConfig;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::unit_of_work::UnitOfWork;
use rocket::fairing::AdHoc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

async fn init_pool(db_config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .min_connections(db_config.min_connections)
        .acquire_timeout(Duration::from_secs(db_config.acquire_timeout))
        .idle_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .connect(&db_config.url)
        .await
}

/// Connects the pool, optionally migrates, and manages the pool together with
/// the repository and unit of work built on it.
pub fn stage_db(db_config: DatabaseConfig) -> AdHoc {
    AdHoc::try_on_ignite("Postgres (sqlx)", |rocket| async move {
        let pool = match init_pool(&db_config).await {
            Ok(pool) => pool,
            Err(e) => {
                tracing::error!(error = ?e, "Failed to initialize database pool");
                return Err(rocket);
            }
        };
        tracing::info!("Database pool initialized successfully");

        if db_config.run_migrations {
            if let Err(e) = sqlx::migrate!().run(&pool).await {
                tracing::error!(error = ?e, "Database migration failed");
                return Err(rocket);
            }
            tracing::info!("Database migrations applied");
        }

        Ok(rocket
            .manage(PostgresRepository::new(pool.clone()))
            .manage(UnitOfWork::new(pool.clone()))
            .manage(pool))
    })
}
