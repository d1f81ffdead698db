use crate::auth::session_registry::SessionRegistry;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::scope::Deadline;
use crate::error::app_error::AppError;
use crate::models::health::HealthResponse;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{State, get, routes};
use std::future::Future;
use tracing::warn;

/// Reports whether Postgres and the session cache answer
#[get("/")]
pub async fn healthcheck(
    repo: &State<PostgresRepository>,
    sessions: &State<SessionRegistry>,
    deadline: Deadline,
) -> (Status, Json<HealthResponse>) {
    let health = check_dependencies(deadline, repo.ping(), sessions.ping()).await;
    let status = if health.is_healthy() { Status::Ok } else { Status::ServiceUnavailable };
    (status, Json(health))
}

/// A dependency that does not answer before the deadline counts as down.
async fn check_dependencies<D, C>(deadline: Deadline, database: D, cache: C) -> HealthResponse
where
    D: Future<Output = Result<(), AppError>>,
    C: Future<Output = Result<(), AppError>>,
{
    let (database, cache) = tokio::join!(deadline.bound(database), deadline.bound(cache));

    if let Err(e) = &database {
        warn!(error = ?e, "health check: database unreachable");
    }
    if let Err(e) = &cache {
        warn!(error = ?e, "health check: session cache unreachable");
    }

    HealthResponse::from_checks(database.is_ok(), cache.is_ok())
}

pub fn routes() -> Vec<rocket::Route> {
    routes![healthcheck]
}
