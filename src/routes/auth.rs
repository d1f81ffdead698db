use crate::auth::LogoutBearer;
use crate::auth::password::Argon2Hasher;
use crate::auth::session_registry::SessionRegistry;
use crate::auth::token::TokenIssuer;
use crate::database::postgres_repository::PostgresRepository;
use crate::database::scope::Deadline;
use crate::error::app_error::AppError;
use crate::models::auth::{LoginRequest, LoginResponse, LogoutResponse, RefreshTokenRequest, TokenPairResponse};
use crate::models::session::ClientDevice;
use crate::service::auth::AuthService;
use rocket::serde::json::Json;
use rocket::{State, post, routes};
use validator::Validate;

/// Exchange credentials for a token pair bound to the calling device
#[post("/login", data = "<payload>")]
pub async fn login(
    repo: &State<PostgresRepository>,
    hasher: &State<Argon2Hasher>,
    issuer: &State<TokenIssuer>,
    sessions: &State<SessionRegistry>,
    device: ClientDevice,
    deadline: Deadline,
    payload: Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    payload.validate()?;

    let service = AuthService::new(repo.inner(), hasher.inner(), issuer.inner(), sessions.inner());
    let response = deadline.bound(service.login(&payload, &device)).await?;
    Ok(Json(response))
}

/// Trade a (possibly expired) access token and a valid refresh token for a new pair
#[post("/refresh-token", data = "<payload>")]
pub async fn refresh_token(
    repo: &State<PostgresRepository>,
    hasher: &State<Argon2Hasher>,
    issuer: &State<TokenIssuer>,
    sessions: &State<SessionRegistry>,
    device: ClientDevice,
    deadline: Deadline,
    payload: Json<RefreshTokenRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    payload.validate()?;

    let service = AuthService::new(repo.inner(), hasher.inner(), issuer.inner(), sessions.inner());
    let pair = deadline.bound(service.refresh(&payload, &device)).await?;
    Ok(Json(pair))
}

#[post("/logout")]
pub async fn logout(
    repo: &State<PostgresRepository>,
    hasher: &State<Argon2Hasher>,
    issuer: &State<TokenIssuer>,
    sessions: &State<SessionRegistry>,
    deadline: Deadline,
    bearer: LogoutBearer,
) -> Result<Json<LogoutResponse>, AppError> {
    let service = AuthService::new(repo.inner(), hasher.inner(), issuer.inner(), sessions.inner());
    let response = deadline.bound(service.logout(bearer.identity, &bearer.token)).await?;
    Ok(Json(response))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login, refresh_token, logout]
}
