pub mod claim_codec;
pub mod password;
pub mod session_registry;
pub mod token;

use crate::auth::session_registry::SessionRegistry;
use crate::auth::token::{Identity, ParsedToken, TokenIssuer};
use crate::error::app_error::AppError;
use crate::middleware::request_deadline;
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use serde::Serialize;
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";

/// Authenticated caller. Only produced for a valid access token whose
/// account still has a live session.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub role_id: i64,
}

impl CurrentUser {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            role_id: self.role_id,
        }
    }
}

/// Caller of the logout endpoint. Expired access tokens are accepted here so
/// a client can always end its session.
#[derive(Debug, Clone)]
pub struct LogoutBearer {
    pub identity: Identity,
    pub token: String,
}

/// Why a guard refused the request; read back by the 401 catcher.
#[derive(Debug, Clone)]
pub struct AuthFailure {
    pub code: &'static str,
    pub message: String,
}

impl From<&AppError> for AuthFailure {
    fn from(e: &AppError) -> Self {
        Self {
            code: e.reason_code(),
            message: e.to_string(),
        }
    }
}

pub(crate) fn bearer_token(header: Option<&str>) -> Result<&str, AppError> {
    match header.and_then(|value| value.strip_prefix(BEARER_PREFIX)).map(str::trim) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(AppError::MissingBearerToken),
    }
}

/// Resolves an access token to the caller. An expired token also ends the
/// session it was bound to.
pub(crate) async fn authenticate(token: &str, issuer: &TokenIssuer, sessions: &SessionRegistry) -> Result<CurrentUser, AppError> {
    match issuer.parse_access(token) {
        ParsedToken::Valid(verified) => {
            let identity = verified.identity;
            if !sessions.is_active(identity.id).await? {
                debug!(user_id = identity.id, "access token has no live session");
                return Err(AppError::InvalidAccessToken);
            }
            Ok(CurrentUser {
                id: identity.id,
                role_id: identity.role_id,
            })
        }
        ParsedToken::Expired(verified) => {
            sessions.invalidate(verified.identity.id).await?;
            Err(AppError::AccessTokenExpired)
        }
        ParsedToken::Malformed => Err(AppError::InvalidAccessToken),
    }
}

pub(crate) fn logout_identity(token: &str, issuer: &TokenIssuer) -> Result<Identity, AppError> {
    issuer.parse_access(token).identity().ok_or(AppError::InvalidAccessToken)
}

fn reject<T>(req: &Request<'_>, err: AppError) -> RequestOutcome<T, AppError> {
    let status = Status::from(&err);
    if status == Status::Unauthorized {
        req.local_cache(|| Some(AuthFailure::from(&err)));
    }
    Outcome::Error((status, err))
}

fn managed<'r, T: Send + Sync + 'static>(req: &'r Request<'_>, name: &'static str) -> Result<&'r T, AppError> {
    req.rocket().state::<T>().ok_or(AppError::MissingState(name))
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let resolved = async {
            let token = bearer_token(req.headers().get_one("Authorization"))?;
            let issuer = managed::<TokenIssuer>(req, "TokenIssuer")?;
            let sessions = managed::<SessionRegistry>(req, "SessionRegistry")?;
            request_deadline(req).bound(authenticate(token, issuer, sessions)).await
        };

        match resolved.await {
            Ok(current_user) => {
                req.local_cache(|| Some(current_user));
                Outcome::Success(current_user)
            }
            Err(err) => reject(req, err),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for LogoutBearer {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let resolved = bearer_token(req.headers().get_one("Authorization")).and_then(|token| {
            let issuer = managed::<TokenIssuer>(req, "TokenIssuer")?;
            let identity = logout_identity(token, issuer)?;
            Ok(LogoutBearer {
                identity,
                token: token.to_string(),
            })
        });

        match resolved {
            Ok(bearer) => Outcome::Success(bearer),
            Err(err) => reject(req, err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::test_utils::{InMemoryCache, device};
    use std::sync::Arc;

    fn fixture() -> (TokenIssuer, SessionRegistry) {
        let cache = Arc::new(InMemoryCache::default());
        (TokenIssuer::new(&JwtConfig::default()), SessionRegistry::new(cache, 300))
    }

    fn expired_issuer() -> TokenIssuer {
        TokenIssuer::new(&JwtConfig {
            access_token_ttl_seconds: -60,
            ..JwtConfig::default()
        })
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert_eq!(bearer_token(Some("Bearer abc.def")).unwrap(), "abc.def");
        assert!(matches!(bearer_token(Some("abc.def")), Err(AppError::MissingBearerToken)));
        assert!(matches!(bearer_token(Some("Bearer   ")), Err(AppError::MissingBearerToken)));
        assert!(matches!(bearer_token(None), Err(AppError::MissingBearerToken)));
    }

    #[tokio::test]
    async fn valid_token_with_live_session_authenticates() {
        let (issuer, sessions) = fixture();
        let identity = Identity { id: 7, role_id: 3 };
        let pair = issuer.issue(identity).unwrap();
        sessions.bind(7, &device("ip", "ua"), &pair.access_token).await.unwrap();

        let user = authenticate(&pair.access_token, &issuer, &sessions).await.unwrap();

        assert_eq!(user.identity(), identity);
    }

    #[tokio::test]
    async fn valid_token_without_session_is_rejected() {
        let (issuer, sessions) = fixture();
        let pair = issuer.issue(Identity { id: 7, role_id: 3 }).unwrap();

        let result = authenticate(&pair.access_token, &issuer, &sessions).await;

        assert!(matches!(result, Err(AppError::InvalidAccessToken)));
    }

    #[tokio::test]
    async fn expired_token_ends_the_session() {
        let (_, sessions) = fixture();
        let issuer = expired_issuer();
        let pair = issuer.issue(Identity { id: 7, role_id: 3 }).unwrap();
        sessions.bind(7, &device("ip", "ua"), &pair.access_token).await.unwrap();

        let result = authenticate(&pair.access_token, &issuer, &sessions).await;

        assert!(matches!(result, Err(AppError::AccessTokenExpired)));
        assert!(!sessions.is_active(7).await.unwrap());
    }

    #[tokio::test]
    async fn garbage_token_is_invalid() {
        let (issuer, sessions) = fixture();
        let result = authenticate("not-a-token", &issuer, &sessions).await;
        assert!(matches!(result, Err(AppError::InvalidAccessToken)));
    }

    #[test]
    fn logout_accepts_expired_tokens_but_not_garbage() {
        let issuer = expired_issuer();
        let pair = issuer.issue(Identity { id: 9, role_id: 1 }).unwrap();

        assert_eq!(logout_identity(&pair.access_token, &issuer).unwrap().id, 9);
        assert!(matches!(logout_identity("garbage", &issuer), Err(AppError::InvalidAccessToken)));
    }

    #[test]
    fn auth_failure_carries_the_reason_code() {
        let failure = AuthFailure::from(&AppError::AccessTokenExpired);
        assert_eq!(failure.code, "access_token_is_expired");
    }
}
