use crate::auth::password::CredentialHasher;
use crate::auth::session_registry::SessionRegistry;
use crate::auth::token::{Identity, TokenIssuer};
use crate::database::user::CredentialStore;
use crate::error::app_error::AppError;
use crate::models::auth::{LoginRequest, LoginResponse, LogoutResponse, RefreshTokenRequest, TokenPairResponse};
use crate::models::session::ClientDevice;
use crate::models::user::UserResponse;
use tracing::{info, warn};

pub const LOGOUT_SUCCESS: &str = "Logout successful";
pub const LOGOUT_ALREADY_ELSEWHERE: &str = "Account was already logged out elsewhere";

pub struct AuthService<'a> {
    credentials: &'a dyn CredentialStore,
    hasher: &'a dyn CredentialHasher,
    tokens: &'a TokenIssuer,
    sessions: &'a SessionRegistry,
}

impl<'a> AuthService<'a> {
    pub fn new(credentials: &'a dyn CredentialStore, hasher: &'a dyn CredentialHasher, tokens: &'a TokenIssuer, sessions: &'a SessionRegistry) -> Self {
        Self {
            credentials,
            hasher,
            tokens,
            sessions,
        }
    }

    /// Verifies credentials, enforces the single-device rule and binds a new
    /// session to the issued access token.
    pub async fn login(&self, request: &LoginRequest, device: &ClientDevice) -> Result<LoginResponse, AppError> {
        let Some(user) = self.credentials.find_by_username_or_email(&request.username).await? else {
            self.hasher.dummy_verify(&request.password);
            warn!("login rejected: unknown account");
            return Err(AppError::InvalidCredentials);
        };

        if !user.is_active {
            warn!(user_id = user.id, "login rejected: account inactive");
            return Err(AppError::AccountInactive);
        }

        if !self.hasher.verify_password(&request.password, &user.password_hash)? {
            warn!(user_id = user.id, "login rejected: wrong password");
            return Err(AppError::InvalidCredentials);
        }

        if !self.sessions.check_device(user.id, device).await? {
            warn!(user_id = user.id, ip = %device.ip_address, "login rejected: session active on another device");
            return Err(AppError::AlreadyLoggedInElsewhere);
        }

        let pair = self.tokens.issue(Identity {
            id: user.id,
            role_id: user.role_id,
        })?;
        self.sessions.bind(user.id, device, &pair.access_token).await?;
        info!(user_id = user.id, "user logged in");

        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            profile: UserResponse::from(&user),
        })
    }

    /// Exchanges a token pair and rebinds the session to the new access token.
    /// The device is recorded but not checked.
    pub async fn refresh(&self, request: &RefreshTokenRequest, device: &ClientDevice) -> Result<TokenPairResponse, AppError> {
        let (identity, pair) = self.tokens.refresh(&request.access_token, &request.refresh_token)?;

        self.sessions.invalidate(identity.id).await?;
        self.sessions.bind(identity.id, device, &pair.access_token).await?;
        info!(user_id = identity.id, "token pair refreshed");

        Ok(pair.into())
    }

    /// A token superseded by a later login is not an error: the session it
    /// belonged to is already gone.
    pub async fn logout(&self, identity: Identity, presented_token: &str) -> Result<LogoutResponse, AppError> {
        if !self.sessions.validate_logout(identity.id, presented_token).await? {
            info!(user_id = identity.id, "logout with superseded token");
            return Ok(LogoutResponse {
                message: LOGOUT_ALREADY_ELSEWHERE.to_string(),
            });
        }

        self.sessions.invalidate(identity.id).await?;
        info!(user_id = identity.id, "user logged out");
        Ok(LogoutResponse {
            message: LOGOUT_SUCCESS.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Argon2Hasher;
    use crate::auth::token::ParsedToken;
    use crate::config::JwtConfig;
    use crate::test_utils::{InMemoryCache, MockCredentialStore, device, sample_user};
    use std::sync::Arc;

    struct Fixture {
        store: MockCredentialStore,
        cache: Arc<InMemoryCache>,
        issuer: TokenIssuer,
        sessions: SessionRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let hash = Argon2Hasher.hash_password("s3cret-pass").unwrap();
            let mut inactive = sample_user(2, "dormant", &hash);
            inactive.is_active = false;
            let store = MockCredentialStore::new(vec![sample_user(1, "admin", &hash), inactive]);
            let cache = Arc::new(InMemoryCache::default());
            let sessions = SessionRegistry::new(cache.clone(), 300);
            Self {
                store,
                cache,
                issuer: TokenIssuer::new(&JwtConfig::default()),
                sessions,
            }
        }

        fn service(&self) -> AuthService<'_> {
            AuthService::new(&self.store, &Argon2Hasher, &self.issuer, &self.sessions)
        }
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn login_issues_tokens_and_binds_the_session() {
        let fx = Fixture::new();
        let laptop = device("10.0.0.1", "firefox");

        let response = fx.service().login(&login("admin", "s3cret-pass"), &laptop).await.unwrap();

        assert_eq!(response.profile.id, 1);
        assert!(matches!(fx.issuer.parse_access(&response.access_token), ParsedToken::Valid(_)));
        let record = fx.sessions.record(1).await.unwrap().unwrap();
        assert_eq!(record.current_access_token, response.access_token);
        assert_eq!(record.ip_address, "10.0.0.1");
    }

    #[tokio::test]
    async fn login_accepts_email_as_username() {
        let fx = Fixture::new();
        let response = fx.service().login(&login("admin@example.com", "s3cret-pass"), &device("ip", "ua")).await;
        assert!(response.is_ok());
    }

    #[tokio::test]
    async fn unknown_account_and_wrong_password_look_the_same() {
        let fx = Fixture::new();
        let unknown = fx.service().login(&login("ghost", "s3cret-pass"), &device("ip", "ua")).await;
        let wrong = fx.service().login(&login("admin", "nope"), &device("ip", "ua")).await;
        assert!(matches!(unknown, Err(AppError::InvalidCredentials)));
        assert!(matches!(wrong, Err(AppError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn inactive_account_gets_no_tokens_and_leaves_the_registry_alone() {
        let fx = Fixture::new();
        let result = fx.service().login(&login("dormant", "s3cret-pass"), &device("ip", "ua")).await;

        assert!(matches!(result, Err(AppError::AccountInactive)));
        assert_eq!(fx.cache.operations(), 0);
    }

    #[tokio::test]
    async fn second_device_is_rejected_while_the_first_is_active() {
        let fx = Fixture::new();
        fx.service().login(&login("admin", "s3cret-pass"), &device("10.0.0.1", "firefox")).await.unwrap();

        let other = fx.service().login(&login("admin", "s3cret-pass"), &device("10.0.0.2", "firefox")).await;
        assert!(matches!(other, Err(AppError::AlreadyLoggedInElsewhere)));

        let same = fx.service().login(&login("admin", "s3cret-pass"), &device("10.0.0.1", "firefox")).await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn refresh_rebinds_the_session_to_the_new_access_token() {
        let fx = Fixture::new();
        let laptop = device("10.0.0.1", "firefox");
        let first = fx.service().login(&login("admin", "s3cret-pass"), &laptop).await.unwrap();

        let fresh = fx
            .service()
            .refresh(
                &RefreshTokenRequest {
                    access_token: first.access_token.clone(),
                    refresh_token: first.refresh_token.clone(),
                },
                &laptop,
            )
            .await
            .unwrap();

        let record = fx.sessions.record(1).await.unwrap().unwrap();
        assert_eq!(record.current_access_token, fresh.access_token);
    }

    #[tokio::test]
    async fn logout_invalidates_the_current_session() {
        let fx = Fixture::new();
        let response = fx.service().login(&login("admin", "s3cret-pass"), &device("ip", "ua")).await.unwrap();
        let identity = Identity { id: 1, role_id: 1 };

        let logout = fx.service().logout(identity, &response.access_token).await.unwrap();

        assert_eq!(logout.message, LOGOUT_SUCCESS);
        assert!(!fx.sessions.is_active(1).await.unwrap());
    }

    #[tokio::test]
    async fn logout_with_a_superseded_token_succeeds_without_touching_the_session() {
        let fx = Fixture::new();
        let laptop = device("ip", "ua");
        let old = fx.service().login(&login("admin", "s3cret-pass"), &laptop).await.unwrap();
        let new = fx.service().login(&login("admin", "s3cret-pass"), &laptop).await.unwrap();
        let identity = Identity { id: 1, role_id: 1 };

        let logout = fx.service().logout(identity, &old.access_token).await.unwrap();

        assert_eq!(logout.message, LOGOUT_ALREADY_ELSEWHERE);
        assert!(fx.sessions.validate_logout(1, &new.access_token).await.unwrap());
    }
}
