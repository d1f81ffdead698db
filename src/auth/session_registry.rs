use crate::cache::SessionCache;
use crate::error::app_error::AppError;
use crate::models::session::{ClientDevice, SessionRecord};
use std::sync::Arc;
use tracing::debug;

const ACTIVE_FLAG: &str = "1";

/// Cache-backed record of the single device an account is logged in from.
///
/// Each account owns two keys: `auth_user_id_{id}_flag` holding `"1"` while a
/// session is live and `auth_user_id_{id}_info` holding the device and current
/// access token. Both expire together with the access token.
///
/// Operations are independent cache calls, not a transaction. A login racing a
/// logout for the same account resolves as last writer wins: the worst outcome
/// is a spurious "already logged in" or an early invalidation, never a torn
/// record.
#[derive(Clone)]
pub struct SessionRegistry {
    cache: Arc<dyn SessionCache>,
    ttl_seconds: u64,
}

impl SessionRegistry {
    pub fn new(cache: Arc<dyn SessionCache>, ttl_seconds: i64) -> Self {
        Self {
            cache,
            ttl_seconds: ttl_seconds.max(1) as u64,
        }
    }

    fn flag_key(id: i64) -> String {
        format!("auth_user_id_{}_flag", id)
    }

    fn info_key(id: i64) -> String {
        format!("auth_user_id_{}_info", id)
    }

    pub async fn is_active(&self, id: i64) -> Result<bool, AppError> {
        let flag = self.cache.get(&Self::flag_key(id)).await?;
        Ok(flag.as_deref() == Some(ACTIVE_FLAG))
    }

    pub async fn bind(&self, id: i64, device: &ClientDevice, access_token: &str) -> Result<(), AppError> {
        self.cache.set_ex(&Self::flag_key(id), ACTIVE_FLAG, self.ttl_seconds).await?;
        self.cache
            .hash_set_ex(
                &Self::info_key(id),
                &[
                    ("ip_address", device.ip_address.clone()),
                    ("user_agent", device.user_agent.clone()),
                    ("token", access_token.to_string()),
                ],
                self.ttl_seconds,
            )
            .await?;
        debug!(user_id = id, "session bound");
        Ok(())
    }

    /// Returns `false` when a live session exists for a different device.
    ///
    /// Device identity is the client-reported IP and User-Agent compared as
    /// plain strings. Both are trivially spoofable, so this only stops honest
    /// concurrent logins; it is not an authentication factor.
    pub async fn check_device(&self, id: i64, device: &ClientDevice) -> Result<bool, AppError> {
        if !self.is_active(id).await? {
            return Ok(true);
        }
        let info = self.cache.hash_get_all(&Self::info_key(id)).await?;
        let field = |name: &str| info.get(name).map(String::as_str).unwrap_or("");
        Ok(field("ip_address") == device.ip_address && field("user_agent") == device.user_agent)
    }

    /// Whether `presented_token` is still the session's current access token.
    pub async fn validate_logout(&self, id: i64, presented_token: &str) -> Result<bool, AppError> {
        let info = self.cache.hash_get_all(&Self::info_key(id)).await?;
        Ok(matches!(info.get("token"), Some(token) if !token.is_empty() && token == presented_token))
    }

    pub async fn invalidate(&self, id: i64) -> Result<(), AppError> {
        self.cache.delete(&[Self::flag_key(id), Self::info_key(id)]).await?;
        debug!(user_id = id, "session invalidated");
        Ok(())
    }

    pub async fn record(&self, id: i64) -> Result<Option<SessionRecord>, AppError> {
        let logged_in = self.is_active(id).await?;
        let mut info = self.cache.hash_get_all(&Self::info_key(id)).await?;
        if !logged_in && info.is_empty() {
            return Ok(None);
        }
        Ok(Some(SessionRecord {
            logged_in,
            ip_address: info.remove("ip_address").unwrap_or_default(),
            user_agent: info.remove("user_agent").unwrap_or_default(),
            current_access_token: info.remove("token").unwrap_or_default(),
        }))
    }

    pub async fn ping(&self) -> Result<(), AppError> {
        self.cache.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{InMemoryCache, device};

    fn registry() -> (Arc<InMemoryCache>, SessionRegistry) {
        let cache = Arc::new(InMemoryCache::default());
        (cache.clone(), SessionRegistry::new(cache, 300))
    }

    #[tokio::test]
    async fn bind_marks_the_account_active() {
        let (_, registry) = registry();
        assert!(!registry.is_active(1).await.unwrap());

        registry.bind(1, &device("10.0.0.1", "curl"), "token-a").await.unwrap();

        assert!(registry.is_active(1).await.unwrap());
        let record = registry.record(1).await.unwrap().unwrap();
        assert!(record.logged_in);
        assert_eq!(record.ip_address, "10.0.0.1");
        assert_eq!(record.user_agent, "curl");
        assert_eq!(record.current_access_token, "token-a");
    }

    #[tokio::test]
    async fn bind_uses_the_documented_keys_and_ttl() {
        let (cache, registry) = registry();
        registry.bind(42, &device("1.1.1.1", "ua"), "t").await.unwrap();
        assert_eq!(cache.ttl_of("auth_user_id_42_flag").await, Some(300));
        assert_eq!(cache.ttl_of("auth_user_id_42_info").await, Some(300));
    }

    #[tokio::test]
    async fn non_positive_ttl_is_clamped() {
        let cache = Arc::new(InMemoryCache::default());
        let registry = SessionRegistry::new(cache.clone(), -5);
        registry.bind(1, &device("ip", "ua"), "t").await.unwrap();
        assert_eq!(cache.ttl_of("auth_user_id_1_flag").await, Some(1));
    }

    #[tokio::test]
    async fn check_device_accepts_bound_device_and_rejects_others() {
        let (_, registry) = registry();
        registry.bind(7, &device("10.0.0.1", "firefox"), "t").await.unwrap();

        assert!(registry.check_device(7, &device("10.0.0.1", "firefox")).await.unwrap());
        assert!(!registry.check_device(7, &device("10.0.0.2", "firefox")).await.unwrap());
        assert!(!registry.check_device(7, &device("10.0.0.1", "chrome")).await.unwrap());
    }

    #[tokio::test]
    async fn check_device_allows_anyone_without_a_session() {
        let (_, registry) = registry();
        assert!(registry.check_device(7, &device("anything", "anything")).await.unwrap());
    }

    #[tokio::test]
    async fn validate_logout_matches_only_the_current_token() {
        let (_, registry) = registry();
        registry.bind(3, &device("ip", "ua"), "old").await.unwrap();
        registry.bind(3, &device("ip", "ua"), "new").await.unwrap();

        assert!(registry.validate_logout(3, "new").await.unwrap());
        assert!(!registry.validate_logout(3, "old").await.unwrap());
        assert!(!registry.validate_logout(4, "").await.unwrap());
    }

    #[tokio::test]
    async fn invalidate_removes_flag_and_record_in_one_call() {
        let (cache, registry) = registry();
        registry.bind(9, &device("ip", "ua"), "t").await.unwrap();
        let deletes_before = cache.delete_calls();

        registry.invalidate(9).await.unwrap();

        assert_eq!(cache.delete_calls(), deletes_before + 1);
        assert!(!registry.is_active(9).await.unwrap());
        assert!(registry.record(9).await.unwrap().is_none());
    }
}
