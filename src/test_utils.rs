use crate::cache::SessionCache;
use crate::database::user::CredentialStore;
use crate::error::app_error::AppError;
use crate::models::session::ClientDevice;
use crate::models::user::User;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

enum Stored {
    Text(String),
    Hash(HashMap<String, String>),
}

struct Entry {
    value: Stored,
    ttl_seconds: u64,
    expires_at: Instant,
}

impl Entry {
    fn new(value: Stored, ttl_seconds: u64) -> Self {
        Self {
            value,
            ttl_seconds,
            expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
        }
    }

    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-process stand-in for Redis with per-key expiry and call counters.
#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    operations: AtomicUsize,
    deletes: AtomicUsize,
}

impl InMemoryCache {
    /// TTL the key was last written with, if it is still live.
    pub async fn ttl_of(&self, key: &str) -> Option<u64> {
        let entries = self.entries.lock().await;
        entries.get(key).filter(|entry| entry.is_live()).map(|entry| entry.ttl_seconds)
    }

    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.operations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl SessionCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        self.touch();
        let entries = self.entries.lock().await;
        Ok(match entries.get(key) {
            Some(entry) if entry.is_live() => match &entry.value {
                Stored::Text(text) => Some(text.clone()),
                Stored::Hash(_) => None,
            },
            _ => None,
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), AppError> {
        self.touch();
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Entry::new(Stored::Text(value.to_string()), ttl_seconds));
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, AppError> {
        self.touch();
        let entries = self.entries.lock().await;
        Ok(match entries.get(key) {
            Some(entry) if entry.is_live() => match &entry.value {
                Stored::Hash(fields) => fields.clone(),
                Stored::Text(_) => HashMap::new(),
            },
            _ => HashMap::new(),
        })
    }

    async fn hash_set_ex(&self, key: &str, fields: &[(&str, String)], ttl_seconds: u64) -> Result<(), AppError> {
        self.touch();
        let mut entries = self.entries.lock().await;
        let mut merged = match entries.remove(key) {
            Some(Entry {
                value: Stored::Hash(existing),
                expires_at,
                ..
            }) if Instant::now() < expires_at => existing,
            _ => HashMap::new(),
        };
        for (field, value) in fields {
            merged.insert((*field).to_string(), value.clone());
        }
        entries.insert(key.to_string(), Entry::new(Stored::Hash(merged), ttl_seconds));
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<(), AppError> {
        self.touch();
        self.deletes.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.touch();
        Ok(())
    }
}

pub struct MockCredentialStore {
    users: Vec<User>,
}

impl MockCredentialStore {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }
}

#[async_trait::async_trait]
impl CredentialStore for MockCredentialStore {
    async fn find_by_username_or_email(&self, login: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.iter().find(|user| user.username == login || user.email == login).cloned())
    }
}

pub fn device(ip_address: &str, user_agent: &str) -> ClientDevice {
    ClientDevice {
        ip_address: ip_address.to_string(),
        user_agent: user_agent.to_string(),
    }
}

pub fn sample_user(id: i64, username: &str, password_hash: &str) -> User {
    User {
        id,
        username: username.to_string(),
        name: username.to_string(),
        email: format!("{}@example.com", username),
        password_hash: password_hash.to_string(),
        role_id: 1,
        is_active: true,
        created_at: Utc::now(),
        created_by: None,
        modified_at: None,
        modified_by: None,
    }
}
