use serde::Serialize;

/// Cached state of an account's single active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRecord {
    pub logged_in: bool,
    pub ip_address: String,
    pub user_agent: String,
    pub current_access_token: String,
}

/// The device a request claims to come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDevice {
    pub ip_address: String,
    pub user_agent: String,
}
