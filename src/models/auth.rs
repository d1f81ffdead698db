use crate::auth::token::TokenPair;
use crate::models::user::UserResponse;
use rocket::serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Deserialize, Debug, Clone, Validate)]
#[serde(crate = "rocket::serde")]
pub struct LoginRequest {
    /// Username or email.
    #[validate(length(min = 1))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(crate = "rocket::serde")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub profile: UserResponse,
}

#[derive(Deserialize, Debug, Clone, Validate)]
#[serde(crate = "rocket::serde")]
pub struct RefreshTokenRequest {
    #[validate(length(min = 1))]
    pub access_token: String,
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(crate = "rocket::serde")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for TokenPairResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(crate = "rocket::serde")]
pub struct LogoutResponse {
    pub message: String,
}
