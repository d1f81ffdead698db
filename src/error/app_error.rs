use rocket::http::{ContentType, Status};
use rocket::response::Responder;
use rocket::{Request, Response};
use serde::Serialize;
use std::io::Cursor;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Internal server error")]
    Db {
        message: String,
        #[source]
        source: sqlx::error::Error,
    },
    #[error("Session store unavailable")]
    Cache {
        message: String,
        #[source]
        source: redis::RedisError,
    },
    #[error("Internal server error")]
    TransactionFailure {
        message: String,
        #[source]
        source: Option<sqlx::error::Error>,
    },
    #[error("Internal server error")]
    UnrecoverableFault { message: String, backtrace: String },
    #[error("Internal server error")]
    TokenSigning {
        message: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    #[error("Internal server error")]
    Encryption { message: String },
    #[error("Internal server error")]
    PasswordHash { message: String },
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Account is not active")]
    AccountInactive,
    #[error("This user is already logged in on another device")]
    AlreadyLoggedInElsewhere,
    #[error("Missing or malformed bearer token")]
    MissingBearerToken,
    #[error("Invalid access token")]
    InvalidAccessToken,
    #[error("Access token is expired, please login again")]
    AccessTokenExpired,
    #[error("Invalid refresh token")]
    InvalidRefreshToken,
    #[error("Refresh token is expired, please login again")]
    RefreshTokenExpired,
    #[error("Refresh token does not belong to this access token")]
    RefreshIdentityMismatch,
    #[error("Invalid token claim")]
    InvalidClaim,
    #[error("Request timed out")]
    RequestTimeout,
    #[error("User {0} already exists")]
    UserAlreadyExists(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),
    #[error("Internal server error")]
    MissingState(&'static str),
    #[error("Internal server error")]
    ConfigurationError {
        message: String,
        #[source]
        source: figment::Error,
    },
}

impl AppError {
    pub fn db(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::Db {
            message: message.into(),
            source,
        }
    }

    pub fn cache(message: impl Into<String>, source: redis::RedisError) -> Self {
        Self::Cache {
            message: message.into(),
            source,
        }
    }

    pub fn transaction(message: impl Into<String>, source: sqlx::error::Error) -> Self {
        Self::TransactionFailure {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn transaction_message(message: impl Into<String>) -> Self {
        Self::TransactionFailure {
            message: message.into(),
            source: None,
        }
    }

    pub fn token_signing(message: impl Into<String>, source: jsonwebtoken::errors::Error) -> Self {
        Self::TokenSigning {
            message: message.into(),
            source,
        }
    }

    pub fn password_hash(message: impl Into<String>, source: password_hash::Error) -> Self {
        Self::PasswordHash {
            message: format!("{}: {}", message.into(), source),
        }
    }

    /// Stable, machine-readable reason returned to clients alongside the status.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AppError::Db { .. } => "database_error",
            AppError::Cache { .. } => "session_store_unavailable",
            AppError::TransactionFailure { .. } => "transaction_failure",
            AppError::UnrecoverableFault { .. } => "server_error",
            AppError::TokenSigning { .. } => "err_generate_token",
            AppError::Encryption { .. } => "err_encrypt_claims",
            AppError::PasswordHash { .. } => "server_error",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::AccountInactive => "account_is_not_active",
            AppError::AlreadyLoggedInElsewhere => "this_user_already_logged_in",
            AppError::MissingBearerToken => "invalid_token",
            AppError::InvalidAccessToken => "invalid_access_token",
            AppError::AccessTokenExpired => "access_token_is_expired",
            AppError::InvalidRefreshToken => "invalid_refresh_token",
            AppError::RefreshTokenExpired => "refresh_token_is_expired",
            AppError::RefreshIdentityMismatch => "unauthorized_to_refresh_token",
            AppError::InvalidClaim => "invalid_token",
            AppError::RequestTimeout => "request_timeout",
            AppError::UserAlreadyExists(_) => "duplicate",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::ValidationError(_) => "validation_error",
            AppError::MissingState(_) => "server_error",
            AppError::ConfigurationError { .. } => "server_error",
        }
    }
}

impl From<password_hash::Error> for AppError {
    fn from(e: password_hash::Error) -> Self {
        AppError::password_hash("Password hashing failed", e)
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::cache("Cache error", e)
    }
}

impl From<&AppError> for Status {
    fn from(e: &AppError) -> Self {
        match e {
            AppError::Db { .. } => Status::InternalServerError,
            AppError::Cache { .. } => Status::ServiceUnavailable,
            AppError::TransactionFailure { .. } => Status::InternalServerError,
            AppError::UnrecoverableFault { .. } => Status::InternalServerError,
            AppError::TokenSigning { .. } => Status::InternalServerError,
            AppError::Encryption { .. } => Status::InternalServerError,
            AppError::PasswordHash { .. } => Status::InternalServerError,
            AppError::InvalidCredentials => Status::Unauthorized,
            AppError::AccountInactive => Status::Unauthorized,
            AppError::AlreadyLoggedInElsewhere => Status::Unauthorized,
            AppError::MissingBearerToken => Status::Unauthorized,
            AppError::InvalidAccessToken => Status::Unauthorized,
            AppError::AccessTokenExpired => Status::Unauthorized,
            AppError::InvalidRefreshToken => Status::Unauthorized,
            AppError::RefreshTokenExpired => Status::Unauthorized,
            AppError::RefreshIdentityMismatch => Status::Unauthorized,
            AppError::InvalidClaim => Status::Unauthorized,
            AppError::RequestTimeout => Status::ServiceUnavailable,
            AppError::UserAlreadyExists(_) => Status::Conflict,
            AppError::BadRequest(_) => Status::BadRequest,
            AppError::NotFound(_) => Status::NotFound,
            AppError::ValidationError(_) => Status::BadRequest,
            AppError::MissingState(_) => Status::InternalServerError,
            AppError::ConfigurationError { .. } => Status::InternalServerError,
        }
    }
}

/// JSON body sent for every failed request.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl From<&AppError> for ErrorBody {
    fn from(e: &AppError) -> Self {
        Self {
            error: e.reason_code().to_string(),
            message: e.to_string(),
        }
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &Request<'_>) -> rocket::response::Result<'static> {
        let method = req.method();
        let uri = req.uri();

        let request_id = req
            .local_cache(|| None::<crate::middleware::RequestId>)
            .as_ref()
            .map(|r| r.0.as_str())
            .unwrap_or("unknown");

        let user_id = req
            .local_cache(|| None::<crate::auth::CurrentUser>)
            .as_ref()
            .map(|u| u.id.to_string())
            .unwrap_or_else(|| "anonymous".to_string());

        let status = Status::from(&self);
        match &self {
            AppError::UnrecoverableFault { message, backtrace } => {
                error!(
                    request_id = %request_id,
                    user_id = %user_id,
                    method = %method,
                    uri = %uri,
                    fault = %message,
                    backtrace = %backtrace,
                    "request aborted by a fault inside a unit of work"
                );
            }
            _ if status.class().is_server_error() => {
                error!(
                    error = ?self,
                    request_id = %request_id,
                    user_id = %user_id,
                    method = %method,
                    uri = %uri,
                    "request failed"
                );
            }
            _ => {
                warn!(
                    reason = self.reason_code(),
                    request_id = %request_id,
                    user_id = %user_id,
                    method = %method,
                    uri = %uri,
                    "request rejected"
                );
            }
        }

        let body = serde_json::to_string(&ErrorBody::from(&self)).unwrap_or_else(|_| format!(r#"{{"error":"{}"}}"#, self.reason_code()));

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(body.len(), Cursor::new(body))
            .ok()
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::ConfigurationError {
            message: "Failed to read configuration".to_string(),
            source: e,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::UserAlreadyExists(db.constraint().unwrap_or("unique constraint").to_string())
            }
            _ => AppError::db("Database error", e),
        }
    }
}
