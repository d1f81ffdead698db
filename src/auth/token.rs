use crate::auth::claim_codec::ClaimCodec;
use crate::config::JwtConfig;
use crate::error::app_error::AppError;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The authenticated principal. Never placed in a claim in the clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: i64,
    pub role_id: i64,
}

/// Signed claims shared by access and refresh tokens. `id` and `rid` hold
/// codec-sealed values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub id: String,
    #[serde(rename = "rid")]
    pub role_id: String,
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    pub claims: TokenClaims,
    pub identity: Identity,
}

/// Classification of a presented token. `Expired` still carries the claims
/// because the signature was good.
#[derive(Debug, Clone)]
pub enum ParsedToken {
    Valid(VerifiedClaims),
    Expired(VerifiedClaims),
    Malformed,
}

impl ParsedToken {
    pub fn identity(&self) -> Option<Identity> {
        match self {
            ParsedToken::Valid(verified) | ParsedToken::Expired(verified) => Some(verified.identity),
            ParsedToken::Malformed => None,
        }
    }
}

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: i64,
}

impl SigningKeys {
    fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

/// Builds and classifies access/refresh token pairs. Each kind is signed with
/// its own HS256 secret.
pub struct TokenIssuer {
    codec: ClaimCodec,
    access: SigningKeys,
    refresh: SigningKeys,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            codec: ClaimCodec::new(&config.encryption_key),
            access: SigningKeys::new(&config.access_secret, config.access_token_ttl_seconds),
            refresh: SigningKeys::new(&config.refresh_secret, config.refresh_token_ttl_seconds),
        }
    }

    pub fn issue(&self, identity: Identity) -> Result<TokenPair, AppError> {
        let id = self.codec.encode(identity.id)?;
        let role_id = self.codec.encode(identity.role_id)?;
        let now = Utc::now().timestamp();

        let access_claims = TokenClaims {
            id: id.clone(),
            role_id: role_id.clone(),
            expires_at: now + self.access.ttl_seconds,
        };
        let refresh_claims = TokenClaims {
            id,
            role_id,
            expires_at: now + self.refresh.ttl_seconds,
        };

        let header = Header::new(Algorithm::HS256);
        let access_token = encode(&header, &access_claims, &self.access.encoding).map_err(|e| AppError::token_signing("Failed to sign access token", e))?;
        let refresh_token =
            encode(&header, &refresh_claims, &self.refresh.encoding).map_err(|e| AppError::token_signing("Failed to sign refresh token", e))?;

        Ok(TokenPair { access_token, refresh_token })
    }

    pub fn parse_access(&self, token: &str) -> ParsedToken {
        self.parse(token, &self.access.decoding)
    }

    pub fn parse_refresh(&self, token: &str) -> ParsedToken {
        self.parse(token, &self.refresh.decoding)
    }

    /// Exchanges a pair for a fresh one. An expired access token is accepted;
    /// the refresh token must be valid and carry the same identity.
    pub fn refresh(&self, access_token: &str, refresh_token: &str) -> Result<(Identity, TokenPair), AppError> {
        let access_identity = self.parse_access(access_token).identity().ok_or(AppError::InvalidAccessToken)?;

        let refresh_identity = match self.parse_refresh(refresh_token) {
            ParsedToken::Valid(verified) => verified.identity,
            ParsedToken::Expired(_) => return Err(AppError::RefreshTokenExpired),
            ParsedToken::Malformed => return Err(AppError::InvalidRefreshToken),
        };

        if access_identity != refresh_identity {
            return Err(AppError::RefreshIdentityMismatch);
        }

        let pair = self.issue(refresh_identity)?;
        Ok((refresh_identity, pair))
    }

    fn parse(&self, token: &str, key: &DecodingKey) -> ParsedToken {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let claims = match decode::<TokenClaims>(token, key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(error = %e, "token rejected");
                return ParsedToken::Malformed;
            }
        };

        let identity = match (self.codec.decode(&claims.id), self.codec.decode(&claims.role_id)) {
            (Ok(id), Ok(role_id)) => Identity { id, role_id },
            _ => {
                debug!("token claims failed to decode");
                return ParsedToken::Malformed;
            }
        };

        let expired = Utc::now().timestamp() > claims.expires_at;
        let verified = VerifiedClaims { claims, identity };
        if expired { ParsedToken::Expired(verified) } else { ParsedToken::Valid(verified) }
    }
}
