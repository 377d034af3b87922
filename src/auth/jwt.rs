//! JWT token generation and validation
//!
//! Access tokens only: there is no refresh token and no server-side
//! revocation, so a token is valid iff its signature checks out and
//! `now < exp`.

use crate::{config::SecurityConfig, error::AppError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user ID, stringified)
    pub sub: String,

    /// User role
    pub role: String,

    /// Issued at (seconds since epoch, UTC)
    pub iat: i64,

    /// Expiration (seconds since epoch, UTC)
    pub exp: i64,
}

/// Why a token was rejected.
///
/// Kept distinct for logging; callers facing clients should only expose
/// the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("Token expired.")]
    Expired,

    #[error("Invalid token.")]
    Invalid,
}

impl TokenError {
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Expired => "expired",
            TokenError::Invalid => "invalid",
        }
    }
}

/// JWT service
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    lifetime_secs: i64,
}

impl TokenService {
    /// Create a token service for an HMAC algorithm
    pub fn new(secret: &str, algorithm: Algorithm, lifetime_secs: i64) -> Result<Self, AppError> {
        // Ensure secret is at least 32 bytes for HMAC
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(AppError::Config(format!(
                "Unsupported JWT algorithm: {:?}",
                algorithm
            )));
        }

        if lifetime_secs <= 0 {
            return Err(AppError::Config("Token lifetime must be positive".to_string()));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            lifetime_secs,
        })
    }

    /// Create JWT service from config
    pub fn from_config(security: &SecurityConfig) -> Result<Self, AppError> {
        let algorithm = security.jwt_algorithm()?;
        Self::new(
            security.jwt_secret.expose_secret(),
            algorithm,
            security.access_token_exp_secs(),
        )
    }

    /// Configured token lifetime in seconds
    pub fn lifetime_secs(&self) -> i64 {
        self.lifetime_secs
    }

    /// Issue an access token for `user_id` with `role`
    pub fn create_access_token(&self, user_id: i64, role: &str) -> Result<String, AppError> {
        self.issue_at(user_id, role, Utc::now())
    }

    /// Issue an access token as if the current time were `now`
    pub fn issue_at(&self, user_id: i64, role: &str, now: DateTime<Utc>) -> Result<String, AppError> {
        let expiration = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
        };

        encode(&Header::new(self.algorithm), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            AppError::Internal(format!("Failed to encode access token: {}", e))
        })
    }

    /// Validate and decode token
    pub fn decode_token(&self, token: &str) -> Result<Claims, TokenError> {
        self.decode_token_at(token, Utc::now().timestamp())
    }

    /// Validate and decode token against an explicit clock (seconds since epoch)
    pub fn decode_token_at(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(self.algorithm);
        // Expiry is checked below against `now` with no leeway.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|e| {
                let err = match e.kind() {
                    ErrorKind::ExpiredSignature => TokenError::Expired,
                    _ => TokenError::Invalid,
                };
                tracing::debug!(reason = err.kind(), "Token validation failed: {:?}", e);
                err
            })?
            .claims;

        if now >= claims.exp {
            tracing::debug!(reason = "expired", sub = %claims.sub, "Token validation failed");
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
