//! Bearer token issuance and verification (spec.md §3 auth boundary
//! concession): a thin, swappable boundary so a future identity service can
//! replace this module without touching the Dispatcher or Hub.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid or expired token")]
    Invalid,
}

/// Claims embedded in every issued token. `sub` is the user id (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
}

/// Anything that can turn a bearer token into an authenticated user id.
/// The HTTP and WebSocket entry points depend on this trait, not on JWT
/// directly, so the concrete scheme can be swapped out behind it.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str) -> Result<String, TokenError>;
}

/// HS256 JWT implementation of [`TokenValidator`].
#[derive(Clone)]
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &str, ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::seconds(ttl_seconds),
        }
    }

    pub fn issue(&self, user_id: &str) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|_| TokenError::Invalid)
    }
}

impl TokenValidator for JwtIssuer {
    fn validate(&self, token: &str) -> Result<String, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| TokenError::Invalid)?;
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issued_token_validates_back_to_same_user() {
        let issuer = JwtIssuer::new("a very long test signing secret indeed", 3600);
        let token = issuer.issue("u1").unwrap();
        assert_eq!(issuer.validate(&token).unwrap(), "u1");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let issuer = JwtIssuer::new("a very long test signing secret indeed", 3600);
        let mut token = issuer.issue("u1").unwrap();
        token.push('x');
        assert!(issuer.validate(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = JwtIssuer::new("a very long test signing secret indeed", -1);
        let token = issuer.issue("u1").unwrap();
        assert!(issuer.validate(&token).is_err());
    }
}
