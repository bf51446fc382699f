use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::db::models::UserId;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no credential supplied")]
    Missing,

    #[error("credential rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("credential subject is not a user id")]
    BadSubject,
}

/// Signs and verifies HS256 access tokens carrying a `userId` claim.
#[derive(Clone)]
pub struct TokenVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
    accept_bearer_prefix: bool,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], lifetime_hours: i64, accept_bearer_prefix: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            lifetime: Duration::hours(lifetime_hours),
            accept_bearer_prefix,
        }
    }

    pub fn issue(&self, user_id: UserId) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.lifetime).timestamp() as usize,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }

    /// Verify a raw `Authorization` header value and return the caller's id.
    ///
    /// An absent or blank header is `Missing`; everything else that fails is a
    /// rejected credential.
    pub fn verify_header(&self, header: Option<&str>) -> Result<UserId, TokenError> {
        let raw = header.map(str::trim).unwrap_or_default();
        let token = if self.accept_bearer_prefix && (raw == "Bearer" || raw.starts_with("Bearer "))
        {
            raw["Bearer".len()..].trim()
        } else {
            raw
        };
        if token.is_empty() {
            return Err(TokenError::Missing);
        }
        self.verify(token)
    }

    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        UserId::parse(&data.claims.user_id).ok_or(TokenError::BadSubject)
    }
}
