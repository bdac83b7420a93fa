use crate::error::{DirectoryError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use roomlink_core::PlayerIdentity;
use serde::{Deserialize, Serialize};

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// User id
    pub sub: String,
    /// Display name at issue time
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

impl TokenClaims {
    pub fn new(identity: &PlayerIdentity, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: identity.id.clone(),
            name: identity.display_name.clone(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn identity(&self) -> PlayerIdentity {
        PlayerIdentity {
            id: self.sub.clone(),
            display_name: self.name.clone(),
        }
    }
}

/// HS256 token issuer and validator
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, identity: &PlayerIdentity) -> Result<String> {
        self.sign(&TokenClaims::new(identity, self.ttl))
    }

    pub fn sign(&self, claims: &TokenClaims) -> Result<String> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| DirectoryError::Internal(format!("failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<TokenClaims> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        decode::<TokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => DirectoryError::Auth("token expired".to_string()),
                ErrorKind::InvalidSignature => {
                    DirectoryError::Auth("invalid token signature".to_string())
                }
                _ => DirectoryError::Auth(format!("invalid token: {}", e)),
            })
    }
}
