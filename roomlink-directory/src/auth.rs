use crate::directory::Directory;
use crate::error::DirectoryError;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use roomlink_core::PlayerIdentity;

/// Caller identity taken from a `Bearer` session token
#[derive(Debug, Clone)]
pub struct AuthUser(pub PlayerIdentity);

#[async_trait]
impl FromRequestParts<Directory> for AuthUser {
    type Rejection = DirectoryError;

    async fn from_request_parts(parts: &mut Parts, directory: &Directory) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| DirectoryError::Auth("missing bearer token".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| DirectoryError::Auth("expected a bearer token".to_string()))?;

        directory.authenticate(token.trim()).map(AuthUser)
    }
}
