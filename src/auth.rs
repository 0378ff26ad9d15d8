use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

/// Claims issued by the external identity provider. This service only
/// verifies them; registration and login live elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub admin: bool,
    pub exp: usize,
}

/// Opaque authenticated-user handle passed explicitly into every core
/// operation (no ambient current-user lookups).
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub admin: bool,
}

fn bearer_token(parts: &Parts) -> Result<&str, ServiceError> {
    parts
        .headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))
}

fn verify(token: &str, secret: &str) -> Result<AuthUser, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?;

    let id = Uuid::parse_str(&data.claims.sub)
        .map_err(|_| ServiceError::Unauthorized("invalid subject claim".to_string()))?;

    Ok(AuthUser {
        id,
        email: data.claims.email,
        admin: data.claims.admin,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        verify(token, &state.config.jwt_secret)
    }
}

/// Extractor for admin-only endpoints.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.admin {
            return Err(ServiceError::Forbidden(
                "admin privileges required".to_string(),
            ));
        }
        Ok(AdminUser(user))
    }
}

/// Issues a token for the given user. Used by tests and local tooling; in
/// production tokens come from the identity provider.
pub fn issue_token(
    secret: &str,
    user_id: Uuid,
    email: &str,
    admin: bool,
    ttl_secs: u64,
) -> Result<String, ServiceError> {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        admin,
        exp: (chrono::Utc::now().timestamp() as usize) + ttl_secs as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("token encoding failed: {}", e)))
}
