//! Bearer-token authentication collaborator.
//!
//! Validates HMAC-signed JWTs into typed extractors. Token issuance,
//! refresh, and password handling live in the account service; this
//! backend only checks signatures and reads claims.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: i64,
    #[serde(default)]
    admin: bool,
}

/// An authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub is_admin: bool,
}

/// An authenticated caller with the admin claim.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser {
    #[allow(dead_code)]
    pub user_id: Uuid,
}

/// Present when a valid bearer token was sent, absent otherwise; never
/// rejects the request.
#[derive(Debug, Clone, Copy)]
pub struct OptionalUser(pub Option<CurrentUser>);

fn authenticate(parts: &Parts, secret: &str) -> Result<CurrentUser, AppError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(AppError::Unauthorized)?;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized)?;
    Ok(CurrentUser {
        user_id,
        is_admin: data.claims.admin,
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, &state.config.jwt_secret)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, &state.config.jwt_secret)?;
        if !user.is_admin {
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser {
            user_id: user.user_id,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(OptionalUser(
            authenticate(parts, &state.config.jwt_secret).ok(),
        ))
    }
}
