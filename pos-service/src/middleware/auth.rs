//! Caller attribution middleware.
//!
//! Decodes the inbound bearer token and attaches the subject to the request
//! span. Attribution only: token issuance and authorization live elsewhere.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::error::AppError;

use crate::startup::AppState;

/// Caller identity extracted from the bearer token.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub subject: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

#[async_trait]
impl FromRequestParts<AppState> for CallerContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!("Missing Authorization header"))
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::AuthError(anyhow::anyhow!("Authorization header is not a bearer token"))
        })?;

        let key =
            DecodingKey::from_secret(state.config.auth.jwt_secret.expose_secret().as_bytes());
        let data = decode::<Claims>(token, &key, &Validation::new(Algorithm::HS256))?;

        let span = tracing::Span::current();
        span.record("caller", data.claims.sub.as_str());

        Ok(CallerContext {
            subject: data.claims.sub,
        })
    }
}
