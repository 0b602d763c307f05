//! Bearer token extraction.
//!
//! When the server has an `API_KEY`, every data route requires
//! `Authorization: Bearer <API_KEY>`. Without one, requests are anonymous.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use subtle::ConstantTimeEq;

use crate::error::AppError;
use crate::AppState;

/// Caller that passed the API key check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthUser {
    ApiKey,
    Anonymous,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.api_key.as_deref() else {
            return Ok(AuthUser::Anonymous);
        };

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(str::trim);

        match token {
            Some(token) if key_matches(token, expected) => Ok(AuthUser::ApiKey),
            Some(_) => {
                tracing::debug!("Rejected request with wrong API key");
                Err(AppError::Unauthorized)
            }
            None => Err(AppError::Unauthorized),
        }
    }
}

/// Constant-time comparison, so response timing does not leak the key.
fn key_matches(token: &str, expected: &str) -> bool {
    token.as_bytes().ct_eq(expected.as_bytes()).into()
}
