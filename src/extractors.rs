use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::TokenError;
use crate::db::models::UserId;
use crate::error::AppError;
use crate::state::AppState;

/// The caller identified by the `Authorization` header.
/// Rejects with 401 when the header is missing or the token does not verify.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser {
    pub id: UserId,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(header::AUTHORIZATION) {
            None => None,
            Some(value) => Some(value.to_str().map_err(|_| AppError::InvalidCredential)?),
        };

        match state.tokens.verify_header(header) {
            Ok(id) => Ok(CurrentUser { id }),
            Err(TokenError::Missing) => Err(AppError::Unauthenticated),
            Err(e) => {
                tracing::debug!("Rejected credential: {}", e);
                Err(AppError::InvalidCredential)
            }
        }
    }
}
