use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use common::Actor;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::utils::jwt;

/// Authenticated user extracted from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require authentication.
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
    pub is_reviewer: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// The session as seen by the engines.
    pub fn actor(&self) -> Actor {
        let actor = if self.is_reviewer {
            Actor::reviewer(self.user_id)
        } else {
            Actor::owner(self.user_id)
        };
        match self.expires_at {
            Some(at) => actor.with_expiry(at),
            None => actor,
        }
    }

    /// Returns `Ok(())` for reviewers, `Err(PermissionDenied)` otherwise.
    pub fn require_reviewer(&self) -> Result<(), AppError> {
        if self.is_reviewer {
            Ok(())
        } else {
            Err(AppError::PermissionDenied("Reviewer role required".into()))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::TokenMissing)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::TokenInvalid)?;

        let claims = jwt::verify(&state.config.auth.jwt_secret, token)
            .map_err(|_| AppError::TokenInvalid)?;

        Ok(AuthUser {
            user_id: claims.sub,
            is_reviewer: claims.role == state.config.auth.reviewer_role,
            role: claims.role,
            expires_at: DateTime::from_timestamp(claims.exp as i64, 0),
        })
    }
}
