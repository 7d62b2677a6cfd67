//! API handlers for Bookshelf REST endpoints

pub mod auth;
pub mod books;
pub mod envelope;
pub mod health;
pub mod libraries;
pub mod loans;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::AppError, i18n::MessageKey};

/// User id placed in request extensions by [`auth::require_auth`]
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

/// Extractor for the authenticated caller's id
pub struct AuthenticatedUser(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|user| AuthenticatedUser(user.0))
            .ok_or(AppError::Authentication(MessageKey::NoToken))
    }
}

/// JSON body extractor whose rejections use the error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path extractor whose rejections use the error envelope
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Body of responses that carry only a message
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of delete responses
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeletedResponse {
    pub message: String,
    pub deleted_id: Uuid,
}

/// Fallback for unknown routes
pub async fn not_found() -> AppError {
    AppError::NotFound(MessageKey::RouteNotFound)
}
