//! Error types for Bookshelf server

use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::i18n::{Lang, MessageKey};

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(MessageKey),

    #[error("Authorization failed: {0}")]
    Authorization(MessageKey),

    #[error("Not found: {0}")]
    NotFound(MessageKey),

    #[error("Validation error: {0}")]
    Validation(MessageKey),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Conflict: {0}")]
    Conflict(MessageKey),

    #[error("Bad request: {0}")]
    BadRequest(MessageKey),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::Authorization(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message identifier shown to clients
    pub fn message_key(&self) -> MessageKey {
        match self {
            AppError::Authentication(key)
            | AppError::Authorization(key)
            | AppError::NotFound(key)
            | AppError::Validation(key)
            | AppError::Conflict(key)
            | AppError::BadRequest(key) => *key,
            AppError::Database(_) | AppError::Internal(_) => MessageKey::SomethingWentWrong,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    /// Only present outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Error details attached to a failed response, rendered by the envelope middleware
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub key: MessageKey,
    /// Raw failure text for server-side errors
    pub detail: Option<String>,
    pub stack: String,
}

impl ErrorReport {
    /// Build the client-facing body for the given language and environment
    pub fn render(&self, lang: Lang, production: bool) -> ErrorResponse {
        if production {
            let key = if self.status.is_server_error() {
                MessageKey::SomethingWentWrong
            } else {
                self.key
            };
            return ErrorResponse {
                message: lang.t(key),
                stack: None,
            };
        }

        ErrorResponse {
            message: self.detail.clone().unwrap_or_else(|| lang.t(self.key)),
            stack: Some(self.stack.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let detail = match &self {
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                Some(self.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                Some(self.to_string())
            }
            _ => None,
        };

        let report = ErrorReport {
            status,
            key: self.message_key(),
            detail,
            stack: format!("{:?}", self),
        };

        let body = Json(ErrorResponse {
            message: self.message_key().english().to_string(),
            stack: None,
        });

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("Rejected JSON body: {}", rejection.body_text());
        AppError::Validation(MessageKey::InvalidRequestBody)
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        tracing::debug!("Rejected path parameters: {}", rejection.body_text());
        AppError::Validation(MessageKey::InvalidPathParameter)
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_class() {
        assert_eq!(AppError::Validation(MessageKey::TitleRequired).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::BadRequest(MessageKey::BookAlreadyBorrowed).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Authentication(MessageKey::NoToken).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Authorization(MessageKey::NotBorrower).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound(MessageKey::BookNotFound).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict(MessageKey::BookTitleTaken).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Internal("boom".into()).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn production_hides_server_errors() {
        let report = ErrorReport {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            key: MessageKey::SomethingWentWrong,
            detail: Some("Internal server error: disk full".into()),
            stack: "Internal(\"disk full\")".into(),
        };

        let prod = report.render(Lang::En, true);
        assert_eq!(prod.message, "Something went wrong, please try again later.");
        assert!(prod.stack.is_none());

        let dev = report.render(Lang::En, false);
        assert_eq!(dev.message, "Internal server error: disk full");
        assert_eq!(dev.stack.as_deref(), Some("Internal(\"disk full\")"));
    }

    #[test]
    fn client_errors_are_localized() {
        let report = ErrorReport {
            status: StatusCode::NOT_FOUND,
            key: MessageKey::LibraryNotFound,
            detail: None,
            stack: "NotFound(LibraryNotFound)".into(),
        };

        assert_eq!(report.render(Lang::Hi, true).message, "पुस्तकालय नहीं मिला");
        assert_eq!(report.render(Lang::En, false).message, "Library not found");
    }
}
