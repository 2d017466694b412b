use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::services::ownership::ResourceKind;

/// Field name to message, serialized in field order so bodies are stable.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("email already in use")]
    EmailInUse,

    #[error("email unregistered")]
    EmailUnregistered,

    #[error("incorrect password")]
    IncorrectPassword,

    #[error("missing token")]
    MissingToken,

    #[error("unauthorized")]
    Unauthorized,

    #[error("{} does not belong to account", kind.field())]
    NotOwned { kind: ResourceKind },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub errors: FieldErrors,
}

impl AppError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), message.into());
        AppError::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::EmailInUse => StatusCode::BAD_REQUEST,
            AppError::EmailUnregistered | AppError::MissingToken | AppError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::IncorrectPassword | AppError::NotOwned { .. } => StatusCode::FORBIDDEN,
            AppError::Internal(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(self) -> FieldErrors {
        let single = |field: &str, message: &str| {
            let mut errors = FieldErrors::new();
            errors.insert(field.to_string(), message.to_string());
            errors
        };

        match self {
            AppError::Validation(errors) => errors,
            AppError::EmailInUse => single("email", "Email already in use"),
            AppError::EmailUnregistered => single("email", "Email unregistered"),
            AppError::IncorrectPassword => single("pwd", "Incorrect password"),
            AppError::MissingToken => single("auth", "Missing token"),
            AppError::Unauthorized => single("auth", "Unauthorized"),
            AppError::NotOwned { kind } => single(
                kind.field(),
                &format!("{} ID does not belong to account", kind.label()),
            ),
            AppError::Internal(_) | AppError::Database(_) => single("server", "Server error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(ErrorBody { errors: self.body() })).into_response()
    }
}
