use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use idea_common::error::CommonError;
use serde_json::json;
use tracing::{error, warn};

use crate::completion::CompletionError;
use crate::pipeline::Stage;
use crate::schema::SchemaViolation;

/// Why an idea could not be turned into an [`crate::model::IdeaEvaluation`].
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error("model output is not valid JSON: {message}")]
    MalformedOutput {
        message: String,
        /// Leading part of the raw reply, for logs.
        excerpt: String,
    },

    #[error("model output violates the evaluation schema: {0}")]
    SchemaViolation(#[from] SchemaViolation),
}

impl EvaluationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completion(_) => "CompletionError",
            Self::MalformedOutput { .. } => "MalformedOutput",
            Self::SchemaViolation(_) => "SchemaViolation",
        }
    }

    /// Pipeline stage the error originated in.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Completion(_) => Stage::Completing,
            Self::MalformedOutput { .. } | Self::SchemaViolation(_) => Stage::Parsing,
        }
    }

    /// Whether asking the model again could fix it.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, Self::Completion(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("idea not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] CommonError),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("idea not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("storage error: {0}")]
    Storage(CommonError),

    #[error("config error: {0}")]
    Config(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(id) => AppError::NotFound(id),
            StoreError::Storage(e) => AppError::Storage(e),
        }
    }
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::NotFound(_) => "NotFound",
            Self::Evaluation(e) => e.kind(),
            Self::Storage(_) => "StorageError",
            Self::Config(_) => "ConfigError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Evaluation(EvaluationError::SchemaViolation(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Evaluation(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();
        if status.is_server_error() {
            error!(kind, error = %self, "request failed");
        } else {
            warn!(kind, error = %self, "request rejected");
        }
        let body = Json(json!({ "error": self.to_string(), "kind": kind }));
        (status, body).into_response()
    }
}
