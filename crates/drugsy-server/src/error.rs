use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use drugsy::errors::OrchestratorError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {env_var}")]
    MissingEnvVar { env_var: String },

    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Map a config field path like `provider.api_key` to its environment
/// variable form, `DRUGSY_PROVIDER__API_KEY`.
pub fn to_env_var(field: &str) -> String {
    format!("DRUGSY_{}", field.replace('.', "__").to_uppercase())
}

/// Errors surfaced at the HTTP boundary. The response body is always a
/// generic, polite message; internals go to the log only.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("language model unavailable")]
    Upstream,

    #[error("internal failure")]
    Internal,

    #[error("not found")]
    NotFound,
}

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        tracing::error!(error = %e, "conversation turn failed");
        match e {
            OrchestratorError::Upstream(_) => ApiError::Upstream,
            OrchestratorError::ToolLoopExceeded { .. } => ApiError::Internal,
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!(error = %e, "request failed");
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Upstream => (
                StatusCode::BAD_GATEWAY,
                "I'm sorry — I can't reach my assistant right now. Please try again in a moment.",
            ),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "I'm sorry — something went wrong while answering. Please try again.",
            ),
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Conversation not found"),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
