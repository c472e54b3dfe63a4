use crate::model::Step;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use thiserror::Error;

/// A listing query against the cluster failed. Callers degrade to an empty menu.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("namespace must not be empty")]
    EmptyNamespace,
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{binary} exited with {status}: {stderr}")]
    Exit {
        binary: String,
        status: String,
        stderr: String,
    },
    #[error("listing query timed out after {0:?}")]
    TimedOut(Duration),
    #[error("listing output was not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("kubernetes api request failed: {0}")]
    Api(#[from] kube::Error),
}

/// Why an action command did not succeed. The captured output is still delivered.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum ExecutionError {
    #[error("command exited unsuccessfully (code {code:?})")]
    NonZeroExit { code: Option<i32> },
    #[error("command timed out after {after:?}")]
    TimedOut { after: Duration },
    #[error("failed to start command: {0}")]
    Spawn(String),
}

/// A step referenced selection state that is missing or was never offered.
#[derive(Debug, Clone, Error, Eq, PartialEq)]
pub enum StateError {
    #[error("selection is missing {0}")]
    MissingField(&'static str),
    #[error("{step} value {value:?} was not offered in this conversation")]
    RejectedValue { step: Step, value: String },
}

impl StateError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingField("namespace") => "Namespace not selected. Please start over.",
            Self::MissingField(_) => "Selection expired. Please mention me again to start over.",
            Self::RejectedValue { .. } => {
                "That option is no longer valid. Please mention me again to start over."
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum SlackError {
    #[error("slack request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack api returned error: {0}")]
    Api(String),
}

/// Rejections produced while validating an inbound webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing slack signature headers")]
    MissingSignature,
    #[error("invalid slack signature")]
    BadSignature,
    #[error("stale slack request timestamp")]
    StaleTimestamp,
    #[error("verification token mismatch")]
    BadToken,
    #[error("malformed payload: {0}")]
    BadPayload(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::MissingSignature | Self::BadSignature | Self::StaleTimestamp | Self::BadToken => {
                StatusCode::UNAUTHORIZED
            }
            Self::BadPayload(_) => StatusCode::BAD_REQUEST,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
