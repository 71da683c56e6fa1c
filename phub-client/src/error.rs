//! Error types for phub-client
//!
//! `ApiError` is the failure taxonomy every backend call is classified into.
//! `MutationError` is what an optimistic mutation reports to its view.

use phub_common::MutationKind;
use thiserror::Error;

/// Classified backend failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Backend failed internally (500)
    #[error("Server unavailable: {0}")]
    ServerUnavailable(String),

    /// Connection-level failure, including timeouts
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Missing or rejected credentials (401, 403)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Request rejected as invalid (400, 422) or refused locally
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Anything else, with the server-provided message when there is one
    #[error("Request failed: {message}")]
    Unknown {
        status: Option<u16>,
        message: String,
    },
}

impl ApiError {
    /// Classify a non-success HTTP status and its body
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = server_message(body).unwrap_or_else(|| format!("HTTP {}", status));
        match status {
            404 => ApiError::NotFound(message),
            500 => ApiError::ServerUnavailable(message),
            401 | 403 => ApiError::Unauthorized(message),
            400 | 422 => ApiError::ValidationError(message),
            _ => ApiError::Unknown {
                status: Some(status),
                message,
            },
        }
    }

    /// Classify a transport failure reported by reqwest
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::NetworkUnreachable(format!("request timed out: {}", err))
        } else if err.is_connect() || err.is_request() {
            ApiError::NetworkUnreachable(err.to_string())
        } else if err.is_decode() || err.is_body() {
            ApiError::Unknown {
                status: err.status().map(|s| s.as_u16()),
                message: format!("invalid response body: {}", err),
            }
        } else {
            ApiError::Unknown {
                status: err.status().map(|s| s.as_u16()),
                message: err.to_string(),
            }
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

/// Extract `message` or `error` from a JSON error body, or use the raw text
fn server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let field = value
            .get("message")
            .or_else(|| value.get("error"))
            .map(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(obj) => obj
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string),
                _ => None,
            });
        if let Some(Some(message)) = field {
            return Some(message);
        }
        return match value {
            serde_json::Value::String(s) => Some(s),
            _ => None,
        };
    }

    Some(trimmed.to_string())
}

/// Failure of an optimistic mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    /// An intent for the same target and kind is still pending
    #[error("A {kind} request for {target_id} is already in progress")]
    Busy {
        kind: MutationKind,
        target_id: String,
    },

    /// No session user
    #[error("Please login to {0}")]
    NotSignedIn(MutationKind),

    /// Refused locally; nothing was sent and nothing was predicted
    #[error("Cannot {kind}: {source}")]
    Rejected {
        kind: MutationKind,
        #[source]
        source: ApiError,
    },

    /// The request (or its reconciliation) failed and the prediction was reverted
    #[error("Failed to {kind}: {source}")]
    Failed {
        kind: MutationKind,
        #[source]
        source: ApiError,
    },
}

impl MutationError {
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationError::Busy { kind, .. }
            | MutationError::NotSignedIn(kind)
            | MutationError::Rejected { kind, .. }
            | MutationError::Failed { kind, .. } => *kind,
        }
    }

    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            MutationError::Rejected { source, .. } | MutationError::Failed { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }

    /// The backend refused our credentials; the view decides whether to
    /// send the user to sign-in
    pub fn is_unauthorized(&self) -> bool {
        self.api_error().is_some_and(ApiError::is_unauthorized)
    }

    /// Short inline text for the view that initiated the action
    pub fn user_message(&self) -> String {
        match self {
            MutationError::Busy { .. } => {
                "Please wait for the previous action to finish.".to_string()
            }
            MutationError::NotSignedIn(kind) => format!("Please login to {}.", kind),
            MutationError::Rejected { source, .. } => source.to_string(),
            MutationError::Failed { kind, .. } => match kind {
                MutationKind::Like => "Failed to update like.".to_string(),
                MutationKind::Favorite => "Failed to update favorite.".to_string(),
                MutationKind::Rate => "Failed to submit rating.".to_string(),
                MutationKind::CommentPost => "Failed to post comment.".to_string(),
                MutationKind::CommentDelete => "Failed to delete comment.".to_string(),
            },
        }
    }
}
