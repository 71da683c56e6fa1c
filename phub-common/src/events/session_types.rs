//! Session and mutation discriminants shared across event payloads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a session settled in the degraded state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// Profile not found and the follow-up create request failed
    ProfileCreationFailed,
    /// Backend answered with a server error
    ServerUnavailable,
    /// Backend could not be reached (includes timeouts)
    Offline,
    /// Any other failure
    Unknown,
}

impl DegradeReason {
    /// Banner text shown while the session is degraded
    pub fn warning(&self) -> &'static str {
        match self {
            DegradeReason::ProfileCreationFailed => {
                "Using limited user profile. Some features may not work correctly."
            }
            DegradeReason::ServerUnavailable => {
                "Server temporarily unavailable. Using cached profile."
            }
            DegradeReason::Offline => "Network connection issue. Working in offline mode.",
            DegradeReason::Unknown => {
                "Unable to load full profile. Some features may be limited."
            }
        }
    }
}

/// Session status as seen by views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SessionStatus {
    Unauthenticated,
    /// Waiting for the backend profile; views show a loading state
    Resolving,
    Authenticated,
    Degraded(DegradeReason),
    /// The identity provider itself reported a failure
    Error(String),
}

impl SessionStatus {
    /// True once the session has left `Resolving`
    pub fn is_settled(&self) -> bool {
        !matches!(self, SessionStatus::Resolving)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Unauthenticated => write!(f, "unauthenticated"),
            SessionStatus::Resolving => write!(f, "resolving"),
            SessionStatus::Authenticated => write!(f, "authenticated"),
            SessionStatus::Degraded(reason) => write!(f, "degraded ({:?})", reason),
            SessionStatus::Error(msg) => write!(f, "error ({})", msg),
        }
    }
}

/// Kinds of optimistic mutation a view can perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Like,
    Favorite,
    Rate,
    CommentPost,
    CommentDelete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Like => "like",
            MutationKind::Favorite => "favorite",
            MutationKind::Rate => "rate",
            MutationKind::CommentPost => "comment",
            MutationKind::CommentDelete => "delete comment",
        };
        f.write_str(name)
    }
}
