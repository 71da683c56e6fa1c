//! # ProjectHub Common Library
//!
//! Shared code for the ProjectHub client crates:
//! - Backend data model (users, projects, comments)
//! - Client event types and the EventBus
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod error;
pub mod events;
pub mod models;

pub use error::{Error, Result};
pub use events::{ClientEvent, DegradeReason, EventBus, MutationKind, SessionStatus};
pub use models::{ApplicationUser, Comment, DocRef, Identity, Project};
