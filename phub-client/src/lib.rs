//! # ProjectHub client core
//!
//! - `api`: HTTP gateway and typed backend endpoints
//! - `identity`: identity-provider seam and token cache
//! - `session`: the authoritative session and its resolver
//! - `mutation`: optimistic mutation protocol
//! - `views`: interactive views built on the above

pub mod api;
pub mod error;
pub mod identity;
pub mod mutation;
pub mod session;
pub mod views;

pub use api::{ApiClient, Backend};
pub use error::{ApiError, MutationError};
pub use identity::{IdentityEvent, IdentityProvider, StaticIdentityProvider, TokenCache};
pub use mutation::{LikeState, Mutation, MutationController, RatingState};
pub use session::{MinimalUser, Session, SessionResolver, SessionUser, SessionWatch};
pub use views::{
    CommentsView, FavoritesView, ProfileView, ProjectDetailView, ProjectListView, ViewContext,
    ViewState,
};
