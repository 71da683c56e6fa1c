//! Single project page: like, favorite, rate, delete
//!
//! The favorite flag is derived from favorites-list membership. That fetch
//! runs independently of the toggle, so its result is applied only if the
//! flag was not written while it was in flight; a user's own toggle always
//! wins over a slower fetch.

use super::{ViewContext, ViewCore, ViewState};
use crate::error::{ApiError, MutationError};
use crate::mutation::{LikeState, RatingState, SubmitRating, ToggleFavorite, ToggleLike};
use phub_common::{MutationKind, Project};
use tracing::{debug, info, warn};

pub struct ProjectDetailView {
    core: ViewCore,
    project_id: String,
    project: ViewState<Option<Project>>,
    like: ViewState<LikeState>,
    rating: ViewState<RatingState>,
    favorite: ViewState<bool>,
}

impl ProjectDetailView {
    pub fn new(ctx: &ViewContext, project_id: impl Into<String>) -> Self {
        Self {
            core: ViewCore::new(ctx),
            project_id: project_id.into(),
            project: ViewState::new(None),
            like: ViewState::default(),
            rating: ViewState::default(),
            favorite: ViewState::new(false),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Fetch the project and the favorite flag concurrently
    pub async fn load(&self) -> Result<(), ApiError> {
        let (project, favorite) = tokio::join!(self.refresh_project(), self.check_favorite());
        project?;
        favorite
    }

    /// `GET /projects/:id`
    pub async fn refresh_project(&self) -> Result<(), ApiError> {
        let project_mark = self.project.version();
        let like_mark = self.like.version();
        let rating_mark = self.rating.version();

        let project = match self.core.backend.get_project(&self.project_id).await {
            Ok(project) => project,
            Err(e) => {
                warn!(project = %self.project_id, error = %e, "Failed to fetch project");
                self.core.record_api_error(&e);
                return Err(e);
            }
        };

        let user_id = self.core.user_id();
        let like = LikeState::from_project(&project, user_id.as_deref());
        let rating = RatingState::from_project(&project, user_id.as_deref());

        if !self.is_pending(MutationKind::Like) && !self.like.set_if_version(like_mark, like) {
            debug!(project = %self.project_id, "Keeping local like state");
        }
        if !self.is_pending(MutationKind::Rate) && !self.rating.set_if_version(rating_mark, rating)
        {
            debug!(project = %self.project_id, "Keeping local rating");
        }
        self.project.set_if_version(project_mark, Some(project));
        Ok(())
    }

    /// Favorite flag from `GET /users/favorites` membership
    ///
    /// Skipped without a user.
    pub async fn check_favorite(&self) -> Result<(), ApiError> {
        if self.core.user().is_none() {
            return Ok(());
        }

        let mark = self.favorite.version();
        let favorites = match self.core.backend.list_favorites().await {
            Ok(favorites) => favorites,
            Err(e) => {
                warn!(project = %self.project_id, error = %e, "Failed to check favorite status");
                return Err(e);
            }
        };

        let is_favorite = favorites.iter().any(|p| p.id == self.project_id);
        if self.is_pending(MutationKind::Favorite) || !self.favorite.set_if_version(mark, is_favorite)
        {
            debug!(
                project = %self.project_id,
                fetched = is_favorite,
                "Favorite toggled during fetch, keeping local state"
            );
        }
        Ok(())
    }

    pub fn project(&self) -> Option<Project> {
        self.project.get()
    }

    pub fn like_state(&self) -> LikeState {
        self.like.get()
    }

    pub fn rating(&self) -> RatingState {
        self.rating.get()
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite.get()
    }

    pub fn error(&self) -> Option<String> {
        self.core.error()
    }

    pub fn is_pending(&self, kind: MutationKind) -> bool {
        self.core.mutations.is_pending(&self.project_id, kind)
    }

    /// True when the session user wrote this project
    pub fn is_owner(&self) -> bool {
        let Some(user_id) = self.core.user_id() else {
            return false;
        };
        self.project
            .with(|p| p.as_ref().is_some_and(|p| p.author.id == user_id))
    }

    pub async fn toggle_like(&self) -> Result<LikeState, MutationError> {
        let mutation = ToggleLike::new(self.core.backend(), &self.project_id);
        self.core.mutate(&mutation, &self.like).await
    }

    pub async fn toggle_favorite(&self) -> Result<bool, MutationError> {
        let mutation = ToggleFavorite::new(self.core.backend(), &self.project_id);
        self.core.mutate(&mutation, &self.favorite).await
    }

    /// Submit a 1..=5 rating, replacing any earlier rating by this user
    ///
    /// The project is re-fetched afterwards so the rating list and average
    /// match the server.
    pub async fn rate(&self, value: u8) -> Result<RatingState, MutationError> {
        let mutation = SubmitRating::new(self.core.backend(), &self.project_id, value)
            .map_err(|e| self.core.reject(MutationKind::Rate, e))?;
        self.core.mutate(&mutation, &self.rating).await?;
        if let Err(e) = self.refresh_project().await {
            debug!(project = %self.project_id, error = %e, "Reload after rating failed");
        }
        Ok(self.rating.get())
    }

    /// `DELETE /projects/:id`; not optimistic, author only
    pub async fn delete_project(&self) -> Result<(), ApiError> {
        if !self.is_owner() {
            let err = ApiError::Unauthorized(
                "Only the author can delete this project".to_string(),
            );
            self.core.record_api_error(&err);
            return Err(err);
        }

        if let Err(e) = self.core.backend.delete_project(&self.project_id).await {
            warn!(project = %self.project_id, error = %e, "Failed to delete project");
            self.core.record_api_error(&e);
            return Err(e);
        }
        info!(project = %self.project_id, "Project deleted");
        self.project.set(None);
        Ok(())
    }
}
