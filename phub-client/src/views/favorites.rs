//! The signed-in user's favorite projects (`GET /users/favorites`)

use super::cards::ProjectDeck;
use super::{ViewContext, ViewCore};
use crate::error::{ApiError, MutationError};
use crate::mutation::LikeState;
use phub_common::Project;
use tracing::{debug, warn};

pub struct FavoritesView {
    core: ViewCore,
    deck: ProjectDeck,
}

impl FavoritesView {
    pub fn new(ctx: &ViewContext) -> Self {
        Self {
            core: ViewCore::new(ctx),
            deck: ProjectDeck::default(),
        }
    }

    /// Fetch favorites; signed out means an empty list and no request
    pub async fn refresh(&self) -> Result<(), ApiError> {
        if self.core.user().is_none() {
            self.deck.clear();
            return Ok(());
        }

        let mark = self.deck.mark();
        let projects = match self.core.backend.list_favorites().await {
            Ok(projects) => projects,
            Err(e) => {
                warn!(error = %e, "Failed to fetch favorites");
                self.core.record_api_error(&e);
                return Err(e);
            }
        };

        let user_id = self.core.user_id();
        if self
            .deck
            .apply(&mark, projects, user_id.as_deref(), &self.core)
        {
            self.core.clear_error();
        }
        debug!(count = self.deck.len(), "Fetched favorites");
        Ok(())
    }

    pub fn projects(&self) -> Vec<Project> {
        self.deck.projects()
    }

    pub fn like_state(&self, project_id: &str) -> Option<LikeState> {
        self.deck.like_state(project_id)
    }

    pub fn error(&self) -> Option<String> {
        self.core.error()
    }

    /// Like or unlike a favorite, then reload favorites
    pub async fn toggle_like(&self, project_id: &str) -> Result<LikeState, MutationError> {
        let state = self.deck.toggle_like(&self.core, project_id).await?;
        if let Err(e) = self.refresh().await {
            debug!(project = %project_id, error = %e, "Reload after like failed");
        }
        Ok(self.like_state(project_id).unwrap_or(state))
    }
}
