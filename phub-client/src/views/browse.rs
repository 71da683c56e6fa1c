//! Paginated project browser (`GET /projects`)

use super::cards::ProjectDeck;
use super::{ViewContext, ViewCore, ViewState};
use crate::error::{ApiError, MutationError};
use crate::mutation::LikeState;
use phub_common::models::ProjectQuery;
use phub_common::{MutationKind, Project};
use tracing::{debug, warn};

pub struct ProjectListView {
    core: ViewCore,
    query: ViewState<ProjectQuery>,
    total_pages: ViewState<u32>,
    deck: ProjectDeck,
}

impl ProjectListView {
    pub fn new(ctx: &ViewContext) -> Self {
        Self {
            core: ViewCore::new(ctx),
            query: ViewState::new(ProjectQuery::default()),
            total_pages: ViewState::new(1),
            deck: ProjectDeck::default(),
        }
    }

    pub fn query(&self) -> ProjectQuery {
        self.query.get()
    }

    pub fn set_page(&self, page: u32) {
        self.query.update(|q| q.page = page.max(1));
    }

    /// New search text; returns to the first page
    pub fn set_search(&self, search: Option<String>) {
        let search = search.filter(|s| !s.trim().is_empty());
        self.query.update(|q| {
            q.search = search;
            q.page = 1;
        });
    }

    /// New tag filter; returns to the first page
    pub fn set_tag(&self, tag: Option<String>) {
        let tag = tag.filter(|t| !t.trim().is_empty());
        self.query.update(|q| {
            q.tag = tag;
            q.page = 1;
        });
    }

    /// Fetch the current page
    ///
    /// When refreshes overlap, the one started last decides what is shown.
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let query = self.query.get();
        let mark = self.deck.mark();

        let page = match self.core.backend.list_projects(&query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(page = query.page, error = %e, "Failed to fetch projects");
                self.core.record_api_error(&e);
                return Err(e);
            }
        };

        let user_id = self.core.user_id();
        if self
            .deck
            .apply(&mark, page.projects, user_id.as_deref(), &self.core)
        {
            self.total_pages.set(page.total_pages.unwrap_or(1).max(1));
            self.core.clear_error();
        }
        debug!(page = query.page, count = self.deck.len(), "Fetched projects");
        Ok(())
    }

    pub fn projects(&self) -> Vec<Project> {
        self.deck.projects()
    }

    pub fn like_state(&self, project_id: &str) -> Option<LikeState> {
        self.deck.like_state(project_id)
    }

    pub fn total_pages(&self) -> u32 {
        self.total_pages.get()
    }

    pub fn error(&self) -> Option<String> {
        self.core.error()
    }

    pub fn is_pending(&self, project_id: &str) -> bool {
        self.core.mutations.is_pending(project_id, MutationKind::Like)
    }

    /// Like or unlike a card, then reload the page
    ///
    /// A failed reload leaves the reconciled like state in place.
    pub async fn toggle_like(&self, project_id: &str) -> Result<LikeState, MutationError> {
        let state = self.deck.toggle_like(&self.core, project_id).await?;
        if let Err(e) = self.refresh().await {
            debug!(project = %project_id, error = %e, "Reload after like failed");
        }
        Ok(self.like_state(project_id).unwrap_or(state))
    }
}
