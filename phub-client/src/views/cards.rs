//! Project card lists shared by the browse and favorites views

use super::{ViewCore, ViewState};
use crate::error::{ApiError, MutationError};
use crate::mutation::{LikeState, ToggleLike};
use phub_common::{MutationKind, Project};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Request number and like cell versions captured when a fetch starts
pub(crate) struct FetchMark {
    request: u64,
    likes: HashMap<String, u64>,
}

/// Ordered projects plus one like cell per card
///
/// Like cells survive refreshes so an in-flight like keeps writing to the
/// cell the card displays. Only the most recently started fetch may install
/// its list.
#[derive(Default)]
pub(crate) struct ProjectDeck {
    projects: ViewState<Vec<Project>>,
    likes: ViewState<HashMap<String, ViewState<LikeState>>>,
    latest_request: Mutex<u64>,
}

impl ProjectDeck {
    fn latest_request(&self) -> MutexGuard<'_, u64> {
        self.latest_request.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a fetch; supersedes every fetch started before it
    pub(crate) fn mark(&self) -> FetchMark {
        let request = {
            let mut latest = self.latest_request();
            *latest += 1;
            *latest
        };
        FetchMark {
            request,
            likes: self
                .likes
                .with(|cells| cells.iter().map(|(id, c)| (id.clone(), c.version())).collect()),
        }
    }

    /// Install fetched projects unless a newer fetch was started since
    ///
    /// A like cell written since `mark` (or still pending) keeps its local
    /// value; every other cell takes the fetched state.
    pub(crate) fn apply(
        &self,
        mark: &FetchMark,
        projects: Vec<Project>,
        user_id: Option<&str>,
        core: &ViewCore,
    ) -> bool {
        let fresh: Vec<(String, LikeState)> = projects
            .iter()
            .map(|p| (p.id.clone(), LikeState::from_project(p, user_id)))
            .collect();

        let latest = self.latest_request();
        if *latest != mark.request {
            debug!(
                request = mark.request,
                latest = *latest,
                "Discarding project list superseded by a newer fetch"
            );
            return false;
        }
        self.projects.set(projects);

        let existing = self.likes.get();
        let mut cells = HashMap::with_capacity(fresh.len());
        for (id, state) in fresh {
            let cell = match existing.get(&id) {
                Some(cell) => {
                    let pending = core.mutations.is_pending(&id, MutationKind::Like);
                    let since = mark.likes.get(&id).copied().unwrap_or(cell.version());
                    if pending || !cell.set_if_version(since, state) {
                        debug!(project = %id, "Keeping local like state over fetched state");
                    }
                    cell.clone()
                }
                None => ViewState::new(state),
            };
            cells.insert(id, cell);
        }
        self.likes.set(cells);
        true
    }

    /// Empty the deck; fetches still in flight land nowhere
    pub(crate) fn clear(&self) {
        *self.latest_request() += 1;
        self.projects.set(Vec::new());
        self.likes.set(HashMap::new());
    }

    pub(crate) fn projects(&self) -> Vec<Project> {
        self.projects.get()
    }

    pub(crate) fn len(&self) -> usize {
        self.projects.with(Vec::len)
    }

    pub(crate) fn like_cell(&self, project_id: &str) -> Option<ViewState<LikeState>> {
        self.likes.with(|cells| cells.get(project_id).cloned())
    }

    pub(crate) fn like_state(&self, project_id: &str) -> Option<LikeState> {
        self.like_cell(project_id).map(|c| c.get())
    }

    /// Optimistic like on one card
    pub(crate) async fn toggle_like(
        &self,
        core: &ViewCore,
        project_id: &str,
    ) -> Result<LikeState, MutationError> {
        let Some(cell) = self.like_cell(project_id) else {
            return Err(core.reject(
                MutationKind::Like,
                ApiError::NotFound(format!("project {} is not listed", project_id)),
            ));
        };
        let mutation = ToggleLike::new(core.backend(), project_id);
        core.mutate(&mutation, &cell).await
    }
}
