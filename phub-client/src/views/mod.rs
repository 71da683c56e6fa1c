//! Interactive views
//!
//! Each view owns its fetched state and its own [`MutationController`];
//! nothing is cached across views. A like performed in one view shows up in
//! another only after that view re-fetches.

mod browse;
mod cards;
mod comments;
mod favorites;
mod profile;
mod project_detail;
mod state;

pub use browse::ProjectListView;
pub use comments::CommentsView;
pub use favorites::FavoritesView;
pub use profile::ProfileView;
pub use project_detail::ProjectDetailView;
pub use state::ViewState;

use crate::api::Backend;
use crate::error::{ApiError, MutationError};
use crate::mutation::{Mutation, MutationController};
use crate::session::{SessionUser, SessionWatch};
use phub_common::{EventBus, MutationKind};
use std::sync::Arc;
use tracing::debug;

/// What every view is built from
#[derive(Clone)]
pub struct ViewContext {
    pub backend: Arc<dyn Backend>,
    pub session: SessionWatch,
    pub events: EventBus,
}

impl ViewContext {
    pub fn new(backend: Arc<dyn Backend>, session: SessionWatch, events: EventBus) -> Self {
        Self {
            backend,
            session,
            events,
        }
    }
}

/// Per-view plumbing shared by all views
pub(crate) struct ViewCore {
    backend: Arc<dyn Backend>,
    session: SessionWatch,
    mutations: MutationController,
    /// Inline error text for the last failed action
    error: ViewState<Option<String>>,
}

impl ViewCore {
    fn new(ctx: &ViewContext) -> Self {
        Self {
            backend: Arc::clone(&ctx.backend),
            session: ctx.session.clone(),
            mutations: MutationController::new(ctx.events.clone()),
            error: ViewState::new(None),
        }
    }

    fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    fn user(&self) -> Option<SessionUser> {
        self.session.user()
    }

    fn user_id(&self) -> Option<String> {
        self.session.user_id()
    }

    fn require_user(&self, kind: MutationKind) -> Result<SessionUser, MutationError> {
        self.user().ok_or_else(|| {
            let err = MutationError::NotSignedIn(kind);
            self.record(&err);
            err
        })
    }

    fn error(&self) -> Option<String> {
        self.error.get()
    }

    fn clear_error(&self) {
        self.error.set(None);
    }

    fn record_api_error(&self, err: &ApiError) {
        self.error.set(Some(err.to_string()));
    }

    fn record(&self, err: &MutationError) {
        // a busy click is ignored, not reported
        if !matches!(err, MutationError::Busy { .. }) {
            self.error.set(Some(err.user_message()));
        }
    }

    /// Run a mutation on behalf of the signed-in user
    async fn mutate<M: Mutation>(
        &self,
        mutation: &M,
        state: &ViewState<M::Value>,
    ) -> Result<M::Value, MutationError> {
        self.require_user(mutation.kind())?;
        match self.mutations.run(mutation, state).await {
            Ok(value) => {
                self.clear_error();
                Ok(value)
            }
            Err(e) => {
                debug!(kind = %e.kind(), error = %e, "View action failed");
                self.record(&e);
                Err(e)
            }
        }
    }

    fn reject(&self, kind: MutationKind, source: ApiError) -> MutationError {
        let err = MutationError::Rejected { kind, source };
        self.record(&err);
        err
    }
}
