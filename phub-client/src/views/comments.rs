//! Comment thread of one project

use super::{ViewContext, ViewCore, ViewState};
use crate::error::{ApiError, MutationError};
use crate::mutation::{DeleteComment, PostComment};
use phub_common::{Comment, MutationKind};
use tracing::{debug, warn};

pub struct CommentsView {
    core: ViewCore,
    project_id: String,
    comments: ViewState<Vec<Comment>>,
}

impl CommentsView {
    pub fn new(ctx: &ViewContext, project_id: impl Into<String>) -> Self {
        Self {
            core: ViewCore::new(ctx),
            project_id: project_id.into(),
            comments: ViewState::new(Vec::new()),
        }
    }

    /// `GET /comments/project/:id`
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let mark = self.comments.version();
        let comments = match self.core.backend.list_comments(&self.project_id).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(project = %self.project_id, error = %e, "Failed to fetch comments");
                self.core.record_api_error(&e);
                return Err(e);
            }
        };
        if !self.comments.set_if_version(mark, comments) {
            debug!(project = %self.project_id, "Comment list changed during fetch, keeping it");
        }
        Ok(())
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.comments.get()
    }

    pub fn error(&self) -> Option<String> {
        self.core.error()
    }

    pub fn is_posting(&self) -> bool {
        self.core
            .mutations
            .is_pending(&self.project_id, MutationKind::CommentPost)
    }

    pub fn is_deleting(&self, comment_id: &str) -> bool {
        self.core
            .mutations
            .is_pending(comment_id, MutationKind::CommentDelete)
    }

    /// Post a comment as the session user
    ///
    /// Shows a temporary entry right away. On success the whole list is
    /// re-fetched; on failure the temporary entry disappears again.
    pub async fn post(&self, text: &str) -> Result<Vec<Comment>, MutationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.core.reject(
                MutationKind::CommentPost,
                ApiError::ValidationError("Comment cannot be empty".to_string()),
            ));
        }
        let user = self.core.require_user(MutationKind::CommentPost)?;

        let mutation = PostComment::new(
            self.core.backend(),
            &self.project_id,
            text,
            user.display_name(),
            user.id().map(str::to_string),
            user.photo_url().map(str::to_string),
        );
        self.core.mutate(&mutation, &self.comments).await
    }

    /// Delete one of the session user's own comments
    pub async fn delete(&self, comment_id: &str) -> Result<Vec<Comment>, MutationError> {
        let user = self.core.require_user(MutationKind::CommentDelete)?;
        let owned = self.comments.with(|comments| {
            comments.iter().find(|c| c.id == comment_id).map(|c| {
                !c.is_temporary() && user.id().is_some_and(|id| c.is_authored_by(id))
            })
        });

        match owned {
            None => Err(self.core.reject(
                MutationKind::CommentDelete,
                ApiError::NotFound(format!("comment {} is not listed", comment_id)),
            )),
            Some(false) => Err(self.core.reject(
                MutationKind::CommentDelete,
                ApiError::Unauthorized("Only the author can delete this comment".to_string()),
            )),
            Some(true) => {
                let mutation = DeleteComment::new(self.core.backend(), comment_id);
                self.core.mutate(&mutation, &self.comments).await
            }
        }
    }
}
