//! Per-kind prediction and reconciliation
//!
//! | kind          | prediction              | reconciliation                    |
//! |---------------|-------------------------|-----------------------------------|
//! | Like          | toggle, count +/- 1     | server like count                 |
//! | Favorite      | toggle                  | server flag when the reply has one|
//! | Rate          | replace user's rating   | server average                    |
//! | CommentPost   | insert temporary entry  | re-fetch the authoritative list   |
//! | CommentDelete | remove entry            | keep the prediction               |

use super::Mutation;
use crate::api::Backend;
use crate::error::ApiError;
use async_trait::async_trait;
use phub_common::models::{
    Comment, FavoriteToggleResponse, LikeResponse, NewComment, Project, RateResponse,
};
use phub_common::MutationKind;
use std::sync::Arc;

/// Like button state of one project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LikeState {
    pub liked: bool,
    pub count: u64,
}

impl LikeState {
    pub fn from_project(project: &Project, user_id: Option<&str>) -> Self {
        Self {
            liked: user_id.is_some_and(|id| project.is_liked_by(id)),
            count: project.like_count(),
        }
    }
}

/// `POST /projects/:id/like`
pub struct ToggleLike {
    backend: Arc<dyn Backend>,
    project_id: String,
}

impl ToggleLike {
    pub fn new(backend: Arc<dyn Backend>, project_id: impl Into<String>) -> Self {
        Self {
            backend,
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl Mutation for ToggleLike {
    type Value = LikeState;
    type Response = LikeResponse;

    fn kind(&self) -> MutationKind {
        MutationKind::Like
    }

    fn target_id(&self) -> &str {
        &self.project_id
    }

    fn predict(&self, current: &LikeState) -> LikeState {
        let liked = !current.liked;
        LikeState {
            liked,
            count: if liked {
                current.count + 1
            } else {
                current.count.saturating_sub(1)
            },
        }
    }

    async fn send(&self) -> Result<LikeResponse, ApiError> {
        self.backend.like_project(&self.project_id).await
    }

    async fn reconcile(
        &self,
        predicted: LikeState,
        response: LikeResponse,
    ) -> Result<LikeState, ApiError> {
        Ok(LikeState {
            liked: predicted.liked,
            count: response.likes,
        })
    }
}

/// `POST /users/favorites/:id`
pub struct ToggleFavorite {
    backend: Arc<dyn Backend>,
    project_id: String,
}

impl ToggleFavorite {
    pub fn new(backend: Arc<dyn Backend>, project_id: impl Into<String>) -> Self {
        Self {
            backend,
            project_id: project_id.into(),
        }
    }
}

#[async_trait]
impl Mutation for ToggleFavorite {
    type Value = bool;
    type Response = FavoriteToggleResponse;

    fn kind(&self) -> MutationKind {
        MutationKind::Favorite
    }

    fn target_id(&self) -> &str {
        &self.project_id
    }

    fn predict(&self, current: &bool) -> bool {
        !current
    }

    async fn send(&self) -> Result<FavoriteToggleResponse, ApiError> {
        self.backend.toggle_favorite(&self.project_id).await
    }

    async fn reconcile(
        &self,
        predicted: bool,
        response: FavoriteToggleResponse,
    ) -> Result<bool, ApiError> {
        Ok(response
            .favorite_state(&self.project_id)
            .unwrap_or(predicted))
    }
}

/// The user's rating of a project and the project average
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingState {
    /// At most one rating per user; a new submission replaces it
    pub user_rating: Option<u8>,
    pub average: f64,
}

impl RatingState {
    pub fn from_project(project: &Project, user_id: Option<&str>) -> Self {
        Self {
            user_rating: user_id.and_then(|id| project.rating_by(id)),
            average: project.average_rating,
        }
    }
}

/// `POST /projects/:id/rate`
pub struct SubmitRating {
    backend: Arc<dyn Backend>,
    project_id: String,
    rating: u8,
}

impl SubmitRating {
    /// Ratings outside 1..=5 are refused before anything is predicted
    pub fn new(
        backend: Arc<dyn Backend>,
        project_id: impl Into<String>,
        rating: u8,
    ) -> Result<Self, ApiError> {
        if !(1..=5).contains(&rating) {
            return Err(ApiError::ValidationError(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }
        Ok(Self {
            backend,
            project_id: project_id.into(),
            rating,
        })
    }
}

#[async_trait]
impl Mutation for SubmitRating {
    type Value = RatingState;
    type Response = RateResponse;

    fn kind(&self) -> MutationKind {
        MutationKind::Rate
    }

    fn target_id(&self) -> &str {
        &self.project_id
    }

    fn predict(&self, current: &RatingState) -> RatingState {
        RatingState {
            user_rating: Some(self.rating),
            average: current.average,
        }
    }

    async fn send(&self) -> Result<RateResponse, ApiError> {
        self.backend.rate_project(&self.project_id, self.rating).await
    }

    async fn reconcile(
        &self,
        predicted: RatingState,
        response: RateResponse,
    ) -> Result<RatingState, ApiError> {
        Ok(RatingState {
            user_rating: predicted.user_rating,
            average: response.average_rating.unwrap_or(predicted.average),
        })
    }
}

/// `POST /comments`
pub struct PostComment {
    backend: Arc<dyn Backend>,
    project_id: String,
    text: String,
    temporary: Comment,
}

impl PostComment {
    /// `author_id` is `None` for a minimal (degraded) session user
    pub fn new(
        backend: Arc<dyn Backend>,
        project_id: impl Into<String>,
        text: impl Into<String>,
        author_name: impl Into<String>,
        author_id: Option<String>,
        author_photo: Option<String>,
    ) -> Self {
        let text = text.into();
        let temporary = Comment::temporary(text.clone(), author_name, author_id, author_photo);
        Self {
            backend,
            project_id: project_id.into(),
            text,
            temporary,
        }
    }

    /// Id of the placeholder entry shown while the post is in flight
    pub fn temporary_id(&self) -> &str {
        &self.temporary.id
    }
}

#[async_trait]
impl Mutation for PostComment {
    type Value = Vec<Comment>;
    type Response = ();

    fn kind(&self) -> MutationKind {
        MutationKind::CommentPost
    }

    fn target_id(&self) -> &str {
        &self.project_id
    }

    fn predict(&self, current: &Vec<Comment>) -> Vec<Comment> {
        let mut comments = Vec::with_capacity(current.len() + 1);
        comments.push(self.temporary.clone());
        comments.extend(current.iter().cloned());
        comments
    }

    async fn send(&self) -> Result<(), ApiError> {
        self.backend
            .post_comment(&NewComment {
                text: self.text.clone(),
                project_id: self.project_id.clone(),
            })
            .await
    }

    /// The temporary entry is dropped, never merged: the server list
    /// replaces it
    async fn reconcile(
        &self,
        _predicted: Vec<Comment>,
        _response: (),
    ) -> Result<Vec<Comment>, ApiError> {
        self.backend.list_comments(&self.project_id).await
    }

    /// The server list wins outright unless the list changed while the post
    /// was in flight. Otherwise comments removed locally in the meantime
    /// stay removed.
    fn settle(
        &self,
        current: &Vec<Comment>,
        previous: &Vec<Comment>,
        reconciled: Vec<Comment>,
    ) -> Vec<Comment> {
        let untouched = current.len() == previous.len() + 1
            && current[0].id == self.temporary.id
            && same_ids(&current[1..], previous);
        if untouched {
            return reconciled;
        }
        reconciled
            .into_iter()
            .filter(|c| !contains(previous, &c.id) || contains(current, &c.id))
            .collect()
    }

    fn revert(&self, current: &Vec<Comment>, _previous: &Vec<Comment>) -> Vec<Comment> {
        current
            .iter()
            .filter(|c| c.id != self.temporary.id)
            .cloned()
            .collect()
    }
}

/// `DELETE /comments/:id`
pub struct DeleteComment {
    backend: Arc<dyn Backend>,
    comment_id: String,
}

impl DeleteComment {
    pub fn new(backend: Arc<dyn Backend>, comment_id: impl Into<String>) -> Self {
        Self {
            backend,
            comment_id: comment_id.into(),
        }
    }
}

#[async_trait]
impl Mutation for DeleteComment {
    type Value = Vec<Comment>;
    type Response = ();

    fn kind(&self) -> MutationKind {
        MutationKind::CommentDelete
    }

    fn target_id(&self) -> &str {
        &self.comment_id
    }

    fn predict(&self, current: &Vec<Comment>) -> Vec<Comment> {
        current
            .iter()
            .filter(|c| c.id != self.comment_id)
            .cloned()
            .collect()
    }

    async fn send(&self) -> Result<(), ApiError> {
        self.backend.delete_comment(&self.comment_id).await
    }

    async fn reconcile(
        &self,
        predicted: Vec<Comment>,
        _response: (),
    ) -> Result<Vec<Comment>, ApiError> {
        Ok(predicted)
    }

    fn settle(
        &self,
        current: &Vec<Comment>,
        _previous: &Vec<Comment>,
        _reconciled: Vec<Comment>,
    ) -> Vec<Comment> {
        self.predict(current)
    }

    /// Put the comment back where it was, next to its old neighbours
    fn revert(&self, current: &Vec<Comment>, previous: &Vec<Comment>) -> Vec<Comment> {
        let mut restored = current.clone();
        if contains(current, &self.comment_id) {
            return restored;
        }
        let Some(pos) = previous.iter().position(|c| c.id == self.comment_id) else {
            return restored;
        };
        let at = previous[pos + 1..]
            .iter()
            .find_map(|next| current.iter().position(|c| c.id == next.id))
            .unwrap_or(current.len());
        restored.insert(at, previous[pos].clone());
        restored
    }
}

fn contains(comments: &[Comment], id: &str) -> bool {
    comments.iter().any(|c| c.id == id)
}

fn same_ids(a: &[Comment], b: &[Comment]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.id == y.id)
}
