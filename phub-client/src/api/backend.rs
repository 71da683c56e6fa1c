//! Typed backend endpoints
//!
//! [`Backend`] is the seam between the client core and the REST backend.
//! [`ApiClient`] implements it over HTTP; tests substitute an in-memory fake.

use super::client::{ApiClient, ApiRequest};
use crate::error::ApiError;
use async_trait::async_trait;
use phub_common::models::{
    ApplicationUser, Comment, FavoriteToggleResponse, LikeResponse, NewComment, NewUser,
    ProfileUpdate, Project, ProjectPage, ProjectQuery, RateRequest, RateResponse,
};
use serde::de::DeserializeOwned;
use tracing::warn;

#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /users/me`
    async fn fetch_current_user(&self) -> Result<ApplicationUser, ApiError>;

    /// `POST /users`
    async fn create_user(&self, user: &NewUser) -> Result<ApplicationUser, ApiError>;

    /// `POST /users/profile`
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError>;

    /// `GET /projects`
    async fn list_projects(&self, query: &ProjectQuery) -> Result<ProjectPage, ApiError>;

    /// `GET /projects/:id`
    async fn get_project(&self, id: &str) -> Result<Project, ApiError>;

    /// `DELETE /projects/:id`
    async fn delete_project(&self, id: &str) -> Result<(), ApiError>;

    /// `POST /projects/:id/like`
    async fn like_project(&self, id: &str) -> Result<LikeResponse, ApiError>;

    /// `POST /projects/:id/rate`
    async fn rate_project(&self, id: &str, rating: u8) -> Result<RateResponse, ApiError>;

    /// `GET /users/favorites`
    async fn list_favorites(&self) -> Result<Vec<Project>, ApiError>;

    /// `POST /users/favorites/:id`
    async fn toggle_favorite(&self, id: &str) -> Result<FavoriteToggleResponse, ApiError>;

    /// `GET /comments/project/:id`
    async fn list_comments(&self, project_id: &str) -> Result<Vec<Comment>, ApiError>;

    /// `POST /comments`
    async fn post_comment(&self, comment: &NewComment) -> Result<(), ApiError>;

    /// `DELETE /comments/:id`
    async fn delete_comment(&self, id: &str) -> Result<(), ApiError>;
}

/// Decode a JSON array, treating any other shape as empty
fn array_or_empty<T: DeserializeOwned>(
    value: serde_json::Value,
    what: &str,
) -> Result<Vec<T>, ApiError> {
    match value {
        serde_json::Value::Array(_) => serde_json::from_value(value).map_err(|e| {
            ApiError::Unknown {
                status: None,
                message: format!("invalid {} list: {}", what, e),
            }
        }),
        other => {
            warn!(body = %other, "Expected a {} list, treating as empty", what);
            Ok(Vec::new())
        }
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn fetch_current_user(&self) -> Result<ApplicationUser, ApiError> {
        self.call(ApiRequest::get("/users/me")).await
    }

    async fn create_user(&self, user: &NewUser) -> Result<ApplicationUser, ApiError> {
        self.call(ApiRequest::post("/users").json(user)?).await
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        self.call_empty(ApiRequest::post("/users/profile").json(update)?)
            .await
    }

    async fn list_projects(&self, query: &ProjectQuery) -> Result<ProjectPage, ApiError> {
        let mut request = ApiRequest::get("/projects")
            .query("page", query.page)
            .query("limit", query.limit);
        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            request = request.query("search", search);
        }
        if let Some(tag) = query.tag.as_deref().filter(|s| !s.is_empty()) {
            request = request.query("tag", tag);
        }

        let mut value = self
            .send(request)
            .await?
            .error_for_status()?
            .json_value()?;

        let projects = array_or_empty(
            value
                .get_mut("projects")
                .map(serde_json::Value::take)
                .unwrap_or_default(),
            "project",
        )?;
        let total_pages = value
            .get("totalPages")
            .and_then(|v| v.as_u64())
            .map(|n| n as u32);

        Ok(ProjectPage {
            projects,
            total_pages,
        })
    }

    async fn get_project(&self, id: &str) -> Result<Project, ApiError> {
        self.call(ApiRequest::get(format!("/projects/{}", id))).await
    }

    async fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        self.call_empty(ApiRequest::delete(format!("/projects/{}", id)))
            .await
    }

    async fn like_project(&self, id: &str) -> Result<LikeResponse, ApiError> {
        self.call(ApiRequest::post(format!("/projects/{}/like", id)))
            .await
    }

    async fn rate_project(&self, id: &str, rating: u8) -> Result<RateResponse, ApiError> {
        let request =
            ApiRequest::post(format!("/projects/{}/rate", id)).json(&RateRequest { rating })?;
        let value = self.send(request).await?.error_for_status()?.json_value()?;
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn list_favorites(&self) -> Result<Vec<Project>, ApiError> {
        let value = self
            .send(ApiRequest::get("/users/favorites"))
            .await?
            .error_for_status()?
            .json_value()?;
        array_or_empty(value, "favorite")
    }

    async fn toggle_favorite(&self, id: &str) -> Result<FavoriteToggleResponse, ApiError> {
        let value = self
            .send(ApiRequest::post(format!("/users/favorites/{}", id)))
            .await?
            .error_for_status()?
            .json_value()?;

        // Some deployments answer with the bare favorites list
        if value.is_array() {
            return Ok(FavoriteToggleResponse {
                is_favorite: None,
                favorites: serde_json::from_value(value).ok(),
            });
        }
        Ok(serde_json::from_value(value).unwrap_or_default())
    }

    async fn list_comments(&self, project_id: &str) -> Result<Vec<Comment>, ApiError> {
        let value = self
            .send(ApiRequest::get(format!("/comments/project/{}", project_id)))
            .await?
            .error_for_status()?
            .json_value()?;
        array_or_empty(value, "comment")
    }

    async fn post_comment(&self, comment: &NewComment) -> Result<(), ApiError> {
        self.call_empty(ApiRequest::post("/comments").json(comment)?)
            .await
    }

    async fn delete_comment(&self, id: &str) -> Result<(), ApiError> {
        self.call_empty(ApiRequest::delete(format!("/comments/{}", id)))
            .await
    }
}
