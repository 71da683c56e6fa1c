//! Backend data model
//!
//! Wire shapes follow the REST backend: document ids arrive as `_id`,
//! field names are camelCase and photo URLs are spelled `photoURL`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix carried by ids the client invents for optimistic comments
pub const TEMP_ID_PREFIX: &str = "temp-";

/// Identity supplied by the external authentication provider
///
/// Immutable from the client's perspective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            display_name: None,
            photo_url: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_photo_url(mut self, url: impl Into<String>) -> Self {
        self.photo_url = Some(url.into());
        self
    }

    /// Display name, or the local part of the email when the provider has none
    ///
    /// An empty display name counts as absent.
    pub fn fallback_display_name(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }

    /// Profile creation payload seeded from this identity
    pub fn to_new_user(&self) -> NewUser {
        NewUser {
            uid: self.uid.clone(),
            email: self.email.clone(),
            display_name: self.fallback_display_name(),
            photo_url: self.photo_url.clone(),
        }
    }
}

/// Backend profile record (`GET /users/me`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationUser {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// Body of `POST /users/profile`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub display_name: String,
    pub bio: String,
}

/// Reference to another document
///
/// The backend sends either a bare id or a populated object, depending on
/// the endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocRef {
    Id(String),
    Populated {
        #[serde(rename = "_id", alias = "id")]
        id: String,
    },
}

impl DocRef {
    pub fn id(&self) -> &str {
        match self {
            DocRef::Id(id) => id,
            DocRef::Populated { id } => id,
        }
    }
}

/// Project author as embedded in project documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAuthor {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// One user's rating of a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user: DocRef,
    pub value: u8,
}

/// Project document (`GET /projects/:id`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub github_link: Option<String>,
    #[serde(default)]
    pub live_link: Option<String>,
    pub author: ProjectAuthor,
    #[serde(default)]
    pub author_name: Option<String>,
    /// Users who liked the project
    #[serde(default)]
    pub likes: Vec<DocRef>,
    #[serde(default)]
    pub ratings: Vec<Rating>,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Project {
    pub fn like_count(&self) -> u64 {
        self.likes.len() as u64
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.likes.iter().any(|r| r.id() == user_id)
    }

    /// Rating previously submitted by `user_id`, if any
    pub fn rating_by(&self, user_id: &str) -> Option<u8> {
        self.ratings
            .iter()
            .find(|r| r.user.id() == user_id)
            .map(|r| r.value)
    }

    /// Name shown on cards: explicit author name first, then the author profile
    pub fn display_author(&self) -> &str {
        self.author_name
            .as_deref()
            .or(self.author.display_name.as_deref())
            .unwrap_or("")
    }
}

/// One page of `GET /projects`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

/// Query parameters for `GET /projects`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Default for ProjectQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 9,
            search: None,
            tag: None,
        }
    }
}

/// Comment author reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentAuthor {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    #[serde(default, rename = "photoURL")]
    pub photo_url: Option<String>,
}

/// Comment as listed by `GET /comments/project/:id`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_name: String,
    pub author: CommentAuthor,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Locally-predicted comment with a client-issued temporary id
    pub fn temporary(
        text: impl Into<String>,
        author_name: impl Into<String>,
        author_id: Option<String>,
        author_photo: Option<String>,
    ) -> Self {
        Self {
            id: format!("{}{}", TEMP_ID_PREFIX, uuid::Uuid::new_v4()),
            text: text.into(),
            author_name: author_name.into(),
            author: CommentAuthor {
                id: author_id,
                photo_url: author_photo,
            },
            created_at: Utc::now(),
        }
    }

    pub fn is_temporary(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.author.id.as_deref() == Some(user_id)
    }
}

/// Body of `POST /comments`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub text: String,
    pub project_id: String,
}

/// Response of `POST /projects/:id/like`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResponse {
    pub likes: u64,
}

/// Body of `POST /projects/:id/rate`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateRequest {
    pub rating: u8,
}

/// Response of `POST /projects/:id/rate`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateResponse {
    #[serde(default)]
    pub average_rating: Option<f64>,
}

/// Response of `POST /users/favorites/:id`
///
/// The backend may answer with the new flag, with the whole favorites list,
/// or with neither.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteToggleResponse {
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub favorites: Option<Vec<DocRef>>,
}

impl FavoriteToggleResponse {
    /// Server-side favorite flag for `project_id`, when the response carries one
    pub fn favorite_state(&self, project_id: &str) -> Option<bool> {
        if let Some(flag) = self.is_favorite {
            return Some(flag);
        }
        self.favorites
            .as_ref()
            .map(|list| list.iter().any(|r| r.id() == project_id))
    }
}
