//! Test helpers shared by the integration tests
//!
//! `FakeBackend` is an in-memory stand-in for the REST backend. Every
//! endpoint can be made to fail once or to block until the test releases it.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use phub_client::{ApiError, Backend, IdentityEvent, SessionResolver, ViewContext};
use phub_common::models::{
    ApplicationUser, Comment, CommentAuthor, DocRef, FavoriteToggleResponse, Identity,
    LikeResponse, NewComment, NewUser, ProfileUpdate, Project, ProjectAuthor, ProjectPage,
    ProjectQuery, RateResponse, Rating,
};
use phub_common::EventBus;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Backend endpoints, for hooks and call counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    FetchCurrentUser,
    CreateUser,
    UpdateProfile,
    ListProjects,
    GetProject,
    DeleteProject,
    LikeProject,
    RateProject,
    ListFavorites,
    ToggleFavorite,
    ListComments,
    PostComment,
    DeleteComment,
}

enum Hook {
    Fail(ApiError),
    Gate(oneshot::Receiver<()>),
    GateThenFail(oneshot::Receiver<()>, ApiError),
}

#[derive(Default)]
struct Store {
    active_uid: Option<String>,
    users: HashMap<String, ApplicationUser>,
    projects: Vec<Project>,
    favorites: HashMap<String, Vec<String>>,
    comments: Vec<(String, Comment)>,
    next_id: u64,
}

impl Store {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn active_user(&self) -> Result<ApplicationUser, ApiError> {
        let uid = self
            .active_uid
            .as_ref()
            .ok_or_else(|| ApiError::Unauthorized("No token provided".to_string()))?;
        self.users
            .get(uid)
            .cloned()
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    fn project_mut(&mut self, id: &str) -> Result<&mut Project, ApiError> {
        self.projects
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
    }
}

#[derive(Default)]
pub struct FakeBackend {
    store: Mutex<Store>,
    hooks: Mutex<HashMap<Endpoint, VecDeque<Hook>>>,
    calls: Mutex<HashMap<Endpoint, usize>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Requests from now on are made as `uid`
    pub fn sign_in_as(&self, uid: &str) {
        self.store.lock().unwrap().active_uid = Some(uid.to_string());
    }

    pub fn add_user(&self, user: ApplicationUser) {
        self.store
            .lock()
            .unwrap()
            .users
            .insert(user.uid.clone(), user);
    }

    pub fn add_project(&self, project: Project) {
        self.store.lock().unwrap().projects.push(project);
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.store
            .lock()
            .unwrap()
            .projects
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    /// Like recorded directly in the store, as if from another client
    pub fn add_like(&self, project_id: &str, user_id: &str) {
        let mut store = self.store.lock().unwrap();
        if let Ok(project) = store.project_mut(project_id) {
            project.likes.push(DocRef::Id(user_id.to_string()));
        }
    }

    pub fn add_favorite(&self, user_id: &str, project_id: &str) {
        self.store
            .lock()
            .unwrap()
            .favorites
            .entry(user_id.to_string())
            .or_default()
            .push(project_id.to_string());
    }

    pub fn add_comment(&self, project_id: &str, comment: Comment) {
        self.store
            .lock()
            .unwrap()
            .comments
            .push((project_id.to_string(), comment));
    }

    pub fn comments_of(&self, project_id: &str) -> Vec<Comment> {
        self.store
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|(pid, _)| pid == project_id)
            .map(|(_, c)| c.clone())
            .collect()
    }

    /// The next call to `endpoint` fails with `err`
    pub fn fail_next(&self, endpoint: Endpoint, err: ApiError) {
        self.hooks
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(Hook::Fail(err));
    }

    /// The next call to `endpoint` blocks until the returned sender fires
    /// (or is dropped)
    pub fn gate_next(&self, endpoint: Endpoint) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.hooks
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(Hook::Gate(rx));
        tx
    }

    /// Like [`FakeBackend::gate_next`], but the released call fails with
    /// `err` without touching the store
    pub fn gate_then_fail(&self, endpoint: Endpoint, err: ApiError) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.hooks
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(Hook::GateThenFail(rx, err));
        tx
    }

    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&endpoint)
            .copied()
            .unwrap_or(0)
    }

    /// Wait until `endpoint` has been called `count` times
    pub async fn wait_for_calls(&self, endpoint: Endpoint, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls(endpoint) < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{:?} was not called {} times", endpoint, count));
    }

    async fn enter(&self, endpoint: Endpoint) -> Result<(), ApiError> {
        *self.calls.lock().unwrap().entry(endpoint).or_default() += 1;
        let hook = self
            .hooks
            .lock()
            .unwrap()
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front);
        match hook {
            Some(Hook::Fail(err)) => Err(err),
            Some(Hook::Gate(rx)) => {
                let _ = rx.await;
                Ok(())
            }
            Some(Hook::GateThenFail(rx, err)) => {
                let _ = rx.await;
                Err(err)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn fetch_current_user(&self) -> Result<ApplicationUser, ApiError> {
        // the token identifies the caller when the request is made
        let caller = self.store.lock().unwrap().active_user();
        self.enter(Endpoint::FetchCurrentUser).await?;
        caller
    }

    async fn create_user(&self, user: &NewUser) -> Result<ApplicationUser, ApiError> {
        self.enter(Endpoint::CreateUser).await?;
        let mut store = self.store.lock().unwrap();
        let created = ApplicationUser {
            id: store.next_id("user"),
            uid: user.uid.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            photo_url: user.photo_url.clone(),
            bio: None,
            created_at: Utc::now(),
        };
        store.users.insert(created.uid.clone(), created.clone());
        Ok(created)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        self.enter(Endpoint::UpdateProfile).await?;
        let mut store = self.store.lock().unwrap();
        let uid = store.active_user()?.uid;
        if let Some(user) = store.users.get_mut(&uid) {
            user.display_name = update.display_name.clone();
            user.bio = Some(update.bio.clone()).filter(|b| !b.is_empty());
        }
        Ok(())
    }

    async fn list_projects(&self, query: &ProjectQuery) -> Result<ProjectPage, ApiError> {
        self.enter(Endpoint::ListProjects).await?;
        let store = self.store.lock().unwrap();
        let matching: Vec<Project> = store
            .projects
            .iter()
            .filter(|p| {
                query.search.as_deref().map_or(true, |s| {
                    p.title.to_lowercase().contains(&s.to_lowercase())
                })
            })
            .filter(|p| query.tag.as_deref().map_or(true, |t| p.tags.iter().any(|x| x == t)))
            .cloned()
            .collect();

        let limit = query.limit.max(1) as usize;
        let total_pages = matching.len().div_ceil(limit).max(1) as u32;
        let start = (query.page.max(1) as usize - 1) * limit;
        Ok(ProjectPage {
            projects: matching.into_iter().skip(start).take(limit).collect(),
            total_pages: Some(total_pages),
        })
    }

    async fn get_project(&self, id: &str) -> Result<Project, ApiError> {
        self.enter(Endpoint::GetProject).await?;
        self.project(id)
            .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
    }

    async fn delete_project(&self, id: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::DeleteProject).await?;
        let mut store = self.store.lock().unwrap();
        let before = store.projects.len();
        store.projects.retain(|p| p.id != id);
        if store.projects.len() == before {
            return Err(ApiError::NotFound("Project not found".to_string()));
        }
        Ok(())
    }

    async fn like_project(&self, id: &str) -> Result<LikeResponse, ApiError> {
        self.enter(Endpoint::LikeProject).await?;
        let mut store = self.store.lock().unwrap();
        let user_id = store.active_user()?.id;
        let project = store.project_mut(id)?;
        if project.is_liked_by(&user_id) {
            project.likes.retain(|r| r.id() != user_id);
        } else {
            project.likes.push(DocRef::Id(user_id));
        }
        Ok(LikeResponse {
            likes: project.like_count(),
        })
    }

    async fn rate_project(&self, id: &str, rating: u8) -> Result<RateResponse, ApiError> {
        self.enter(Endpoint::RateProject).await?;
        let mut store = self.store.lock().unwrap();
        let user_id = store.active_user()?.id;
        let project = store.project_mut(id)?;
        project.ratings.retain(|r| r.user.id() != user_id);
        project.ratings.push(Rating {
            user: DocRef::Id(user_id),
            value: rating,
        });
        let total: u32 = project.ratings.iter().map(|r| r.value as u32).sum();
        project.average_rating = total as f64 / project.ratings.len() as f64;
        Ok(RateResponse {
            average_rating: Some(project.average_rating),
        })
    }

    async fn list_favorites(&self) -> Result<Vec<Project>, ApiError> {
        // read when the request arrives; a gated response is stale on delivery
        let favorites = {
            let store = self.store.lock().unwrap();
            store.active_user().map(|user| {
                let ids = store.favorites.get(&user.id).cloned().unwrap_or_default();
                store
                    .projects
                    .iter()
                    .filter(|p| ids.contains(&p.id))
                    .cloned()
                    .collect::<Vec<_>>()
            })
        };
        self.enter(Endpoint::ListFavorites).await?;
        favorites
    }

    async fn toggle_favorite(&self, id: &str) -> Result<FavoriteToggleResponse, ApiError> {
        self.enter(Endpoint::ToggleFavorite).await?;
        let mut store = self.store.lock().unwrap();
        let user_id = store.active_user()?.id;
        let favorites = store.favorites.entry(user_id).or_default();
        let is_favorite = if favorites.iter().any(|f| f == id) {
            favorites.retain(|f| f != id);
            false
        } else {
            favorites.push(id.to_string());
            true
        };
        Ok(FavoriteToggleResponse {
            is_favorite: Some(is_favorite),
            favorites: None,
        })
    }

    async fn list_comments(&self, project_id: &str) -> Result<Vec<Comment>, ApiError> {
        self.enter(Endpoint::ListComments).await?;
        // newest first
        let mut comments = self.comments_of(project_id);
        comments.reverse();
        Ok(comments)
    }

    async fn post_comment(&self, comment: &NewComment) -> Result<(), ApiError> {
        self.enter(Endpoint::PostComment).await?;
        let mut store = self.store.lock().unwrap();
        let author = store.active_user()?;
        let id = store.next_id("comment");
        store.comments.push((
            comment.project_id.clone(),
            Comment {
                id,
                text: comment.text.clone(),
                author_name: author.display_name,
                author: CommentAuthor {
                    id: Some(author.id),
                    photo_url: author.photo_url,
                },
                created_at: Utc::now(),
            },
        ));
        Ok(())
    }

    async fn delete_comment(&self, id: &str) -> Result<(), ApiError> {
        self.enter(Endpoint::DeleteComment).await?;
        let mut store = self.store.lock().unwrap();
        let before = store.comments.len();
        store.comments.retain(|(_, c)| c.id != id);
        if store.comments.len() == before {
            return Err(ApiError::NotFound("Comment not found".to_string()));
        }
        Ok(())
    }
}

/// Poll `done` until it holds
pub async fn wait_until(what: &str, done: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", what));
}

pub fn user(uid: &str, name: &str) -> ApplicationUser {
    ApplicationUser {
        id: format!("db-{}", uid),
        uid: uid.to_string(),
        email: format!("{}@x.com", uid),
        display_name: name.to_string(),
        photo_url: None,
        bio: None,
        created_at: Utc::now(),
    }
}

pub fn identity(uid: &str) -> Identity {
    Identity::new(uid, format!("{}@x.com", uid))
}

pub fn project(id: &str, title: &str, author_id: &str) -> Project {
    Project {
        id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        tags: Vec::new(),
        github_link: None,
        live_link: None,
        author: ProjectAuthor {
            id: author_id.to_string(),
            display_name: None,
            photo_url: None,
        },
        author_name: None,
        likes: Vec::new(),
        ratings: Vec::new(),
        average_rating: 0.0,
        created_at: None,
    }
}

pub fn comment(id: &str, text: &str, author_id: &str) -> Comment {
    Comment {
        id: id.to_string(),
        text: text.to_string(),
        author_name: author_id.to_string(),
        author: CommentAuthor {
            id: Some(author_id.to_string()),
            photo_url: None,
        },
        created_at: Utc::now(),
    }
}

/// Resolve a session for `uid` (registered with the backend first) and
/// build a view context on it
pub async fn signed_in(backend: &Arc<FakeBackend>, uid: &str) -> (Arc<SessionResolver>, ViewContext) {
    backend.add_user(user(uid, uid));
    backend.sign_in_as(uid);

    let events = EventBus::default();
    let resolver = Arc::new(SessionResolver::new(backend.clone(), events.clone()));
    resolver.handle(IdentityEvent::SignedIn(identity(uid))).await;

    let ctx = ViewContext::new(backend.clone(), resolver.watch(), events);
    (resolver, ctx)
}

/// View context with nobody signed in
pub fn signed_out(backend: &Arc<FakeBackend>) -> (Arc<SessionResolver>, ViewContext) {
    let events = EventBus::default();
    let resolver = Arc::new(SessionResolver::new(backend.clone(), events.clone()));
    let ctx = ViewContext::new(backend.clone(), resolver.watch(), events);
    (resolver, ctx)
}
