//! Authoritative session
//!
//! Exactly one [`Session`] exists per application. It is written only by the
//! [`SessionResolver`] and read everywhere else through a [`SessionWatch`].
//! Nothing outside this module can construct a `Session`.

mod resolver;

pub use resolver::SessionResolver;

use phub_common::{ApplicationUser, Identity, SessionStatus};
use tokio::sync::watch;

/// User synthesized from identity fields when no backend profile is available
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinimalUser {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl From<&Identity> for MinimalUser {
    fn from(identity: &Identity) -> Self {
        Self {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.fallback_display_name(),
            photo_url: identity.photo_url.clone(),
        }
    }
}

/// Signed-in user: a full backend profile or a minimal fallback
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUser {
    Full(ApplicationUser),
    Minimal(MinimalUser),
}

impl SessionUser {
    /// True for the minimal fallback
    pub fn is_degraded(&self) -> bool {
        matches!(self, SessionUser::Minimal(_))
    }

    /// Backend user id; a minimal user has none
    pub fn id(&self) -> Option<&str> {
        match self {
            SessionUser::Full(user) => Some(&user.id),
            SessionUser::Minimal(_) => None,
        }
    }

    pub fn uid(&self) -> &str {
        match self {
            SessionUser::Full(user) => &user.uid,
            SessionUser::Minimal(user) => &user.uid,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            SessionUser::Full(user) => &user.email,
            SessionUser::Minimal(user) => &user.email,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            SessionUser::Full(user) => &user.display_name,
            SessionUser::Minimal(user) => &user.display_name,
        }
    }

    pub fn photo_url(&self) -> Option<&str> {
        match self {
            SessionUser::Full(user) => user.photo_url.as_deref(),
            SessionUser::Minimal(user) => user.photo_url.as_deref(),
        }
    }

    pub fn profile(&self) -> Option<&ApplicationUser> {
        match self {
            SessionUser::Full(user) => Some(user),
            SessionUser::Minimal(_) => None,
        }
    }
}

/// Application-wide session state
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    status: SessionStatus,
    user: Option<SessionUser>,
    warning: Option<String>,
    generation: u64,
}

impl Session {
    fn initial() -> Self {
        Self {
            status: SessionStatus::Unauthenticated,
            user: None,
            warning: None,
            generation: 0,
        }
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// Current user; always `None` while resolving
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    /// Dismissible banner text
    pub fn warning(&self) -> Option<&str> {
        self.warning.as_deref()
    }

    /// Generation of the identity event this session belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Resolving
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.status, SessionStatus::Degraded(_))
    }
}

/// Read-only handle on the authoritative session
#[derive(Debug, Clone)]
pub struct SessionWatch {
    rx: watch::Receiver<Session>,
}

impl SessionWatch {
    fn new(rx: watch::Receiver<Session>) -> Self {
        Self { rx }
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.rx.borrow().user.clone()
    }

    /// Backend id of the current user, if signed in with a full profile
    pub fn user_id(&self) -> Option<String> {
        self.rx
            .borrow()
            .user
            .as_ref()
            .and_then(|u| u.id().map(str::to_string))
    }

    /// Wait for the next change
    ///
    /// Returns `None` once the resolver is gone.
    pub async fn changed(&mut self) -> Option<Session> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Wait until the session is no longer resolving
    pub async fn settled(&mut self) -> Option<Session> {
        self.rx
            .wait_for(|s| s.status.is_settled())
            .await
            .ok()
            .map(|s| s.clone())
    }

    /// Wait until the session reaches at least `generation` and is settled
    pub async fn settled_at(&mut self, generation: u64) -> Option<Session> {
        self.rx
            .wait_for(|s| s.generation >= generation && s.status.is_settled())
            .await
            .ok()
            .map(|s| s.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_minimal_user_from_identity() {
        let identity = Identity::new("u1", "a@x.com").with_photo_url("http://img");
        let user = SessionUser::Minimal(MinimalUser::from(&identity));

        assert!(user.is_degraded());
        assert_eq!(user.uid(), "u1");
        assert_eq!(user.email(), "a@x.com");
        assert_eq!(user.display_name(), "a");
        assert_eq!(user.photo_url(), Some("http://img"));
        assert_eq!(user.id(), None);
        assert!(user.profile().is_none());
    }

    #[test]
    fn test_full_user_accessors() {
        let user = SessionUser::Full(ApplicationUser {
            id: "db1".to_string(),
            uid: "u1".to_string(),
            email: "a@x.com".to_string(),
            display_name: "Ada".to_string(),
            photo_url: None,
            bio: None,
            created_at: Utc::now(),
        });
        assert!(!user.is_degraded());
        assert_eq!(user.id(), Some("db1"));
        assert_eq!(user.display_name(), "Ada");
    }

    #[test]
    fn test_initial_session() {
        let session = Session::initial();
        assert_eq!(session.status(), &SessionStatus::Unauthenticated);
        assert!(session.user().is_none());
        assert!(session.warning().is_none());
        assert_eq!(session.generation(), 0);
        assert!(!session.is_loading());
    }
}
