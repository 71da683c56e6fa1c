//! Session resolution
//!
//! Turns identity events into session updates:
//!
//! - signed out: `Unauthenticated`
//! - signed in: `Resolving`, then the backend profile is fetched:
//!   - found: `Authenticated`
//!   - not found: create it from identity fields; failure degrades with
//!     `ProfileCreationFailed`
//!   - server error: `Degraded(ServerUnavailable)`
//!   - unreachable: `Degraded(Offline)`
//!   - anything else: `Degraded(Unknown)`
//! - provider failure: `Error`
//!
//! Each identity event is stamped with the next generation. A resolution
//! whose generation is no longer current when it completes is dropped, so a
//! slow resolution for an old identity never overwrites a newer one.

use super::{MinimalUser, Session, SessionUser, SessionWatch};
use crate::api::Backend;
use crate::error::ApiError;
use crate::identity::IdentityEvent;
use chrono::Utc;
use futures::{Stream, StreamExt};
use phub_common::{ApplicationUser, ClientEvent, DegradeReason, EventBus, Identity, SessionStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Settled outcome of one resolution
#[derive(Debug, Clone, PartialEq)]
struct Resolution {
    status: SessionStatus,
    user: Option<SessionUser>,
    warning: Option<String>,
}

impl Resolution {
    fn authenticated(profile: ApplicationUser) -> Self {
        Self {
            status: SessionStatus::Authenticated,
            user: Some(SessionUser::Full(profile)),
            warning: None,
        }
    }

    fn degraded(identity: &Identity, reason: DegradeReason) -> Self {
        Self {
            status: SessionStatus::Degraded(reason),
            user: Some(SessionUser::Minimal(MinimalUser::from(identity))),
            warning: Some(reason.warning().to_string()),
        }
    }
}

/// Single writer of the authoritative session
pub struct SessionResolver {
    backend: Arc<dyn Backend>,
    session: watch::Sender<Session>,
    events: EventBus,
}

impl SessionResolver {
    pub fn new(backend: Arc<dyn Backend>, events: EventBus) -> Self {
        let (session, _) = watch::channel(Session::initial());
        Self {
            backend,
            session,
            events,
        }
    }

    /// Read-only handle for views
    pub fn watch(&self) -> SessionWatch {
        SessionWatch::new(self.session.subscribe())
    }

    pub fn current(&self) -> Session {
        self.session.borrow().clone()
    }

    /// Stamp a new generation and apply the immediate transition
    ///
    /// Sign-out and provider failure settle right away; sign-in enters
    /// `Resolving` with no user exposed. Returns the new generation.
    pub fn begin(&self, event: &IdentityEvent) -> u64 {
        let mut generation = 0;
        self.session.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            match event {
                IdentityEvent::SignedIn(_) => {
                    s.status = SessionStatus::Resolving;
                    s.user = None;
                    s.warning = None;
                }
                IdentityEvent::SignedOut => {
                    s.status = SessionStatus::Unauthenticated;
                    s.user = None;
                    s.warning = None;
                }
                IdentityEvent::ProviderFailed(message) => {
                    s.status = SessionStatus::Error(message.clone());
                    s.user = None;
                    s.warning = Some(format!("Unable to verify sign-in: {}", message));
                }
            }
        });

        match event {
            IdentityEvent::SignedIn(identity) => {
                debug!(generation, uid = %identity.uid, "Resolving session");
            }
            IdentityEvent::SignedOut => info!(generation, "Session signed out"),
            IdentityEvent::ProviderFailed(message) => {
                warn!(generation, error = %message, "Identity provider failed");
            }
        }
        self.publish(generation);
        generation
    }

    /// Handle one identity event to completion
    ///
    /// Returns false when the resolution was superseded by a newer event.
    pub async fn handle(&self, event: IdentityEvent) -> bool {
        let generation = self.begin(&event);
        match event {
            IdentityEvent::SignedIn(identity) => {
                let resolution = self.resolve(&identity).await;
                self.commit(generation, resolution)
            }
            _ => true,
        }
    }

    /// Convenience for `handle(IdentityEvent::SignedOut)`
    pub async fn sign_out(&self) {
        self.handle(IdentityEvent::SignedOut).await;
    }

    /// Consume identity events until the stream ends
    ///
    /// Resolutions run concurrently so a slow backend never delays a newer
    /// event; the generation check decides which result survives.
    pub async fn run<S>(self: Arc<Self>, mut identity_events: S)
    where
        S: Stream<Item = IdentityEvent> + Unpin + Send,
    {
        let mut resolutions = JoinSet::new();

        loop {
            tokio::select! {
                event = identity_events.next() => {
                    let Some(event) = event else { break };
                    let generation = self.begin(&event);
                    if let IdentityEvent::SignedIn(identity) = event {
                        let resolver = Arc::clone(&self);
                        resolutions.spawn(async move {
                            let resolution = resolver.resolve(&identity).await;
                            resolver.commit(generation, resolution);
                        });
                    }
                }
                Some(joined) = resolutions.join_next(), if !resolutions.is_empty() => {
                    if let Err(e) = joined {
                        error!("Session resolution task failed: {}", e);
                    }
                }
            }
        }

        while let Some(joined) = resolutions.join_next().await {
            if let Err(e) = joined {
                error!("Session resolution task failed: {}", e);
            }
        }
        debug!("Identity event stream closed");
    }

    /// Clear the banner without touching status
    pub fn dismiss_warning(&self) {
        self.session.send_if_modified(|s| s.warning.take().is_some());
    }

    async fn resolve(&self, identity: &Identity) -> Resolution {
        match self.backend.fetch_current_user().await {
            Ok(profile) => Resolution::authenticated(profile),
            Err(ApiError::NotFound(_)) => {
                info!(uid = %identity.uid, "No backend profile, creating one");
                match self.backend.create_user(&identity.to_new_user()).await {
                    Ok(profile) => Resolution::authenticated(profile),
                    Err(e) => {
                        warn!(uid = %identity.uid, error = %e, "Profile creation failed");
                        Resolution::degraded(identity, DegradeReason::ProfileCreationFailed)
                    }
                }
            }
            Err(e) => {
                let reason = match e {
                    ApiError::ServerUnavailable(_) => DegradeReason::ServerUnavailable,
                    ApiError::NetworkUnreachable(_) => DegradeReason::Offline,
                    _ => DegradeReason::Unknown,
                };
                warn!(uid = %identity.uid, error = %e, ?reason, "Profile fetch failed");
                Resolution::degraded(identity, reason)
            }
        }
    }

    /// Apply a resolution if its generation is still current
    fn commit(&self, generation: u64, resolution: Resolution) -> bool {
        let mut current = 0;
        let applied = self.session.send_if_modified(|s| {
            current = s.generation;
            if s.generation != generation {
                return false;
            }
            s.status = resolution.status.clone();
            s.user = resolution.user.clone();
            s.warning = resolution.warning.clone();
            true
        });

        if applied {
            info!(generation, status = %resolution.status, "Session settled");
            self.publish(generation);
        } else {
            debug!(generation, current, "Discarding stale session resolution");
            self.events.emit_lossy(ClientEvent::StaleResolutionDiscarded {
                generation,
                current,
                timestamp: Utc::now(),
            });
        }
        applied
    }

    fn publish(&self, generation: u64) {
        let status = self.session.borrow().status.clone();
        self.events.emit_lossy(ClientEvent::SessionChanged {
            status,
            generation,
            timestamp: Utc::now(),
        });
    }
}
