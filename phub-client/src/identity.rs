//! Identity provider seam
//!
//! The external authentication provider is reached only through the
//! [`IdentityProvider`] trait and a stream of [`IdentityEvent`]s handed to
//! the session resolver at construction time. Tests inject their own.

use async_trait::async_trait;
use phub_common::Identity;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

/// Identity-provider notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn(Identity),
    SignedOut,
    /// The provider could not determine the identity
    ProviderFailed(String),
}

impl From<Option<Identity>> for IdentityEvent {
    fn from(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => IdentityEvent::SignedIn(identity),
            None => IdentityEvent::SignedOut,
        }
    }
}

/// Stream of identity events consumed by the session resolver
pub type IdentityEventStream = UnboundedReceiverStream<IdentityEvent>;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Token unavailable: {0}")]
    TokenUnavailable(String),
}

/// Access to the authentication provider's current state
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Identity the provider currently considers signed in
    fn current_identity(&self) -> Option<Identity>;

    /// Mint a fresh token for the current identity
    async fn fresh_token(&self) -> Result<Option<String>, IdentityError>;
}

/// Last token minted by the provider
///
/// In memory only; used when the provider has no current identity.
#[derive(Debug, Clone, Default)]
pub struct TokenCache {
    token: Arc<RwLock<Option<String>>>,
}

impl TokenCache {
    pub fn new(seed: Option<String>) -> Self {
        Self {
            token: Arc::new(RwLock::new(seed)),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn store(&self, token: String) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token);
    }

    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

/// Provider backed by fixed credentials
///
/// Used by the command-line client and by tests. Every sign-in or sign-out
/// updates the current identity first and then publishes the event.
pub struct StaticIdentityProvider {
    current: RwLock<Option<(Identity, Option<String>)>>,
    events: mpsc::UnboundedSender<IdentityEvent>,
}

impl StaticIdentityProvider {
    /// Create the provider and the event stream to hand to the resolver
    pub fn new() -> (Arc<Self>, IdentityEventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let provider = Arc::new(Self {
            current: RwLock::new(None),
            events: tx,
        });
        (provider, UnboundedReceiverStream::new(rx))
    }

    pub fn sign_in(&self, identity: Identity, token: Option<String>) {
        debug!(uid = %identity.uid, "Identity signed in");
        *self.current.write().unwrap_or_else(|e| e.into_inner()) =
            Some((identity.clone(), token));
        self.publish(IdentityEvent::SignedIn(identity));
    }

    pub fn sign_out(&self) {
        debug!("Identity signed out");
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.publish(IdentityEvent::SignedOut);
    }

    pub fn fail(&self, message: impl Into<String>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.publish(IdentityEvent::ProviderFailed(message.into()));
    }

    fn publish(&self, event: IdentityEvent) {
        // Receiver gone means nobody resolves sessions any more
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    fn current_identity(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(identity, _)| identity.clone())
    }

    async fn fresh_token(&self) -> Result<Option<String>, IdentityError> {
        Ok(self
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(|(_, token)| token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_static_provider_publishes_after_updating_state() {
        let (provider, mut events) = StaticIdentityProvider::new();
        assert!(provider.current_identity().is_none());

        provider.sign_in(Identity::new("u1", "a@x.com"), Some("tok".to_string()));
        assert_eq!(
            events.next().await,
            Some(IdentityEvent::SignedIn(Identity::new("u1", "a@x.com")))
        );
        assert_eq!(provider.fresh_token().await.unwrap().as_deref(), Some("tok"));

        provider.sign_out();
        assert_eq!(events.next().await, Some(IdentityEvent::SignedOut));
        assert!(provider.current_identity().is_none());
        assert!(provider.fresh_token().await.unwrap().is_none());
    }

    #[test]
    fn test_token_cache() {
        let cache = TokenCache::new(Some("seed".to_string()));
        assert_eq!(cache.get().as_deref(), Some("seed"));

        let shared = cache.clone();
        shared.store("fresh".to_string());
        assert_eq!(cache.get().as_deref(), Some("fresh"));

        cache.clear();
        assert!(shared.get().is_none());
    }
}
