//! Optimistic mutations
//!
//! One protocol covers every speculative action a view can take:
//!
//! 1. reject if an intent for the same `(target, kind)` is pending
//! 2. snapshot the displayed value
//! 3. show the predicted value
//! 4. send the request
//! 5. on success, replace the prediction with the reconciled server value
//! 6. on failure, restore the snapshot and report the error
//! 7. clear the intent, exactly once, whatever happened
//!
//! Only prediction and reconciliation vary per kind; see [`Mutation`] and the
//! implementations in [`kinds`].
//!
//! Steps 5 and 6 are applied to the value displayed at that moment, not to
//! the prediction. Kinds that share a displayed value with another kind (the
//! comment list) override [`Mutation::settle`] and [`Mutation::revert`] so
//! that each undoes or confirms only its own change.

pub mod kinds;

pub use kinds::{
    DeleteComment, LikeState, PostComment, RatingState, SubmitRating, ToggleFavorite, ToggleLike,
};

use crate::error::{ApiError, MutationError};
use crate::views::ViewState;
use async_trait::async_trait;
use chrono::Utc;
use phub_common::{ClientEvent, EventBus, MutationKind};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// One kind of speculative action against one target
#[async_trait]
pub trait Mutation: Send + Sync {
    /// Displayed value the mutation predicts and reconciles
    type Value: Clone + Send + Sync;
    /// Server response to the request
    type Response: Send;

    fn kind(&self) -> MutationKind;

    fn target_id(&self) -> &str;

    /// Value to show while the request is in flight
    fn predict(&self, current: &Self::Value) -> Self::Value;

    async fn send(&self) -> Result<Self::Response, ApiError>;

    /// Authoritative value once the server accepted the request
    async fn reconcile(
        &self,
        predicted: Self::Value,
        response: Self::Response,
    ) -> Result<Self::Value, ApiError>;

    /// Displayed value after reconciliation, given what is shown now
    fn settle(
        &self,
        _current: &Self::Value,
        _previous: &Self::Value,
        reconciled: Self::Value,
    ) -> Self::Value {
        reconciled
    }

    /// Displayed value after a failure, given what is shown now
    fn revert(&self, _current: &Self::Value, previous: &Self::Value) -> Self::Value {
        previous.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IntentKey {
    target_id: String,
    kind: MutationKind,
}

/// Record of one in-flight mutation
#[derive(Debug, Clone, PartialEq)]
pub struct MutationIntent<V> {
    pub target_id: String,
    pub kind: MutationKind,
    pub previous_value: V,
    pub predicted_value: V,
    pub pending: bool,
}

/// Live intents, at most one per `(target, kind)`
#[derive(Debug, Default)]
pub struct IntentRegistry {
    live: Mutex<HashSet<IntentKey>>,
}

impl IntentRegistry {
    fn lock(&self) -> MutexGuard<'_, HashSet<IntentKey>> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Claim `(target, kind)`; `None` while another intent holds it
    pub fn try_begin(
        self: &Arc<Self>,
        target_id: &str,
        kind: MutationKind,
    ) -> Option<IntentGuard> {
        let key = IntentKey {
            target_id: target_id.to_string(),
            kind,
        };
        if !self.lock().insert(key.clone()) {
            return None;
        }
        Some(IntentGuard {
            registry: Arc::clone(self),
            key,
        })
    }

    pub fn is_pending(&self, target_id: &str, kind: MutationKind) -> bool {
        self.lock().contains(&IntentKey {
            target_id: target_id.to_string(),
            kind,
        })
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

/// Releases its intent when dropped
///
/// Dropping also covers a mutation future that is abandoned mid-flight.
#[derive(Debug)]
pub struct IntentGuard {
    registry: Arc<IntentRegistry>,
    key: IntentKey,
}

impl Drop for IntentGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

/// Runs mutations for one view
#[derive(Clone)]
pub struct MutationController {
    intents: Arc<IntentRegistry>,
    events: EventBus,
}

impl MutationController {
    pub fn new(events: EventBus) -> Self {
        Self {
            intents: Arc::new(IntentRegistry::default()),
            events,
        }
    }

    pub fn is_pending(&self, target_id: &str, kind: MutationKind) -> bool {
        self.intents.is_pending(target_id, kind)
    }

    pub fn pending_count(&self) -> usize {
        self.intents.pending_count()
    }

    /// Run `mutation` against the value displayed in `state`
    ///
    /// Returns the value displayed once the mutation settled, or the error
    /// after its prediction was undone. A busy rejection leaves `state`
    /// untouched and sends nothing.
    pub async fn run<M: Mutation>(
        &self,
        mutation: &M,
        state: &ViewState<M::Value>,
    ) -> Result<M::Value, MutationError> {
        let kind = mutation.kind();
        let target_id = mutation.target_id().to_string();

        let _guard = self
            .intents
            .try_begin(&target_id, kind)
            .ok_or_else(|| MutationError::Busy {
                kind,
                target_id: target_id.clone(),
            })?;

        let (previous_value, predicted_value) =
            state.replace_with(|current| mutation.predict(current));
        let mut intent = MutationIntent {
            target_id,
            kind,
            previous_value,
            predicted_value,
            pending: true,
        };
        debug!(kind = %intent.kind, target = %intent.target_id, "Applied optimistic prediction");

        let outcome = match mutation.send().await {
            Ok(response) => {
                mutation
                    .reconcile(intent.predicted_value.clone(), response)
                    .await
            }
            Err(e) => Err(e),
        };
        intent.pending = false;

        match outcome {
            Ok(value) => {
                let (_, shown) = state.replace_with(|current| {
                    mutation.settle(current, &intent.previous_value, value)
                });
                debug!(kind = %intent.kind, target = %intent.target_id, "Mutation reconciled");
                self.events.emit_lossy(ClientEvent::MutationApplied {
                    kind: intent.kind,
                    target_id: intent.target_id,
                    timestamp: Utc::now(),
                });
                Ok(shown)
            }
            Err(source) => {
                state.replace_with(|current| mutation.revert(current, &intent.previous_value));
                warn!(
                    kind = %intent.kind,
                    target = %intent.target_id,
                    error = %source,
                    "Mutation failed, reverted to snapshot"
                );
                self.events.emit_lossy(ClientEvent::MutationReverted {
                    kind: intent.kind,
                    target_id: intent.target_id,
                    error: source.to_string(),
                    timestamp: Utc::now(),
                });
                Err(MutationError::Failed { kind, source })
            }
        }
    }
}
