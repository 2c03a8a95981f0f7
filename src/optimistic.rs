//! Optimistic request state
//!
//! Tracks the outcome of actions shown to the user before the backend has
//! answered (e.g. "Request Sent" on a search result).
//!
//! ```text
//! Idle ──begin──▶ Pending ──confirm──▶ Confirmed
//!                    │                    │
//!                  fail            begin (new send)
//!                    ▼                    ▼
//!                 Failed ──begin (retry)──▶ Pending
//! ```
//!
//! Only one action per key can be in flight: `begin` from `Pending` is
//! rejected. Any other invalid transition is rejected as well and leaves the
//! state unchanged.

use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use thiserror::Error;
use tokio::sync::RwLock;

/// State of one optimistic action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RequestState {
    #[default]
    Idle,
    Pending,
    Confirmed,
    Failed { message: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid transition: cannot {action} from {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub action: &'static str,
}

impl RequestState {
    pub fn name(&self) -> &'static str {
        match self {
            RequestState::Idle => "idle",
            RequestState::Pending => "pending",
            RequestState::Confirmed => "confirmed",
            RequestState::Failed { .. } => "failed",
        }
    }

    /// Start, retry or repeat the action
    pub fn begin(&self) -> Result<RequestState, TransitionError> {
        match self {
            RequestState::Idle | RequestState::Failed { .. } | RequestState::Confirmed => {
                Ok(RequestState::Pending)
            }
            other => Err(TransitionError {
                from: other.name(),
                action: "begin",
            }),
        }
    }

    pub fn confirm(&self) -> Result<RequestState, TransitionError> {
        match self {
            RequestState::Pending => Ok(RequestState::Confirmed),
            other => Err(TransitionError {
                from: other.name(),
                action: "confirm",
            }),
        }
    }

    pub fn fail(&self, message: impl Into<String>) -> Result<RequestState, TransitionError> {
        match self {
            RequestState::Pending => Ok(RequestState::Failed {
                message: message.into(),
            }),
            other => Err(TransitionError {
                from: other.name(),
                action: "fail",
            }),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }
}

/// Per-key optimistic state, shared between tasks
#[derive(Debug)]
pub struct RequestTracker<K> {
    states: RwLock<HashMap<K, RequestState>>,
}

impl<K: Eq + Hash + Clone> Default for RequestTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> RequestTracker<K> {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &K) -> RequestState {
        self.states.read().await.get(key).cloned().unwrap_or_default()
    }

    pub async fn begin(&self, key: K) -> Result<(), TransitionError> {
        self.transition(key, |s| s.begin()).await
    }

    pub async fn confirm(&self, key: K) -> Result<(), TransitionError> {
        self.transition(key, |s| s.confirm()).await
    }

    pub async fn fail(&self, key: K, message: String) -> Result<(), TransitionError> {
        self.transition(key, move |s| s.fail(message)).await
    }

    async fn transition<F>(&self, key: K, step: F) -> Result<(), TransitionError>
    where
        F: FnOnce(&RequestState) -> Result<RequestState, TransitionError>,
    {
        let mut states = self.states.write().await;
        let current = states.get(&key).cloned().unwrap_or_default();
        let next = step(&current)?;
        states.insert(key, next);
        Ok(())
    }

    /// Mark pending, run `action`, then confirm or fail by its result
    ///
    /// A second call for a key that is still pending is rejected before
    /// `action` runs. Whether a repeat after completion is allowed is up to
    /// `action`.
    pub async fn track<F, Fut, T, E>(&self, key: K, action: F) -> Result<Result<T, E>, TransitionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.begin(key.clone()).await?;

        let result = action().await;
        match &result {
            Ok(_) => self.confirm(key).await?,
            Err(e) => self.fail(key, e.to_string()).await?,
        }
        Ok(result)
    }

    /// Snapshot of every tracked key
    pub async fn snapshot(&self) -> HashMap<K, RequestState> {
        self.states.read().await.clone()
    }

    /// Forget every tracked key
    pub async fn clear(&self) {
        self.states.write().await.clear();
    }
}
