//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.
//!
//! The server acts for a single signed-in user at a time: the session slot
//! lives in the [`SessionManager`] and every service reads it from there.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::activity::{ActivityTracker, VisitSummary};
use crate::backend::Backend;
use crate::config::Config;
use crate::optimistic::RequestTracker;
use crate::persist::PersistResult;
use crate::search::{UserSearch, DEFAULT_DEBOUNCE};
use crate::services::{
    FriendService, GoalService, NoteService, ProfileService, DEFAULT_SEARCH_LIMIT,
};
use crate::session::{SessionManager, SessionStore};

/// `(sender id, receiver id)` of a friend request sent from this server
pub type FriendRequestKey = (String, String);

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub goals: GoalService,
    pub friends: FriendService,
    pub notes: NoteService,
    pub profiles: ProfileService,
    /// Debounced user search
    pub search: Arc<UserSearch>,
    /// Optimistic friend-request state
    pub friend_requests: Arc<RequestTracker<FriendRequestKey>>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Local state directory; `None` disables the activity log
    pub data_dir: Option<PathBuf>,
    /// Serializes read-modify-write cycles on activity files
    pub activity_lock: Arc<Mutex<()>>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// State without local persistence
    pub fn new(backend: Arc<dyn Backend>, config: ApiConfig) -> Self {
        Self::build(backend, config, None, None, DEFAULT_DEBOUNCE, DEFAULT_SEARCH_LIMIT)
    }

    /// State wired from the application config
    pub fn from_config(backend: Arc<dyn Backend>, config: &Config) -> Self {
        let data_dir = config.session.data_path();
        let store = config
            .session
            .persist_sessions
            .then(|| SessionStore::new(&data_dir));

        Self::build(
            backend,
            ApiConfig::from(&config.api),
            store,
            Some(data_dir),
            config.search.debounce(),
            config.search.page_size,
        )
    }

    fn build(
        backend: Arc<dyn Backend>,
        config: ApiConfig,
        store: Option<SessionStore>,
        data_dir: Option<PathBuf>,
        debounce: Duration,
        page_size: usize,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(backend, store));
        let friends = FriendService::new(Arc::clone(&sessions));

        Self {
            goals: GoalService::new(Arc::clone(&sessions)),
            notes: NoteService::new(Arc::clone(&sessions)),
            profiles: ProfileService::new(Arc::clone(&sessions)),
            search: Arc::new(UserSearch::new(friends.clone(), debounce, page_size)),
            friends,
            sessions,
            friend_requests: Arc::new(RequestTracker::new()),
            config: Arc::new(config),
            data_dir,
            activity_lock: Arc::new(Mutex::new(())),
            start_time: Instant::now(),
        }
    }

    /// Builder method: override the search debounce delay
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        let page_size = self.search.page_size();
        self.search = Arc::new(UserSearch::new(self.friends.clone(), delay, page_size));
        self
    }

    /// Builder method: enable the activity log under `dir`
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Activity tracker for a user, if local state is enabled
    pub fn activity(&self, user_id: &str) -> PersistResult<Option<ActivityTracker>> {
        match &self.data_dir {
            Some(dir) => ActivityTracker::open(dir, user_id).map(Some),
            None => Ok(None),
        }
    }

    /// Load, update and save the activity log under the activity lock
    ///
    /// `None` when the activity log is disabled.
    pub async fn track_visit(
        &self,
        user_id: &str,
        kind: &str,
    ) -> PersistResult<Option<(ActivityTracker, VisitSummary)>> {
        let _guard = self.activity_lock.lock().await;
        match self.activity(user_id)? {
            Some(mut tracker) => {
                let summary = tracker.track(kind)?;
                Ok(Some((tracker, summary)))
            }
            None => Ok(None),
        }
    }

    /// Record a visit; failures are logged and otherwise ignored
    pub async fn record_activity(&self, user_id: &str, kind: &str) {
        if let Err(e) = self.track_visit(user_id, kind).await {
            tracing::warn!(user_id = user_id, kind = kind, error = %e, "Failed to record activity");
        }
    }

    /// Forget optimistic state left over from a previous session
    pub async fn reset_session_state(&self) {
        self.friend_requests.clear().await;
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8085,
            cors_origins: Vec::new(),
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl From<&crate::config::ApiConfig> for ApiConfig {
    fn from(config: &crate::config::ApiConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            cors_origins: config.cors_origins.clone(),
            ..Default::default()
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
