//! Session lifecycle
//!
//! The signed-in user is an explicit [`Session`] owned by the
//! [`SessionManager`]. It is created on sign-up, sign-in or restore and torn
//! down on sign-out. Services receive it through [`SessionManager::require`].
//!
//! Every session start refreshes the login streak on the user's profile (see
//! [`crate::streak`]) and marks the user online.
//!
//! ## Persistence
//!
//! A sign-in with `remember_me` writes the tokens to `session.json` in the
//! data directory; [`SessionManager::restore`] picks them up on the next start.
//! Sign-in without `remember_me` and sign-out both forget the stored tokens.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::backend::{
    from_row, tables, AuthSession, AuthUser, Backend, Credentials, Filter, Row, TableQuery,
};
use crate::models::Profile;
use crate::persist::{self, PersistResult};
use crate::services::{ServiceError, ServiceResult};
use crate::streak;

/// Capacity of the auth event channel
const EVENT_CAPACITY: usize = 32;

/// An authenticated session
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: AuthUser,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub expires_at: Option<i64>,
    /// Tokens are kept across restarts
    pub remember: bool,
    pub login_streak: u32,
    pub started_at: DateTime<Utc>,
}

impl Session {
    fn from_auth(auth: AuthSession, remember: bool, login_streak: u32) -> Self {
        Self {
            user: auth.user,
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
            expires_at: auth.expires_at,
            remember,
            login_streak,
            started_at: Utc::now(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::user(self.access_token.clone())
    }

    fn to_auth(&self) -> AuthSession {
        AuthSession {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expires_at,
            user: self.user.clone(),
        }
    }
}

/// Auth state changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    SignedUp { user_id: String },
    SignedIn { user_id: String },
    Restored { user_id: String },
    SignedOut { user_id: String },
}

/// Result of a sign-up
#[derive(Debug, Clone)]
pub enum SignUpStatus {
    /// Account created and signed in
    SignedIn(Session),
    /// Account created; the provider wants the e-mail confirmed first
    ConfirmationRequired(AuthUser),
}

/// Remembered tokens on disk
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("session.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> PersistResult<Option<AuthSession>> {
        persist::load_json(&self.path)
    }

    pub fn save(&self, session: &AuthSession) -> PersistResult<()> {
        persist::save_json(&self.path, session)
    }

    pub fn clear(&self) -> PersistResult<()> {
        persist::remove(&self.path)
    }
}

/// Validate a username before creating an account
pub fn validate_username(username: &str) -> ServiceResult<()> {
    let re = Regex::new(r"^[A-Za-z0-9_.\-]{3,30}$")
        .map_err(|_| ServiceError::validation("Username pattern error"))?;

    if re.is_match(username) {
        Ok(())
    } else {
        Err(ServiceError::validation(
            "Username must be 3-30 characters: letters, digits, '_', '.' or '-'",
        ))
    }
}

/// Owner of the current session
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
    store: Option<SessionStore>,
}

impl SessionManager {
    /// Create a manager; `store` enables remembered sessions
    pub fn new(backend: Arc<dyn Backend>, store: Option<SessionStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            current: RwLock::new(None),
            events,
            store,
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Subscribe to auth state changes
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub async fn current(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// The current session, or `NotAuthenticated`
    pub async fn require(&self) -> ServiceResult<Session> {
        self.current().await.ok_or(ServiceError::NotAuthenticated)
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Create an account and its profile row
    ///
    /// If the profile insert fails the new user is signed out again and the
    /// insert error is returned. The auth identity itself stays behind.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> ServiceResult<SignUpStatus> {
        validate_username(username)?;

        let outcome = self
            .backend
            .sign_up(email, password, json!({ "username": username }))
            .await?;
        let credentials = outcome
            .session
            .as_ref()
            .map(|s| Credentials::user(s.access_token.clone()))
            .unwrap_or(Credentials::Anon);

        let now = Utc::now();
        let mut profile = Row::new();
        profile.insert("id".into(), json!(outcome.user.id));
        profile.insert("username".into(), json!(username));
        profile.insert("is_online".into(), json!(true));
        profile.insert("last_seen".into(), json!(now.to_rfc3339()));
        profile.insert("login_streak".into(), json!(1));

        if let Err(e) = self
            .backend
            .insert(&credentials, tables::PROFILES, profile)
            .await
        {
            tracing::error!(
                user_id = %outcome.user.id,
                error = %e,
                "Profile creation failed, signing out"
            );
            if let Err(sign_out_err) = self.backend.sign_out(&credentials).await {
                tracing::warn!(error = %sign_out_err, "Compensating sign-out failed");
            }
            return Err(e.into());
        }

        let Some(auth) = outcome.session else {
            tracing::info!(user_id = %outcome.user.id, "Account created, confirmation pending");
            return Ok(SignUpStatus::ConfirmationRequired(outcome.user));
        };

        let remember = self.store.is_some();
        let session = Session::from_auth(auth, remember, 1);
        self.remember(&session)?;
        self.start(session.clone(), AuthEvent::SignedUp {
            user_id: session.user.id.clone(),
        })
        .await;

        tracing::info!(user_id = %session.user.id, username = username, "Signed up");
        Ok(SignUpStatus::SignedIn(session))
    }

    /// Sign in with e-mail and password
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        remember_me: bool,
    ) -> ServiceResult<Session> {
        let auth = self.backend.sign_in(email, password).await?;
        let credentials = Credentials::user(auth.access_token.clone());
        let login_streak = self.refresh_streak(&credentials, &auth.user.id).await;

        let session = Session::from_auth(auth, remember_me && self.store.is_some(), login_streak);
        self.remember(&session)?;
        self.start(session.clone(), AuthEvent::SignedIn {
            user_id: session.user.id.clone(),
        })
        .await;

        tracing::info!(
            user_id = %session.user.id,
            streak = login_streak,
            remember = session.remember,
            "Signed in"
        );
        Ok(session)
    }

    /// Resume a remembered session, if one is stored and still valid
    pub async fn restore(&self) -> ServiceResult<Option<Session>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let Some(stored) = store.load()? else {
            return Ok(None);
        };

        let credentials = Credentials::user(stored.access_token.clone());
        let user = match self.backend.get_user(&credentials).await {
            Ok(user) => user,
            Err(e) => {
                tracing::info!(error = %e, "Stored session is no longer valid");
                store.clear()?;
                return Ok(None);
            }
        };

        let login_streak = self.refresh_streak(&credentials, &user.id).await;
        let auth = AuthSession { user, ..stored };
        let session = Session::from_auth(auth, true, login_streak);
        self.start(session.clone(), AuthEvent::Restored {
            user_id: session.user.id.clone(),
        })
        .await;

        tracing::info!(user_id = %session.user.id, streak = login_streak, "Session restored");
        Ok(Some(session))
    }

    /// End the session
    ///
    /// Local state is cleared even when the provider rejects the sign-out;
    /// that error is still returned.
    pub async fn sign_out(&self) -> ServiceResult<()> {
        let Some(session) = self.current.write().await.take() else {
            return Ok(());
        };
        let credentials = session.credentials();

        let mut patch = Row::new();
        patch.insert("is_online".into(), json!(false));
        patch.insert("last_seen".into(), json!(Utc::now().to_rfc3339()));
        if let Err(e) = self
            .backend
            .update(
                &credentials,
                tables::PROFILES,
                patch,
                vec![Filter::eq("id", session.user.id.clone())],
            )
            .await
        {
            tracing::warn!(user_id = %session.user.id, error = %e, "Failed to mark user offline");
        }

        if let Some(store) = &self.store {
            store.clear()?;
        }
        let _ = self.events.send(AuthEvent::SignedOut {
            user_id: session.user.id.clone(),
        });

        self.backend.sign_out(&credentials).await?;
        tracing::info!(user_id = %session.user.id, "Signed out");
        Ok(())
    }

    async fn start(&self, session: Session, event: AuthEvent) {
        *self.current.write().await = Some(session);
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn remember(&self, session: &Session) -> ServiceResult<()> {
        if let Some(store) = &self.store {
            if session.remember {
                store.save(&session.to_auth())?;
            } else {
                store.clear()?;
            }
        }
        Ok(())
    }

    /// Apply the streak rule to the profile and mark the user online
    ///
    /// Failures are logged, not raised: a missing or unreadable profile
    /// reports a streak of 0 and writes nothing.
    async fn refresh_streak(&self, credentials: &Credentials, user_id: &str) -> u32 {
        match self.try_refresh_streak(credentials, user_id, Utc::now()).await {
            Ok(Some(streak)) => streak,
            Ok(None) => {
                tracing::warn!(user_id = user_id, "No profile row, streak not updated");
                0
            }
            Err(e) => {
                tracing::warn!(user_id = user_id, error = %e, "Streak refresh failed");
                0
            }
        }
    }

    async fn try_refresh_streak(
        &self,
        credentials: &Credentials,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> ServiceResult<Option<u32>> {
        let rows = self
            .backend
            .select(
                credentials,
                tables::PROFILES,
                TableQuery::new().filter(Filter::eq("id", user_id)).range(0, 0),
            )
            .await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let profile: Profile = from_row(row)?;

        let update = streak::advance(profile.login_streak, profile.last_seen, now);
        tracing::debug!(
            user_id = user_id,
            diff_days = update.diff_days,
            change = ?update.change,
            streak = update.streak,
            "Login streak computed"
        );

        let mut patch = Row::new();
        patch.insert("login_streak".into(), json!(update.streak));
        patch.insert("is_online".into(), json!(true));
        patch.insert("last_seen".into(), json!(now.to_rfc3339()));
        self.backend
            .update(
                credentials,
                tables::PROFILES,
                patch,
                vec![Filter::eq("id", user_id)],
            )
            .await?;

        Ok(Some(update.streak))
    }
}
