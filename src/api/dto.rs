//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{GoalPriority, GoalStats, GoalStatus, Profile};
use crate::optimistic::RequestState;
use crate::session::Session;

// ============================================
// AUTH DTOs
// ============================================

/// Sign-up request
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub username: String,
}

/// Sign-in request
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    /// Keep the session across server restarts (default: true)
    #[serde(default = "default_remember_me")]
    pub remember_me: bool,
}

fn default_remember_me() -> bool {
    true
}

/// Current session
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub login_streak: u32,
    pub remember: bool,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<i64>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            user_id: session.user.id.clone(),
            email: session.user.email.clone(),
            username: session
                .user
                .user_metadata
                .get("username")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            login_streak: session.login_streak,
            remember: session.remember,
            started_at: session.started_at,
            expires_at: session.expires_at,
        }
    }
}

/// Sign-up result
#[derive(Debug, Serialize, Deserialize)]
pub struct SignUpResponse {
    pub user_id: String,
    /// The account must be confirmed by e-mail before signing in
    pub confirmation_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionResponse>,
}

// ============================================
// GOAL DTOs
// ============================================

/// Query parameters for the goal list
#[derive(Debug, Default, Deserialize)]
pub struct GoalListParams {
    /// `all` or a status name
    pub status: Option<String>,
    /// `due_date` or `priority`
    pub sort: Option<String>,
}

/// Create goal request
#[derive(Debug, Deserialize)]
pub struct CreateGoalRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub priority: GoalPriority,
}

/// Partial goal update
///
/// `progress` is taken as a plain integer so out-of-range values are
/// reported as validation errors.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateGoalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<GoalPriority>,
    pub status: Option<GoalStatus>,
    pub progress: Option<i64>,
}

/// Dashboard counters
#[derive(Debug, Serialize, Deserialize)]
pub struct GoalStatsResponse {
    #[serde(flatten)]
    pub stats: GoalStats,
    pub login_streak: u32,
}

// ============================================
// CALENDAR DTOs
// ============================================

/// Calendar month selection (defaults to the current month)
#[derive(Debug, Default, Deserialize)]
pub struct CalendarParams {
    pub year: Option<i32>,
    pub month: Option<u32>,
    /// Offset from UTC used to place due dates on days
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

// ============================================
// NOTE DTOs
// ============================================

#[derive(Debug, Deserialize)]
pub struct NoteListParams {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub content: String,
}

// ============================================
// SOCIAL DTOs
// ============================================

/// User search query
#[derive(Debug, Default, Deserialize)]
pub struct UserSearchParams {
    #[serde(default)]
    pub q: String,
    /// Page size (default: `search.page_size`)
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

/// One search hit with the state of a friend request to that user
#[derive(Debug, Serialize)]
pub struct UserSearchHit {
    #[serde(flatten)]
    pub profile: Profile,
    pub request: RequestState,
}

/// Search results
#[derive(Debug, Serialize)]
pub struct UserSearchResponse {
    /// A newer search replaced this one; `results` is empty
    pub superseded: bool,
    pub results: Vec<UserSearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct SendFriendRequest {
    pub receiver_id: String,
}

#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    pub online: bool,
}

// ============================================
// PROFILE DTOs
// ============================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarResponse {
    pub avatar_url: String,
}

// ============================================
// ACTIVITY DTOs
// ============================================

#[derive(Debug, Deserialize)]
pub struct TrackActivityRequest {
    pub kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DayVisits {
    pub date: NaiveDate,
    pub visits: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub streak: u32,
    pub total_visits: u64,
    pub last_active: Option<NaiveDate>,
    /// Last 7 days, most recent first
    pub weekly: Vec<DayVisits>,
}

// ============================================
// DASHBOARD DTOs
// ============================================

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub username: Option<String>,
    pub login_streak: u32,
    pub goals: GoalStats,
    pub friends: usize,
    pub pending_requests: usize,
}

// ============================================
// HEALTH DTOs
// ============================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded"
    pub status: String,
    /// Provider name ("supabase" or "memory")
    pub backend: String,
    /// Backend status: "ok" or "error"
    pub backend_status: String,
    pub authenticated: bool,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}
