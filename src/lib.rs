//! # Goaltracker
//!
//! Goal tracking with friends, login streaks and an activity calendar,
//! backed by a hosted backend-as-a-service (auth, tables, RPC and object
//! storage).
//!
//! ## Modules
//!
//! - [`backend`]: Backend abstraction with a hosted and an in-memory provider
//! - [`models`]: Goal, profile, friend request and note rows
//! - [`session`]: Sign-up, sign-in, restore and sign-out
//! - [`streak`]: Login streak rule
//! - [`services`]: Goal, friend, note and profile operations
//! - [`calendar`]: 42-day month grid
//! - [`search`]: Debounced user search
//! - [`optimistic`]: Optimistic request state machine
//! - [`activity`]: Local visit log with its own streak
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use goaltracker::backend::MemoryBackend;
//! use goaltracker::models::NewGoal;
//! use goaltracker::services::GoalService;
//! use goaltracker::session::SessionManager;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = Arc::new(MemoryBackend::new());
//!     let sessions = Arc::new(SessionManager::new(backend, None));
//!
//!     sessions.sign_up("ann@example.com", "secret1", "ann").await?;
//!
//!     let goals = GoalService::new(Arc::clone(&sessions));
//!     goals.create(NewGoal::new("Run 5k", chrono::Utc::now())).await?;
//!
//!     println!("{} goals", goals.list().await?.len());
//!     Ok(())
//! }
//! ```

pub mod activity;
pub mod api;
pub mod backend;
pub mod calendar;
pub mod config;
pub mod models;
pub mod optimistic;
pub mod persist;
pub mod search;
pub mod services;
pub mod session;
pub mod streak;

// Re-export top-level types for convenience
pub use backend::{Backend, BackendError, BackendResult, MemoryBackend, SupabaseBackend};

pub use models::{
    CalendarNote, Friend, FriendRequest, Goal, GoalPriority, GoalStatus, NewGoal, Profile,
    Progress,
};

pub use calendar::{month_grid, CalendarGrid, CalendarMonth, DayTone};

pub use session::{Session, SessionManager};

pub use services::{FriendService, GoalService, NoteService, ProfileService, ServiceError};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
