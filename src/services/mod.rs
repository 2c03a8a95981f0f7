//! Data access services
//!
//! Thin façades over the backend, one per resource:
//! - [`GoalService`]: the user's goals
//! - [`FriendService`]: user search, friend requests, friend list, presence
//! - [`NoteService`]: calendar notes
//! - [`ProfileService`]: own profile and avatar upload
//!
//! Every operation needs a signed-in session and issues a single backend
//! request unless noted otherwise. There is no retry; provider error messages
//! are passed through unchanged.

mod error;
mod friends;
mod goals;
mod notes;
mod profile;

pub use error::{ServiceError, ServiceResult};
pub use friends::{FriendService, SearchParams, DEFAULT_SEARCH_LIMIT};
pub use goals::GoalService;
pub use notes::NoteService;
pub use profile::ProfileService;

use serde_json::json;

use crate::backend::Row;

/// Patch with a fresh `updated_at`
pub(crate) fn touched(mut patch: Row) -> Row {
    patch.insert(
        "updated_at".into(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    patch
}
