//! Profiles and the friend graph

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp;

/// Public profile of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(with = "timestamp")]
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub login_streak: u32,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a friend request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FriendRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl std::fmt::Display for FriendRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FriendRequestStatus::Pending => write!(f, "pending"),
            FriendRequestStatus::Accepted => write!(f, "accepted"),
            FriendRequestStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Receiver's answer to a pending request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FriendResponse {
    Accepted,
    Rejected,
}

impl From<FriendResponse> for FriendRequestStatus {
    fn from(r: FriendResponse) -> Self {
        match r {
            FriendResponse::Accepted => FriendRequestStatus::Accepted,
            FriendResponse::Rejected => FriendRequestStatus::Rejected,
        }
    }
}

/// A friend request between two users
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FriendRequest {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: FriendRequestStatus,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl FriendRequest {
    /// Whether the request connects `a` and `b`, in either direction
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

/// Incoming pending request with the sender's profile attached
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingRequest {
    #[serde(flatten)]
    pub request: FriendRequest,
    #[serde(default)]
    pub sender: Option<Profile>,
}

/// Joined friend view returned by the `get_friends` procedure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Friend {
    pub friend_id: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_online: bool,
    #[serde(default, with = "timestamp::option")]
    pub last_seen: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_from_row() {
        let profile: Profile = serde_json::from_value(json!({
            "id": "u1",
            "username": "ann",
            "avatar_url": null,
            "is_online": true,
            "last_seen": "2024-05-01T10:00:00Z",
            "login_streak": 4
        }))
        .unwrap();

        assert_eq!(profile.username, "ann");
        assert_eq!(profile.login_streak, 4);
        assert!(profile.created_at.is_none());
    }

    #[test]
    fn test_request_connects_either_direction() {
        let req: FriendRequest = serde_json::from_value(json!({
            "id": "r1",
            "sender_id": "a",
            "receiver_id": "b",
            "status": "pending",
            "created_at": "2024-05-01T10:00:00Z",
            "updated_at": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert!(req.connects("a", "b"));
        assert!(req.connects("b", "a"));
        assert!(!req.connects("a", "c"));
    }

    #[test]
    fn test_response_maps_to_status() {
        assert_eq!(
            FriendRequestStatus::from(FriendResponse::Accepted),
            FriendRequestStatus::Accepted
        );
        assert_eq!(FriendRequestStatus::Rejected.to_string(), "rejected");
    }
}
