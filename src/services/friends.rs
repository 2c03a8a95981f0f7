//! Friends
//!
//! User search, friend requests and presence.
//!
//! At most one pending request may exist per pair of users, in either
//! direction. The check is a read followed by a write, so two concurrent
//! requests for the same pair can both get through. A uniqueness constraint
//! on the table, when present, is reported as the same duplicate error.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::{touched, ServiceError, ServiceResult};
use crate::backend::{
    escape_like, from_row, from_rows, tables, BackendError, Filter, Row, TableQuery,
    RPC_GET_FRIENDS,
};
use crate::models::{Friend, FriendRequest, FriendRequestStatus, FriendResponse, PendingRequest, Profile};
use crate::session::SessionManager;

/// Default page size for user search
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// User search parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(default, alias = "q")]
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
        }
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// Social operations for the signed-in user
#[derive(Clone)]
pub struct FriendService {
    sessions: Arc<SessionManager>,
}

impl FriendService {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Find other users whose username contains the query, ignoring case
    ///
    /// A blank query returns nothing without contacting the backend.
    pub async fn search_users(&self, params: &SearchParams) -> ServiceResult<Vec<Profile>> {
        let session = self.sessions.require().await?;

        let query = params.query.trim();
        if query.is_empty() || params.limit == 0 {
            return Ok(Vec::new());
        }
        if params.offset.checked_add(params.limit).is_none() {
            return Err(ServiceError::validation("Search offset out of range"));
        }

        let rows = self
            .sessions
            .backend()
            .select(
                &session.credentials(),
                tables::PROFILES,
                TableQuery::new()
                    .filter(Filter::neq("id", session.user_id()))
                    .filter(Filter::ilike("username", format!("%{}%", escape_like(query))))
                    .order("username", true)
                    .page(params.limit, params.offset),
            )
            .await?;

        Ok(from_rows(rows)?)
    }

    /// Send a friend request to `receiver_id`
    pub async fn send_request(&self, receiver_id: &str) -> ServiceResult<FriendRequest> {
        let session = self.sessions.require().await?;
        let sender_id = session.user_id();
        let credentials = session.credentials();
        let backend = self.sessions.backend();

        if receiver_id == sender_id {
            return Err(ServiceError::validation(
                "You cannot send a friend request to yourself",
            ));
        }

        let existing = backend
            .select(
                &credentials,
                tables::FRIEND_REQUESTS,
                TableQuery::new()
                    .filter(Filter::eq("status", json!(FriendRequestStatus::Pending)))
                    .filter(pair_filter(sender_id, receiver_id))
                    .range(0, 0),
            )
            .await?;
        if !existing.is_empty() {
            return Err(ServiceError::DuplicateRequest);
        }

        let mut row = Row::new();
        row.insert("sender_id".into(), json!(sender_id));
        row.insert("receiver_id".into(), json!(receiver_id));
        row.insert("status".into(), json!(FriendRequestStatus::Pending));

        let stored = backend
            .insert(&credentials, tables::FRIEND_REQUESTS, row)
            .await
            .map_err(duplicate_or)?;

        let request: FriendRequest = from_row(stored)?;
        tracing::info!(
            request_id = %request.id,
            sender_id = sender_id,
            receiver_id = receiver_id,
            "Friend request sent"
        );
        Ok(request)
    }

    /// Accept or reject a request addressed to the current user
    pub async fn respond(
        &self,
        request_id: &str,
        response: FriendResponse,
    ) -> ServiceResult<FriendRequest> {
        let session = self.sessions.require().await?;

        let mut patch = Row::new();
        patch.insert("status".into(), json!(FriendRequestStatus::from(response)));

        let rows = self
            .sessions
            .backend()
            .update(
                &session.credentials(),
                tables::FRIEND_REQUESTS,
                touched(patch),
                vec![
                    Filter::eq("id", request_id),
                    Filter::eq("receiver_id", session.user_id()),
                ],
            )
            .await?;

        // a request addressed to someone else matches no row
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Friend request".into()))?;
        let request: FriendRequest = from_row(row)?;

        tracing::info!(request_id = request_id, status = %request.status, "Friend request answered");
        Ok(request)
    }

    /// Accepted friends of the current user
    pub async fn friends(&self) -> ServiceResult<Vec<Friend>> {
        let session = self.sessions.require().await?;

        let value = self
            .sessions
            .backend()
            .rpc(
                &session.credentials(),
                RPC_GET_FRIENDS,
                json!({ "user_id": session.user_id() }),
            )
            .await?;

        match value {
            Value::Null => Ok(Vec::new()),
            other => Ok(serde_json::from_value(other).map_err(BackendError::from)?),
        }
    }

    /// Pending requests addressed to the current user, with sender profiles
    ///
    /// Two queries: the requests, then the sender profiles in one batch.
    pub async fn pending_requests(&self) -> ServiceResult<Vec<PendingRequest>> {
        let session = self.sessions.require().await?;
        let credentials = session.credentials();
        let backend = self.sessions.backend();

        let rows = backend
            .select(
                &credentials,
                tables::FRIEND_REQUESTS,
                TableQuery::new()
                    .filter(Filter::eq("status", json!(FriendRequestStatus::Pending)))
                    .filter(Filter::eq("receiver_id", session.user_id()))
                    .order("created_at", false),
            )
            .await?;
        let requests: Vec<FriendRequest> = from_rows(rows)?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut sender_ids: Vec<&str> = requests.iter().map(|r| r.sender_id.as_str()).collect();
        sender_ids.sort_unstable();
        sender_ids.dedup();

        let profiles: Vec<Profile> = from_rows(
            backend
                .select(
                    &credentials,
                    tables::PROFILES,
                    TableQuery::new().filter(Filter::is_in("id", sender_ids)),
                )
                .await?,
        )?;
        let by_id: HashMap<String, Profile> =
            profiles.into_iter().map(|p| (p.id.clone(), p)).collect();

        Ok(requests
            .into_iter()
            .map(|request| {
                let sender = by_id.get(&request.sender_id).cloned();
                PendingRequest { request, sender }
            })
            .collect())
    }

    /// Update the presence flag and `last_seen`
    pub async fn set_online(&self, online: bool) -> ServiceResult<()> {
        let session = self.sessions.require().await?;

        let mut patch = Row::new();
        patch.insert("is_online".into(), json!(online));
        patch.insert("last_seen".into(), json!(Utc::now().to_rfc3339()));

        self.sessions
            .backend()
            .update(
                &session.credentials(),
                tables::PROFILES,
                patch,
                vec![Filter::eq("id", session.user_id())],
            )
            .await?;

        tracing::debug!(user_id = session.user_id(), online = online, "Presence updated");
        Ok(())
    }
}

/// Requests between `a` and `b`, either direction
fn pair_filter(a: &str, b: &str) -> Filter {
    Filter::or(vec![
        Filter::and(vec![Filter::eq("sender_id", a), Filter::eq("receiver_id", b)]),
        Filter::and(vec![Filter::eq("sender_id", b), Filter::eq("receiver_id", a)]),
    ])
}

fn duplicate_or(err: BackendError) -> ServiceError {
    if err.is_unique_violation() {
        ServiceError::DuplicateRequest
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::services::testing::signed_in;

    fn seed_profile(backend: &MemoryBackend, id: &str, username: &str) {
        backend.seed_row(
            tables::PROFILES,
            json!({
                "id": id,
                "username": username,
                "is_online": false,
                "last_seen": "2024-06-01T10:00:00Z",
                "login_streak": 1
            }),
        );
    }

    fn seed_request(backend: &MemoryBackend, id: &str, sender: &str, receiver: &str, status: &str) {
        backend.seed_row(
            tables::FRIEND_REQUESTS,
            json!({
                "id": id,
                "sender_id": sender,
                "receiver_id": receiver,
                "status": status,
                "created_at": "2024-06-01T10:00:00Z",
                "updated_at": "2024-06-01T10:00:00Z"
            }),
        );
    }

    #[tokio::test]
    async fn test_blank_search_makes_no_call() {
        let (backend, sessions, _) = signed_in("ann@example.com").await;
        let friends = FriendService::new(sessions);
        let before = backend.call_count();

        assert!(friends.search_users(&SearchParams::new("")).await.unwrap().is_empty());
        assert!(friends.search_users(&SearchParams::new("   ")).await.unwrap().is_empty());
        assert_eq!(backend.call_count(), before);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_excludes_self() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        seed_profile(&backend, &session.user.id, "annika");
        seed_profile(&backend, "u2", "Anna");
        seed_profile(&backend, "u3", "joanne");
        seed_profile(&backend, "u4", "bob");

        let friends = FriendService::new(sessions);
        let found = friends.search_users(&SearchParams::new("ANN")).await.unwrap();
        let names: Vec<_> = found.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["Anna", "joanne"]);
    }

    #[tokio::test]
    async fn test_search_wildcards_are_literal() {
        let (backend, sessions, _) = signed_in("ann@example.com").await;
        seed_profile(&backend, "u2", "a_b");
        seed_profile(&backend, "u3", "axb");

        let friends = FriendService::new(sessions);
        let found = friends.search_users(&SearchParams::new("a_b")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "a_b");
    }

    #[tokio::test]
    async fn test_search_pagination() {
        let (backend, sessions, _) = signed_in("ann@example.com").await;
        for i in 0..15 {
            seed_profile(&backend, &format!("u{}", i), &format!("user{:02}", i));
        }

        let friends = FriendService::new(sessions);
        let first = friends.search_users(&SearchParams::new("user")).await.unwrap();
        assert_eq!(first.len(), DEFAULT_SEARCH_LIMIT);

        let rest = friends
            .search_users(&SearchParams::new("user").page(10, 10))
            .await
            .unwrap();
        assert_eq!(rest.len(), 5);
        assert_eq!(rest[0].username, "user10");
    }

    #[tokio::test]
    async fn test_search_offset_overflow_is_rejected() {
        let (backend, sessions, _) = signed_in("ann@example.com").await;
        let friends = FriendService::new(sessions);
        let before = backend.call_count();

        let err = friends
            .search_users(&SearchParams::new("user").page(10, usize::MAX))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(backend.call_count(), before);
    }

    #[tokio::test]
    async fn test_send_request_rejects_self() {
        let (_backend, sessions, session) = signed_in("ann@example.com").await;
        let friends = FriendService::new(sessions);

        let err = friends.send_request(&session.user.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_pending_request_in_either_direction() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        let friends = FriendService::new(sessions);

        friends.send_request("bob").await.unwrap();
        let err = friends.send_request("bob").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "A friend request already exists between these users"
        );

        seed_request(&backend, "r-in", "carol", &session.user.id, "pending");
        let err = friends.send_request("carol").await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateRequest));
    }

    #[tokio::test]
    async fn test_unrelated_pending_request_does_not_block() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        // a pending request involving the sender but a different user
        seed_request(&backend, "r1", &session.user.id, "dave", "pending");
        seed_request(&backend, "r2", "bob", &session.user.id, "rejected");

        let friends = FriendService::new(sessions);
        let request = friends.send_request("bob").await.unwrap();
        assert_eq!(request.status, FriendRequestStatus::Pending);
        assert_eq!(request.receiver_id, "bob");
    }

    #[tokio::test]
    async fn test_concurrent_requests_can_both_succeed() {
        let (backend, sessions, _) = signed_in("ann@example.com").await;
        let friends = FriendService::new(sessions);

        let (a, b) = tokio::join!(friends.send_request("bob"), friends.send_request("bob"));
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(backend.rows(tables::FRIEND_REQUESTS).len(), 2);
    }

    #[tokio::test]
    async fn test_only_receiver_can_respond() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        seed_request(&backend, "outgoing", &session.user.id, "bob", "pending");
        seed_request(&backend, "incoming", "carol", &session.user.id, "pending");

        let friends = FriendService::new(sessions);

        let err = friends
            .respond("outgoing", FriendResponse::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let accepted = friends
            .respond("incoming", FriendResponse::Accepted)
            .await
            .unwrap();
        assert_eq!(accepted.status, FriendRequestStatus::Accepted);

        let outgoing = backend
            .rows(tables::FRIEND_REQUESTS)
            .into_iter()
            .find(|r| r.get("id") == Some(&json!("outgoing")))
            .unwrap();
        assert_eq!(outgoing.get("status"), Some(&json!("pending")));
    }

    #[tokio::test]
    async fn test_friends_after_accept() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        seed_profile(&backend, "carol", "carol");
        seed_request(&backend, "r1", "carol", &session.user.id, "pending");

        let friends = FriendService::new(sessions);
        assert!(friends.friends().await.unwrap().is_empty());

        friends.respond("r1", FriendResponse::Accepted).await.unwrap();
        let list = friends.friends().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].friend_id, "carol");
        assert_eq!(list[0].username, "carol");
    }

    #[tokio::test]
    async fn test_pending_requests_include_sender_profile() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        seed_profile(&backend, "carol", "carol");
        seed_request(&backend, "r1", "carol", &session.user.id, "pending");
        seed_request(&backend, "r2", "ghost", &session.user.id, "pending");
        seed_request(&backend, "r3", "dave", &session.user.id, "accepted");
        seed_request(&backend, "r4", &session.user.id, "erin", "pending");

        let friends = FriendService::new(sessions);
        let before = backend.call_count();
        let pending = friends.pending_requests().await.unwrap();
        assert_eq!(backend.call_count() - before, 2);

        assert_eq!(pending.len(), 2);
        let carol = pending.iter().find(|p| p.request.id == "r1").unwrap();
        assert_eq!(carol.sender.as_ref().unwrap().username, "carol");
        let ghost = pending.iter().find(|p| p.request.id == "r2").unwrap();
        assert!(ghost.sender.is_none());
    }

    #[tokio::test]
    async fn test_set_online() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        seed_profile(&backend, &session.user.id, "ann");

        let friends = FriendService::new(sessions);
        friends.set_online(true).await.unwrap();

        let row = backend
            .rows(tables::PROFILES)
            .into_iter()
            .find(|r| r.get("id") == Some(&json!(session.user.id)))
            .unwrap();
        assert_eq!(row.get("is_online"), Some(&json!(true)));
        assert_ne!(row.get("last_seen"), Some(&json!("2024-06-01T10:00:00Z")));
    }

    #[test]
    fn test_unique_violation_maps_to_duplicate() {
        let err = duplicate_or(BackendError::api(
            409,
            "duplicate key value violates unique constraint \"one_pending_per_pair\"",
        ));
        assert!(matches!(err, ServiceError::DuplicateRequest));

        let err = duplicate_or(BackendError::api(400, "bad request"));
        assert_eq!(err.to_string(), "bad request");
    }
}
