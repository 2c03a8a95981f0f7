//! In-memory provider
//!
//! A process-local stand-in for the hosted backend. Used by the test suite and
//! by the server when no backend URL is configured (offline mode). Data is lost
//! on exit.
//!
//! Every operation yields to the scheduler once before touching state, so
//! interleavings between concurrent calls behave like real network calls.

use super::{
    AuthProvider, AuthSession, AuthUser, Backend, BackendError, BackendResult, BlobStore,
    Credentials, Filter, Row, RpcClient, SignUpOutcome, TableQuery, TableStore, UploadOptions,
    RPC_GET_FRIENDS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// In-memory backend
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    calls: AtomicUsize,
    public_base: String,
}

#[derive(Default)]
struct MemoryState {
    /// email -> account
    accounts: HashMap<String, Account>,
    /// access token -> user id
    tokens: HashMap<String, String>,
    tables: HashMap<String, Vec<Row>>,
    blobs: HashMap<(String, String), Blob>,
    /// table -> injected write failure message
    write_failures: HashMap<String, String>,
}

struct Account {
    user: AuthUser,
    password: String,
}

/// A stored object
#[derive(Debug, Clone)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub cache_control: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            calls: AtomicUsize::new(0),
            public_base: "memory://goaltracker".to_string(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn enter(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        tokio::task::yield_now().await;
    }

    /// Number of backend operations issued so far
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Register an auth account directly, without counting as a call
    pub fn seed_user(&self, email: &str, password: &str) -> AuthUser {
        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: Value::Null,
        };
        self.state().accounts.insert(
            email.to_lowercase(),
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        user
    }

    /// Insert a row directly, without counting as a call
    pub fn seed_row(&self, table: &str, row: Value) {
        if let Value::Object(row) = row {
            self.state()
                .tables
                .entry(table.to_string())
                .or_default()
                .push(row);
        }
    }

    /// Snapshot of a table
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Stored object, if any
    pub fn blob(&self, bucket: &str, path: &str) -> Option<Blob> {
        self.state()
            .blobs
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    /// Whether an auth account exists for the e-mail
    pub fn has_account(&self, email: &str) -> bool {
        self.state().accounts.contains_key(&email.to_lowercase())
    }

    /// Make every insert/update on `table` fail with `message`
    pub fn fail_writes(&self, table: &str, message: &str) {
        self.state()
            .write_failures
            .insert(table.to_string(), message.to_string());
    }

    pub fn clear_failures(&self) {
        self.state().write_failures.clear();
    }

    fn check_write(state: &MemoryState, table: &str) -> BackendResult<()> {
        match state.write_failures.get(table) {
            Some(message) => Err(BackendError::api(400, message.clone())),
            None => Ok(()),
        }
    }

    fn issue_token(state: &mut MemoryState, user: &AuthUser) -> AuthSession {
        let token = Uuid::new_v4().to_string();
        state.tokens.insert(token.clone(), user.id.clone());
        AuthSession {
            access_token: token,
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_at: Some(Utc::now().timestamp() + 3600),
            user: user.clone(),
        }
    }

    fn get_friends(state: &MemoryState, user_id: &str) -> Value {
        let requests = state.tables.get(super::tables::FRIEND_REQUESTS);
        let profiles = state.tables.get(super::tables::PROFILES);

        let friends: Vec<Value> = requests
            .into_iter()
            .flatten()
            .filter(|r| r.get("status") == Some(&json!("accepted")))
            .filter_map(|r| {
                let sender = r.get("sender_id")?.as_str()?;
                let receiver = r.get("receiver_id")?.as_str()?;
                if sender == user_id {
                    Some(receiver.to_string())
                } else if receiver == user_id {
                    Some(sender.to_string())
                } else {
                    None
                }
            })
            .filter_map(|friend_id| {
                let profile = profiles
                    .into_iter()
                    .flatten()
                    .find(|p| p.get("id") == Some(&json!(friend_id)))?;
                Some(json!({
                    "friend_id": friend_id,
                    "username": profile.get("username").cloned().unwrap_or(Value::Null),
                    "avatar_url": profile.get("avatar_url").cloned().unwrap_or(Value::Null),
                    "is_online": profile.get("is_online").cloned().unwrap_or(json!(false)),
                    "last_seen": profile.get("last_seen").cloned().unwrap_or(Value::Null),
                }))
            })
            .collect();

        Value::Array(friends)
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> BackendResult<SignUpOutcome> {
        self.enter().await;
        let mut state = self.state();
        let key = email.to_lowercase();

        if state.accounts.contains_key(&key) {
            return Err(BackendError::api(422, "User already registered"));
        }
        if password.len() < 6 {
            return Err(BackendError::api(
                422,
                "Password should be at least 6 characters",
            ));
        }

        let user = AuthUser {
            id: Uuid::new_v4().to_string(),
            email: Some(email.to_string()),
            user_metadata: metadata,
        };
        state.accounts.insert(
            key,
            Account {
                user: user.clone(),
                password: password.to_string(),
            },
        );
        let session = Self::issue_token(&mut state, &user);

        Ok(SignUpOutcome {
            user,
            session: Some(session),
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        self.enter().await;
        let mut state = self.state();

        let user = match state.accounts.get(&email.to_lowercase()) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(BackendError::api(400, "Invalid login credentials")),
        };

        Ok(Self::issue_token(&mut state, &user))
    }

    async fn sign_out(&self, credentials: &Credentials) -> BackendResult<()> {
        self.enter().await;
        if let Some(token) = credentials.token() {
            self.state().tokens.remove(token);
        }
        Ok(())
    }

    async fn get_user(&self, credentials: &Credentials) -> BackendResult<AuthUser> {
        self.enter().await;
        let state = self.state();

        let user_id = credentials
            .token()
            .and_then(|t| state.tokens.get(t))
            .ok_or_else(|| BackendError::api(401, "invalid JWT"))?;

        state
            .accounts
            .values()
            .find(|a| &a.user.id == user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| BackendError::api(404, "User not found"))
    }
}

#[async_trait]
impl TableStore for MemoryBackend {
    async fn select(
        &self,
        _credentials: &Credentials,
        table: &str,
        query: TableQuery,
    ) -> BackendResult<Vec<Row>> {
        self.enter().await;
        let state = self.state();

        let mut rows: Vec<Row> = state
            .tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(|row| query.filters.iter().all(|f| matches_filter(row, f)))
            .cloned()
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                )
                .unwrap_or(Ordering::Equal);
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        if let Some((from, to)) = query.range {
            rows = rows
                .into_iter()
                .skip(from)
                .take(to.saturating_sub(from) + 1)
                .collect();
        }

        Ok(rows)
    }

    async fn insert(&self, _credentials: &Credentials, table: &str, mut row: Row) -> BackendResult<Row> {
        self.enter().await;
        let mut state = self.state();
        Self::check_write(&state, table)?;

        let now = json!(Utc::now().to_rfc3339());
        row.entry("id")
            .or_insert_with(|| json!(Uuid::new_v4().to_string()));
        row.entry("created_at").or_insert_with(|| now.clone());
        row.entry("updated_at").or_insert(now);

        let rows = state.tables.entry(table.to_string()).or_default();
        if rows.iter().any(|r| r.get("id") == row.get("id")) {
            return Err(BackendError::api(
                409,
                format!("duplicate key value violates unique constraint \"{}_pkey\"", table),
            ));
        }

        rows.push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        _credentials: &Credentials,
        table: &str,
        patch: Row,
        filters: Vec<Filter>,
    ) -> BackendResult<Vec<Row>> {
        self.enter().await;
        let mut state = self.state();
        Self::check_write(&state, table)?;

        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(table) {
            for row in rows
                .iter_mut()
                .filter(|row| filters.iter().all(|f| matches_filter(row, f)))
            {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    async fn delete(
        &self,
        _credentials: &Credentials,
        table: &str,
        filters: Vec<Filter>,
    ) -> BackendResult<()> {
        self.enter().await;
        let mut state = self.state();
        Self::check_write(&state, table)?;

        if let Some(rows) = state.tables.get_mut(table) {
            rows.retain(|row| !filters.iter().all(|f| matches_filter(row, f)));
        }
        Ok(())
    }
}

#[async_trait]
impl RpcClient for MemoryBackend {
    async fn rpc(
        &self,
        _credentials: &Credentials,
        function: &str,
        args: Value,
    ) -> BackendResult<Value> {
        self.enter().await;
        let state = self.state();

        match function {
            RPC_GET_FRIENDS => {
                let user_id = args
                    .get("user_id")
                    .and_then(Value::as_str)
                    .ok_or_else(|| BackendError::api(400, "missing argument user_id"))?;
                Ok(Self::get_friends(&state, user_id))
            }
            other => Err(BackendError::api(
                404,
                format!("Could not find the function public.{}", other),
            )),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn upload(
        &self,
        _credentials: &Credentials,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> BackendResult<()> {
        self.enter().await;
        let mut state = self.state();
        let key = (bucket.to_string(), path.to_string());

        if !options.upsert && state.blobs.contains_key(&key) {
            return Err(BackendError::Storage("The resource already exists".to_string()));
        }

        state.blobs.insert(
            key,
            Blob {
                bytes,
                content_type: options.content_type,
                cache_control: options.cache_control,
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.public_base, bucket, path)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================
// Filter evaluation
// ============================================

fn matches_filter(row: &Row, filter: &Filter) -> bool {
    let field = |col: &str| row.get(col).unwrap_or(&Value::Null);

    match filter {
        Filter::Eq(col, v) => compare_values(field(col), v) == Some(Ordering::Equal),
        Filter::Neq(col, v) => compare_values(field(col), v) != Some(Ordering::Equal),
        Filter::Gte(col, v) => matches!(
            compare_values(field(col), v),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lte(col, v) => matches!(
            compare_values(field(col), v),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Filter::In(col, vs) => vs
            .iter()
            .any(|v| compare_values(field(col), v) == Some(Ordering::Equal)),
        Filter::ILike(col, pattern) => match (field(col).as_str(), like_regex(pattern)) {
            (Some(text), Some(re)) => re.is_match(text),
            _ => false,
        },
        Filter::Or(fs) => fs.iter().any(|f| matches_filter(row, f)),
        Filter::And(fs) => fs.iter().all(|f| matches_filter(row, f)),
    }
}

/// Compare two JSON scalars the way the database would
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => {
            match (x.parse::<DateTime<Utc>>(), y.parse::<DateTime<Utc>>()) {
                (Ok(dx), Ok(dy)) => Some(dx.cmp(&dy)),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

/// Translate a SQL LIKE pattern into an anchored, case-insensitive regex
fn like_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("(?is)^");
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    re.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');

    Regex::new(&re).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tables;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_like_regex() {
        let re = like_regex("%ann%").unwrap();
        assert!(re.is_match("Joanna"));
        assert!(re.is_match("ANN"));
        assert!(!re.is_match("anb"));

        let re = like_regex("a_c").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abbc"));

        let re = like_regex("100\\%").unwrap();
        assert!(re.is_match("100%"));
        assert!(!re.is_match("1000"));
    }

    #[test]
    fn test_compare_timestamps_across_precision() {
        let a = json!("2024-03-01T00:00:00.500Z");
        let b = json!("2024-03-01T00:00:00Z");
        assert_eq!(compare_values(&a, &b), Some(Ordering::Greater));
    }

    #[test]
    fn test_filter_matching() {
        let r = row(json!({"sender_id": "a", "receiver_id": "b", "status": "pending"}));

        assert!(matches_filter(&r, &Filter::eq("status", "pending")));
        assert!(!matches_filter(&r, &Filter::neq("status", "pending")));
        assert!(matches_filter(
            &r,
            &Filter::or(vec![
                Filter::and(vec![Filter::eq("sender_id", "b"), Filter::eq("receiver_id", "a")]),
                Filter::and(vec![Filter::eq("sender_id", "a"), Filter::eq("receiver_id", "b")]),
            ])
        ));
        assert!(matches_filter(&r, &Filter::is_in("sender_id", ["x", "a"])));
    }

    #[tokio::test]
    async fn test_select_order_and_range() {
        let backend = MemoryBackend::new();
        for (i, name) in ["carol", "alice", "bob"].iter().enumerate() {
            backend.seed_row(tables::PROFILES, json!({"id": i.to_string(), "username": name}));
        }

        let rows = backend
            .select(
                &Credentials::Anon,
                tables::PROFILES,
                TableQuery::new().order("username", true).range(0, 1),
            )
            .await
            .unwrap();

        let names: Vec<_> = rows.iter().map(|r| r["username"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_insert_fills_defaults_and_rejects_duplicate_ids() {
        let backend = MemoryBackend::new();
        let stored = backend
            .insert(&Credentials::Anon, tables::GOALS, row(json!({"title": "Run"})))
            .await
            .unwrap();

        assert!(stored.contains_key("id"));
        assert!(stored.contains_key("created_at"));

        let dup = row(json!({"id": stored["id"].clone(), "title": "Again"}));
        let err = backend
            .insert(&Credentials::Anon, tables::GOALS, dup)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let backend = MemoryBackend::new();
        backend.seed_row(tables::GOALS, json!({"id": "g1", "status": "not_started"}));
        backend.seed_row(tables::GOALS, json!({"id": "g2", "status": "not_started"}));

        let updated = backend
            .update(
                &Credentials::Anon,
                tables::GOALS,
                row(json!({"status": "completed"})),
                vec![Filter::eq("id", "g1")],
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["status"], json!("completed"));

        backend
            .delete(&Credentials::Anon, tables::GOALS, vec![Filter::eq("id", "g2")])
            .await
            .unwrap();
        assert_eq!(backend.rows(tables::GOALS).len(), 1);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let backend = MemoryBackend::new();
        backend.fail_writes(tables::PROFILES, "permission denied for table profiles");

        let err = backend
            .insert(&Credentials::Anon, tables::PROFILES, row(json!({"id": "u1"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "permission denied for table profiles");
    }

    #[tokio::test]
    async fn test_auth_round() {
        let backend = MemoryBackend::new();
        let outcome = backend
            .sign_up("ann@example.com", "secret1", json!({"username": "ann"}))
            .await
            .unwrap();
        let session = outcome.session.unwrap();

        let creds = Credentials::user(&session.access_token);
        let user = backend.get_user(&creds).await.unwrap();
        assert_eq!(user.id, outcome.user.id);

        let err = backend.sign_in("ann@example.com", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid login credentials");

        backend.sign_out(&creds).await.unwrap();
        assert!(backend.get_user(&creds).await.is_err());
    }

    #[tokio::test]
    async fn test_get_friends_rpc() {
        let backend = MemoryBackend::new();
        backend.seed_row(tables::PROFILES, json!({"id": "a", "username": "ann", "is_online": true}));
        backend.seed_row(tables::PROFILES, json!({"id": "b", "username": "ben", "is_online": false}));
        backend.seed_row(
            tables::FRIEND_REQUESTS,
            json!({"id": "r1", "sender_id": "b", "receiver_id": "a", "status": "accepted"}),
        );

        let friends = backend
            .rpc(&Credentials::Anon, RPC_GET_FRIENDS, json!({"user_id": "a"}))
            .await
            .unwrap();

        assert_eq!(friends.as_array().unwrap().len(), 1);
        assert_eq!(friends[0]["friend_id"], json!("b"));
        assert_eq!(friends[0]["username"], json!("ben"));
    }

    #[tokio::test]
    async fn test_upload_without_upsert_conflicts() {
        let backend = MemoryBackend::new();
        let opts = UploadOptions::default();

        backend
            .upload(&Credentials::Anon, "avatars", "a.png", vec![1], opts.clone())
            .await
            .unwrap();
        let err = backend
            .upload(&Credentials::Anon, "avatars", "a.png", vec![2], opts)
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Storage(_)));
    }
}
