//! Backend-as-a-Service Interface
//!
//! GoalTracker keeps no durable state of its own. Authentication, tables,
//! remote procedures and blob storage all live in a hosted backend, reached
//! through the narrow capability set defined here.
//!
//! ## Capabilities
//!
//! - [`AuthProvider`]: sign-up, sign-in, sign-out, token introspection
//! - [`TableStore`]: select/insert/update/delete with filter predicates
//! - [`RpcClient`]: named remote procedures (`get_friends`)
//! - [`BlobStore`]: object upload and public URLs
//!
//! ## Providers
//!
//! - [`SupabaseBackend`]: HTTP provider (GoTrue, PostgREST, Storage)
//! - [`MemoryBackend`]: in-process provider for tests and offline mode

mod error;
mod memory;
mod query;
mod supabase;

pub use error::{BackendError, BackendResult};
pub use memory::MemoryBackend;
pub use query::{escape_like, Filter, Order, Row, TableQuery};
pub use supabase::{SupabaseBackend, SupabaseConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Table names used by the application
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const GOALS: &str = "goals";
    pub const FRIEND_REQUESTS: &str = "friend_requests";
    pub const CALENDAR_NOTES: &str = "calendar_notes";
}

/// Remote procedure returning the joined friend view for a user
pub const RPC_GET_FRIENDS: &str = "get_friends";

/// Bucket holding avatar images
pub const AVATAR_BUCKET: &str = "avatars";

/// Credentials a request is made with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Public (anon) key only
    Anon,
    /// Access token of a signed-in user
    User(String),
}

impl Credentials {
    pub fn user(token: impl Into<String>) -> Self {
        Credentials::User(token.into())
    }

    pub fn token(&self) -> Option<&str> {
        match self {
            Credentials::Anon => None,
            Credentials::User(token) => Some(token),
        }
    }
}

/// Authenticated identity as reported by the auth provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
}

/// Tokens issued on sign-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix seconds
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

/// Result of a sign-up
///
/// `session` is absent when the project requires e-mail confirmation.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

/// Options for a blob upload
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub content_type: String,
    /// Cache-Control max-age in seconds, as a string
    pub cache_control: String,
    /// Overwrite an existing object at the same path
    pub upsert: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream".to_string(),
            cache_control: "3600".to_string(),
            upsert: false,
        }
    }
}

/// Authentication capability
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, metadata: Value)
        -> BackendResult<SignUpOutcome>;

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession>;

    async fn sign_out(&self, credentials: &Credentials) -> BackendResult<()>;

    /// Resolve the user behind an access token
    async fn get_user(&self, credentials: &Credentials) -> BackendResult<AuthUser>;
}

/// Table CRUD capability
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(
        &self,
        credentials: &Credentials,
        table: &str,
        query: TableQuery,
    ) -> BackendResult<Vec<Row>>;

    /// Insert one row and return it as stored
    async fn insert(&self, credentials: &Credentials, table: &str, row: Row) -> BackendResult<Row>;

    /// Patch every row matching `filters` and return the updated rows
    async fn update(
        &self,
        credentials: &Credentials,
        table: &str,
        patch: Row,
        filters: Vec<Filter>,
    ) -> BackendResult<Vec<Row>>;

    async fn delete(
        &self,
        credentials: &Credentials,
        table: &str,
        filters: Vec<Filter>,
    ) -> BackendResult<()>;
}

/// Remote procedure capability
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn rpc(&self, credentials: &Credentials, function: &str, args: Value)
        -> BackendResult<Value>;
}

/// Blob storage capability
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        credentials: &Credentials,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> BackendResult<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// The full capability set a provider offers
#[async_trait]
pub trait Backend: AuthProvider + TableStore + RpcClient + BlobStore {
    /// Short provider name for logs and health output
    fn name(&self) -> &str;

    /// Check that the provider is reachable
    async fn health_check(&self) -> BackendResult<()> {
        Ok(())
    }
}

/// Decode a row into a typed model
pub fn from_row<T: serde::de::DeserializeOwned>(row: Row) -> BackendResult<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

/// Encode a model as a row
pub fn to_row<T: Serialize>(value: &T) -> BackendResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::Serialization(format!(
            "expected an object, got {}",
            other
        ))),
    }
}

/// Decode a list of rows, failing on the first bad one
pub fn from_rows<T: serde::de::DeserializeOwned>(rows: Vec<Row>) -> BackendResult<Vec<T>> {
    rows.into_iter().map(from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        id: String,
        count: u32,
    }

    #[test]
    fn test_row_conversion() {
        let sample = Sample {
            id: "a".into(),
            count: 3,
        };
        let row = to_row(&sample).unwrap();
        assert_eq!(row.get("count"), Some(&json!(3)));

        let back: Sample = from_row(row).unwrap();
        assert_eq!(back, sample);
    }

    #[test]
    fn test_to_row_rejects_non_objects() {
        let err = to_row(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, BackendError::Serialization(_)));
    }

    #[test]
    fn test_credentials_token() {
        assert_eq!(Credentials::Anon.token(), None);
        assert_eq!(Credentials::user("abc").token(), Some("abc"));
    }

    #[test]
    fn test_upload_defaults() {
        let opts = UploadOptions::default();
        assert_eq!(opts.cache_control, "3600");
        assert!(!opts.upsert);
    }
}
