//! Supabase provider
//!
//! HTTP client for a hosted Supabase project: GoTrue for auth, PostgREST for
//! tables and RPC, and the Storage API for avatars. Every call is a single
//! request with no retry; failures are returned with the provider's message.

use super::{
    AuthProvider, AuthSession, AuthUser, Backend, BackendError, BackendResult, BlobStore,
    Credentials, Filter, Row, RpcClient, SignUpOutcome, TableQuery, TableStore, UploadOptions,
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

/// Supabase REST client
pub struct SupabaseBackend {
    client: Client,
    config: SupabaseConfig,
}

/// Configuration for the Supabase provider
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL (e.g., "https://xyzcompany.supabase.co")
    pub url: String,
    /// Public anon key
    pub anon_key: String,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for SupabaseConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl SupabaseBackend {
    /// Create a new Supabase backend with the given configuration
    pub fn new(config: SupabaseConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("GoalTracker/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let config = SupabaseConfig {
            url: config.url.trim_end_matches('/').to_string(),
            ..config
        };

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Attach the api key and bearer token
    fn authorize(&self, builder: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        let bearer = credentials.token().unwrap_or(&self.config.anon_key);
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
    }

    fn rest_url(&self, table: &str, params: &[(String, String)]) -> String {
        let mut url = format!("{}/rest/v1/{}", self.config.url, table);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&encode_params(params));
        }
        url
    }

    async fn send(&self, builder: RequestBuilder) -> BackendResult<Response> {
        let response = builder.send().await.map_err(BackendError::from_transport)?;

        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            Err(BackendError::api(status, error_message(&text)))
        }
    }

    async fn send_json<T: serde::de::DeserializeOwned>(&self, builder: RequestBuilder) -> BackendResult<T> {
        let response = self.send(builder).await?;
        response.json().await.map_err(BackendError::from_transport)
    }
}

#[async_trait]
impl AuthProvider for SupabaseBackend {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: Value,
    ) -> BackendResult<SignUpOutcome> {
        let url = format!("{}/auth/v1/signup", self.config.url);
        let body = json!({ "email": email, "password": password, "data": metadata });

        let response: SignUpResponse = self
            .send_json(self.authorize(self.client.post(&url), &Credentials::Anon).json(&body))
            .await?;

        // With e-mail confirmation on, GoTrue returns the bare user
        match (response.access_token, response.user) {
            (Some(access_token), Some(user)) => Ok(SignUpOutcome {
                user: user.clone(),
                session: Some(AuthSession {
                    access_token,
                    refresh_token: response.refresh_token,
                    expires_at: response.expires_at,
                    user,
                }),
            }),
            (_, Some(user)) => Ok(SignUpOutcome {
                user,
                session: None,
            }),
            (_, None) => match response.id {
                Some(id) => Ok(SignUpOutcome {
                    user: AuthUser {
                        id,
                        email: response.email,
                        user_metadata: response.user_metadata.unwrap_or(Value::Null),
                    },
                    session: None,
                }),
                None => Err(BackendError::api(500, "Failed to create user")),
            },
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<AuthSession> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.config.url);
        let body = json!({ "email": email, "password": password });

        self.send_json(self.authorize(self.client.post(&url), &Credentials::Anon).json(&body))
            .await
    }

    async fn sign_out(&self, credentials: &Credentials) -> BackendResult<()> {
        if credentials.token().is_none() {
            return Ok(());
        }
        let url = format!("{}/auth/v1/logout", self.config.url);
        self.send(self.authorize(self.client.post(&url), credentials))
            .await?;
        Ok(())
    }

    async fn get_user(&self, credentials: &Credentials) -> BackendResult<AuthUser> {
        let url = format!("{}/auth/v1/user", self.config.url);
        self.send_json(self.authorize(self.client.get(&url), credentials))
            .await
    }
}

#[async_trait]
impl TableStore for SupabaseBackend {
    async fn select(
        &self,
        credentials: &Credentials,
        table: &str,
        query: TableQuery,
    ) -> BackendResult<Vec<Row>> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(query.filters.iter().map(filter_param));

        if let Some(order) = &query.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        if let Some((from, to)) = query.range {
            params.push(("offset".to_string(), from.to_string()));
            params.push(("limit".to_string(), (to.saturating_sub(from) + 1).to_string()));
        }

        let url = self.rest_url(table, &params);
        tracing::debug!(table = %table, "PostgREST select");
        self.send_json(self.authorize(self.client.get(&url), credentials))
            .await
    }

    async fn insert(&self, credentials: &Credentials, table: &str, row: Row) -> BackendResult<Row> {
        let url = self.rest_url(table, &[]);
        let rows: Vec<Row> = self
            .send_json(
                self.authorize(self.client.post(&url), credentials)
                    .header("Prefer", "return=representation")
                    .json(&Value::Object(row)),
            )
            .await?;

        rows.into_iter().next().ok_or(BackendError::NotFound)
    }

    async fn update(
        &self,
        credentials: &Credentials,
        table: &str,
        patch: Row,
        filters: Vec<Filter>,
    ) -> BackendResult<Vec<Row>> {
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let url = self.rest_url(table, &params);

        self.send_json(
            self.authorize(self.client.patch(&url), credentials)
                .header("Prefer", "return=representation")
                .json(&Value::Object(patch)),
        )
        .await
    }

    async fn delete(
        &self,
        credentials: &Credentials,
        table: &str,
        filters: Vec<Filter>,
    ) -> BackendResult<()> {
        let params: Vec<(String, String)> = filters.iter().map(filter_param).collect();
        let url = self.rest_url(table, &params);

        self.send(self.authorize(self.client.delete(&url), credentials))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RpcClient for SupabaseBackend {
    async fn rpc(
        &self,
        credentials: &Credentials,
        function: &str,
        args: Value,
    ) -> BackendResult<Value> {
        let url = format!("{}/rest/v1/rpc/{}", self.config.url, function);
        self.send_json(self.authorize(self.client.post(&url), credentials).json(&args))
            .await
    }
}

#[async_trait]
impl BlobStore for SupabaseBackend {
    async fn upload(
        &self,
        credentials: &Credentials,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> BackendResult<()> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url,
            bucket,
            encode_path(path)
        );

        self.send(
            self.authorize(self.client.post(&url), credentials)
                .header("content-type", options.content_type)
                .header("cache-control", format!("max-age={}", options.cache_control))
                .header("x-upsert", options.upsert.to_string())
                .body(bytes),
        )
        .await
        .map_err(|e| match e {
            BackendError::Api { message, .. } => BackendError::Storage(message),
            other => other,
        })?;

        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.url,
            bucket,
            encode_path(path)
        )
    }
}

#[async_trait]
impl Backend for SupabaseBackend {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn health_check(&self) -> BackendResult<()> {
        let url = format!("{}/auth/v1/health", self.config.url);
        self.send(self.authorize(self.client.get(&url), &Credentials::Anon))
            .await?;
        Ok(())
    }
}

// ============================================
// PostgREST encoding
// ============================================

/// Encode a top-level filter as a query parameter
fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(col, v) => (col.clone(), format!("eq.{}", scalar(v))),
        Filter::Neq(col, v) => (col.clone(), format!("neq.{}", scalar(v))),
        Filter::ILike(col, p) => (col.clone(), format!("ilike.{}", p)),
        Filter::Gte(col, v) => (col.clone(), format!("gte.{}", scalar(v))),
        Filter::Lte(col, v) => (col.clone(), format!("lte.{}", scalar(v))),
        Filter::In(col, vs) => (col.clone(), format!("in.({})", list(vs))),
        Filter::Or(fs) => ("or".to_string(), format!("({})", nested_list(fs))),
        Filter::And(fs) => ("and".to_string(), format!("({})", nested_list(fs))),
    }
}

/// Encode a filter inside a logical group (`col.op.value`)
fn nested(filter: &Filter) -> String {
    match filter {
        Filter::Or(fs) => format!("or({})", nested_list(fs)),
        Filter::And(fs) => format!("and({})", nested_list(fs)),
        Filter::ILike(col, p) => format!("{}.ilike.{}", col, quote_reserved(p)),
        Filter::Eq(col, v) => format!("{}.eq.{}", col, quote_reserved(&scalar(v))),
        Filter::Neq(col, v) => format!("{}.neq.{}", col, quote_reserved(&scalar(v))),
        Filter::Gte(col, v) => format!("{}.gte.{}", col, quote_reserved(&scalar(v))),
        Filter::Lte(col, v) => format!("{}.lte.{}", col, quote_reserved(&scalar(v))),
        Filter::In(col, vs) => format!("{}.in.({})", col, list(vs)),
    }
}

fn nested_list(filters: &[Filter]) -> String {
    filters.iter().map(nested).collect::<Vec<_>>().join(",")
}

fn list(values: &[Value]) -> String {
    values
        .iter()
        .map(|v| quote_reserved(&scalar(v)))
        .collect::<Vec<_>>()
        .join(",")
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// PostgREST needs values containing reserved characters in double quotes
fn quote_reserved(value: &str) -> String {
    if value.contains(&[',', '(', ')', '.', ':'][..]) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn encode_params(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Pull the human-readable message out of a GoTrue/PostgREST error body
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        msg: Option<String>,
        error_description: Option<String>,
        error: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed
            .message
            .or(parsed.msg)
            .or(parsed.error_description)
            .or(parsed.error)
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

// ============================================
// Response DTOs
// ============================================

#[derive(Debug, Deserialize)]
struct SignUpResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    user: Option<AuthUser>,
    // bare-user shape
    id: Option<String>,
    email: Option<String>,
    user_metadata: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SupabaseConfig::default();
        assert_eq!(config.url, "http://localhost:54321");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let backend = SupabaseBackend::new(SupabaseConfig {
            url: "https://demo.supabase.co/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(backend.config().url, "https://demo.supabase.co");
    }

    #[test]
    fn test_simple_filters() {
        assert_eq!(
            filter_param(&Filter::eq("id", "u1")),
            ("id".to_string(), "eq.u1".to_string())
        );
        assert_eq!(
            filter_param(&Filter::ilike("username", "%ann%")),
            ("username".to_string(), "ilike.%ann%".to_string())
        );
        assert_eq!(
            filter_param(&Filter::eq("is_online", true)),
            ("is_online".to_string(), "eq.true".to_string())
        );
        assert_eq!(
            filter_param(&Filter::is_in("id", ["a", "b"])),
            ("id".to_string(), "in.(a,b)".to_string())
        );
    }

    #[test]
    fn test_pair_filter_encoding() {
        let filter = Filter::or(vec![
            Filter::and(vec![Filter::eq("sender_id", "a"), Filter::eq("receiver_id", "b")]),
            Filter::and(vec![Filter::eq("sender_id", "b"), Filter::eq("receiver_id", "a")]),
        ]);

        assert_eq!(
            filter_param(&filter),
            (
                "or".to_string(),
                "(and(sender_id.eq.a,receiver_id.eq.b),and(sender_id.eq.b,receiver_id.eq.a))"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_reserved_values_quoted() {
        let filter = Filter::or(vec![Filter::eq("due_date", "2024-01-01T10:00:00Z")]);
        assert_eq!(
            filter_param(&filter).1,
            "(due_date.eq.\"2024-01-01T10:00:00Z\")"
        );
    }

    #[test]
    fn test_rest_url_encoding() {
        let backend = SupabaseBackend::new(SupabaseConfig::default()).unwrap();
        let url = backend.rest_url(
            "profiles",
            &[("username".to_string(), "ilike.%a b%".to_string())],
        );
        assert_eq!(
            url,
            "http://localhost:54321/rest/v1/profiles?username=ilike.%25a%20b%25"
        );
    }

    #[test]
    fn test_public_url() {
        let backend = SupabaseBackend::new(SupabaseConfig::default()).unwrap();
        assert_eq!(
            backend.public_url("avatars", "avatars/u1-1.png"),
            "http://localhost:54321/storage/v1/object/public/avatars/avatars/u1-1.png"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"code":"23505","message":"duplicate key value"}"#),
            "duplicate key value"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message("plain failure"), "plain failure");
    }
}
