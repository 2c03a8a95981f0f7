//! Own profile and avatar

use chrono::Utc;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use super::{ServiceError, ServiceResult};
use crate::backend::{from_row, tables, Filter, Row, TableQuery, UploadOptions, AVATAR_BUCKET};
use crate::models::Profile;
use crate::session::SessionManager;

/// Largest accepted avatar image
pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

#[derive(Clone)]
pub struct ProfileService {
    sessions: Arc<SessionManager>,
}

impl ProfileService {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    /// Profile of the signed-in user
    pub async fn get(&self) -> ServiceResult<Profile> {
        let session = self.sessions.require().await?;

        let rows = self
            .sessions
            .backend()
            .select(
                &session.credentials(),
                tables::PROFILES,
                TableQuery::new()
                    .filter(Filter::eq("id", session.user_id()))
                    .range(0, 0),
            )
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::NotFound("Profile".into()))?;
        Ok(from_row(row)?)
    }

    /// Upload a new avatar image and point the profile at it
    ///
    /// Two steps: the upload, then the profile update. If the update fails the
    /// uploaded object stays in the bucket.
    pub async fn upload_avatar(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> ServiceResult<String> {
        let session = self.sessions.require().await?;
        let credentials = session.credentials();
        let backend = self.sessions.backend();

        if !content_type.starts_with("image/") {
            return Err(ServiceError::validation("Avatar must be an image"));
        }
        if bytes.is_empty() || bytes.len() > MAX_AVATAR_BYTES {
            return Err(ServiceError::validation(format!(
                "Avatar must be between 1 byte and {} MB",
                MAX_AVATAR_BYTES / (1024 * 1024)
            )));
        }

        let path = avatar_path(session.user_id(), file_name, Utc::now().timestamp_millis());
        let size = bytes.len();
        backend
            .upload(
                &credentials,
                AVATAR_BUCKET,
                &path,
                bytes,
                UploadOptions {
                    content_type: content_type.to_string(),
                    cache_control: "3600".to_string(),
                    upsert: true,
                },
            )
            .await?;

        let url = backend.public_url(AVATAR_BUCKET, &path);

        let mut patch = Row::new();
        patch.insert("avatar_url".into(), json!(url));
        let rows = backend
            .update(
                &credentials,
                tables::PROFILES,
                patch,
                vec![Filter::eq("id", session.user_id())],
            )
            .await?;
        if rows.is_empty() {
            return Err(ServiceError::NotFound("Profile".into()));
        }

        tracing::info!(user_id = session.user_id(), path = %path, bytes = size, "Avatar updated");
        Ok(url)
    }
}

/// Object path `avatars/{user_id}-{millis}.{ext}`
pub fn avatar_path(user_id: &str, file_name: &str, millis: i64) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| "bin".to_string());
    format!("avatars/{}-{}.{}", user_id, millis, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::signed_in;

    fn seed_profile(backend: &crate::backend::MemoryBackend, id: &str) {
        backend.seed_row(
            tables::PROFILES,
            json!({
                "id": id,
                "username": "ann",
                "avatar_url": null,
                "is_online": true,
                "last_seen": "2024-06-01T10:00:00Z",
                "login_streak": 3
            }),
        );
    }

    #[test]
    fn test_avatar_path() {
        assert_eq!(avatar_path("u1", "Me.PNG", 42), "avatars/u1-42.png");
        assert_eq!(avatar_path("u1", "archive.tar.gz", 1), "avatars/u1-1.gz");
        assert_eq!(avatar_path("u1", "noext", 1), "avatars/u1-1.bin");
    }

    #[tokio::test]
    async fn test_get_profile() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        let profiles = ProfileService::new(sessions);

        assert!(matches!(profiles.get().await, Err(ServiceError::NotFound(_))));

        seed_profile(&backend, &session.user.id);
        let profile = profiles.get().await.unwrap();
        assert_eq!(profile.username, "ann");
        assert_eq!(profile.login_streak, 3);
    }

    #[tokio::test]
    async fn test_upload_avatar_stores_blob_and_url() {
        let (backend, sessions, session) = signed_in("ann@example.com").await;
        seed_profile(&backend, &session.user.id);
        let profiles = ProfileService::new(sessions);

        let url = profiles
            .upload_avatar("me.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        let prefix = format!("avatars/{}-", session.user.id);
        let path = url
            .split("/public/avatars/")
            .nth(1)
            .unwrap()
            .to_string();
        assert!(path.starts_with(&prefix));
        assert!(path.ends_with(".png"));

        let blob = backend.blob(AVATAR_BUCKET, &path).unwrap();
        assert_eq!(blob.bytes, vec![1, 2, 3]);
        assert_eq!(blob.cache_control, "3600");

        assert_eq!(profiles.get().await.unwrap().avatar_url, Some(url));
    }

    #[tokio::test]
    async fn test_upload_rejects_non_images() {
        let (backend, sessions, _) = signed_in("ann@example.com").await;
        let profiles = ProfileService::new(sessions);
        let before = backend.call_count();

        let err = profiles
            .upload_avatar("notes.txt", b"hello".to_vec(), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(backend.call_count(), before);
    }
}
