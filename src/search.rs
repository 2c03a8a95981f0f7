//! Debounced user search
//!
//! Rapid successive searches (one per keystroke) are collapsed: each call
//! waits a fixed delay and only the most recent call still issues the query.
//! Superseded calls return `None` without contacting the backend.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::models::Profile;
use crate::services::{FriendService, SearchParams, ServiceResult};

/// Default debounce delay
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Latest-call-wins delay gate
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: AtomicU64,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: AtomicU64::new(0),
        }
    }

    /// Wait out the delay; `true` if no newer call arrived meanwhile
    pub async fn settle(&self) -> bool {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.generation.load(Ordering::SeqCst) == ticket
    }

    /// Run `action` after the delay unless a newer call superseded this one
    pub async fn run<F, Fut, T>(&self, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if self.settle().await {
            Some(action().await)
        } else {
            None
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

/// User search behind a debouncer
pub struct UserSearch {
    friends: FriendService,
    debouncer: Debouncer,
    page_size: usize,
}

impl UserSearch {
    pub fn new(friends: FriendService, delay: Duration, page_size: usize) -> Self {
        Self {
            friends,
            debouncer: Debouncer::new(delay),
            page_size,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Search after the debounce delay
    ///
    /// `Ok(None)` means a newer search replaced this one.
    pub async fn search(
        &self,
        query: &str,
        offset: usize,
    ) -> ServiceResult<Option<Vec<Profile>>> {
        self.search_page(query, self.page_size, offset).await
    }

    /// Like [`UserSearch::search`] with an explicit page size
    pub async fn search_page(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> ServiceResult<Option<Vec<Profile>>> {
        let params = SearchParams::new(query).page(limit, offset);

        match self
            .debouncer
            .run(|| self.friends.search_users(&params))
            .await
        {
            Some(result) => result.map(Some),
            None => {
                tracing::trace!(query = query, "Search superseded");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::tables;
    use crate::services::testing::signed_in;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_only_latest_call_runs() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(300)));

        let first = {
            let d = debouncer.clone();
            tokio::spawn(async move { d.run(|| async { "first" }).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = {
            let d = debouncer.clone();
            tokio::spawn(async move { d.run(|| async { "second" }).await })
        };

        assert_eq!(first.await.unwrap(), None);
        assert_eq!(second.await.unwrap(), Some("second"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_calls_both_run() {
        let debouncer = Debouncer::new(Duration::from_millis(300));
        assert_eq!(debouncer.run(|| async { 1 }).await, Some(1));
        assert_eq!(debouncer.run(|| async { 2 }).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_searches_makes_one_call() {
        let (backend, sessions, _) = signed_in("ann@example.com").await;
        backend.seed_row(
            tables::PROFILES,
            json!({
                "id": "u2",
                "username": "bobby",
                "is_online": true,
                "last_seen": "2024-06-01T10:00:00Z",
                "login_streak": 1
            }),
        );

        let search = Arc::new(UserSearch::new(
            FriendService::new(sessions),
            DEFAULT_DEBOUNCE,
            10,
        ));
        let before = backend.call_count();

        let mut handles = Vec::new();
        for query in ["b", "bo", "bob"] {
            let search = search.clone();
            handles.push(tokio::spawn(async move { search.search(query, 0).await }));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert!(results[0].is_none());
        assert!(results[1].is_none());
        let last = results[2].as_ref().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].username, "bobby");
        assert_eq!(backend.call_count() - before, 1);
    }
}
