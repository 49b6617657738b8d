//! In-process hub backend with the same contract as the HTTP endpoint.
//!
//! Checks the admin password like the server does, assigns ids and
//! publication timestamps, and can be told to go offline or answer slowly.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{RemoteApi, RemoteError, RemoteResult};
use crate::models::{
    NewNewsPost, NewScheduleEvent, NewsPost, ResourceKind, ScheduleEvent, StreamRecord, StreamUpdate,
};
use crate::session::Credential;

#[derive(Default)]
struct Inner {
    stream: Option<StreamRecord>,
    events: Vec<ScheduleEvent>,
    news: Vec<NewsPost>,
    next_id: i64,
    offline: bool,
    latency: Option<Duration>,
    failing_fetches: HashSet<ResourceKind>,
    fetches: HashMap<ResourceKind, usize>,
    writes: HashMap<ResourceKind, usize>,
}

pub struct MemoryRemote {
    admin_password: String,
    inner: Mutex<Inner>,
}

impl MemoryRemote {
    pub fn new(admin_password: impl Into<String>) -> Self {
        Self {
            admin_password: admin_password.into(),
            inner: Mutex::new(Inner {
                next_id: 1,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// While offline every call fails as unreachable
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// While set, reads of `kind` fail with status 500; other kinds and all writes are unaffected
    pub fn set_fetch_failing(&self, kind: ResourceKind, failing: bool) {
        let mut inner = self.lock();
        if failing {
            inner.failing_fetches.insert(kind);
        } else {
            inner.failing_fetches.remove(&kind);
        }
    }

    /// Delay applied before every call is answered
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    /// Server-side edit, bypassing authorization
    pub fn set_stream(&self, stream: Option<StreamRecord>) {
        self.lock().stream = stream;
    }

    /// Server-side edit, bypassing authorization
    pub fn push_event(&self, event: ScheduleEvent) {
        self.lock().events.push(event);
    }

    /// Server-side edit, bypassing authorization
    pub fn push_news(&self, post: NewsPost) {
        self.lock().news.push(post);
    }

    pub fn stream(&self) -> Option<StreamRecord> {
        self.lock().stream.clone()
    }

    pub fn events(&self) -> Vec<ScheduleEvent> {
        self.lock().events.clone()
    }

    pub fn news(&self) -> Vec<NewsPost> {
        self.lock().news.clone()
    }

    /// Number of reads answered for `kind`
    pub fn fetch_count(&self, kind: ResourceKind) -> usize {
        self.lock().fetches.get(&kind).copied().unwrap_or(0)
    }

    /// Number of writes received for `kind`, authorized or not
    pub fn write_count(&self, kind: ResourceKind) -> usize {
        self.lock().writes.get(&kind).copied().unwrap_or(0)
    }

    async fn enter(&self) -> RemoteResult<()> {
        let (offline, latency) = {
            let inner = self.lock();
            (inner.offline, inner.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if offline {
            return Err(RemoteError::Unreachable("memory backend is offline".to_string()));
        }
        Ok(())
    }

    async fn read(&self, kind: ResourceKind) -> RemoteResult<std::sync::MutexGuard<'_, Inner>> {
        self.enter().await?;
        let mut inner = self.lock();
        if inner.failing_fetches.contains(&kind) {
            return Err(RemoteError::Status(500));
        }
        *inner.fetches.entry(kind).or_default() += 1;
        Ok(inner)
    }

    async fn write(
        &self,
        kind: ResourceKind,
        credential: &Credential,
    ) -> RemoteResult<std::sync::MutexGuard<'_, Inner>> {
        self.enter().await?;
        let mut inner = self.lock();
        *inner.writes.entry(kind).or_default() += 1;
        if credential.expose() != self.admin_password {
            return Err(RemoteError::Unauthorized);
        }
        Ok(inner)
    }
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[async_trait]
impl RemoteApi for MemoryRemote {
    fn backend_name(&self) -> &str {
        "memory"
    }

    async fn fetch_stream(&self) -> RemoteResult<Option<StreamRecord>> {
        Ok(self.read(ResourceKind::Stream).await?.stream.clone())
    }

    async fn fetch_schedule(&self) -> RemoteResult<Vec<ScheduleEvent>> {
        Ok(self.read(ResourceKind::Schedule).await?.events.clone())
    }

    async fn fetch_news(&self) -> RemoteResult<Vec<NewsPost>> {
        Ok(self.read(ResourceKind::News).await?.news.clone())
    }

    async fn update_stream(
        &self,
        credential: &Credential,
        update: &StreamUpdate,
    ) -> RemoteResult<StreamRecord> {
        let mut inner = self.write(ResourceKind::Stream, credential).await?;
        let id = match &inner.stream {
            Some(existing) => existing.id,
            None => inner.allocate_id(),
        };
        let record = StreamRecord {
            id,
            title: update.title.clone(),
            url: update.url.clone(),
            is_live: update.is_live,
            sport: Some(update.sport.clone()).filter(|s| !s.is_empty()),
        };
        inner.stream = Some(record.clone());
        Ok(record)
    }

    async fn create_schedule_event(
        &self,
        credential: &Credential,
        event: &NewScheduleEvent,
    ) -> RemoteResult<()> {
        let mut inner = self.write(ResourceKind::Schedule, credential).await?;
        let id = inner.allocate_id();
        inner.events.push(ScheduleEvent {
            id,
            title: event.title.clone(),
            event_date: event.event_date.clone(),
            event_time: event.event_time.clone(),
            sport: event.sport.clone(),
            description: Some(event.description.clone()).filter(|d| !d.is_empty()),
        });
        Ok(())
    }

    async fn delete_schedule_event(&self, credential: &Credential, id: i64) -> RemoteResult<()> {
        let mut inner = self.write(ResourceKind::Schedule, credential).await?;
        inner.events.retain(|event| event.id != id);
        Ok(())
    }

    async fn create_news_post(&self, credential: &Credential, post: &NewNewsPost) -> RemoteResult<()> {
        let mut inner = self.write(ResourceKind::News, credential).await?;
        let id = inner.allocate_id();
        inner.news.push(NewsPost {
            id,
            title: post.title.clone(),
            content: post.content.clone(),
            image_url: post.image_url.clone(),
            published_at: Utc::now().to_rfc3339(),
        });
        Ok(())
    }

    async fn delete_news_post(&self, credential: &Credential, id: i64) -> RemoteResult<()> {
        let mut inner = self.write(ResourceKind::News, credential).await?;
        inner.news.retain(|post| post.id != id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(url: &str) -> StreamUpdate {
        StreamUpdate {
            url: url.to_string(),
            title: "Live".to_string(),
            sport: "Biathlon".to_string(),
            is_live: true,
        }
    }

    #[tokio::test]
    async fn test_wrong_password_is_unauthorized() {
        let remote = MemoryRemote::new("secret");
        let result = remote.update_stream(&Credential::new("nope"), &update("u")).await;
        assert!(matches!(result, Err(RemoteError::Unauthorized)));
        assert!(remote.stream().is_none());
        assert_eq!(remote.write_count(ResourceKind::Stream), 1);
    }

    #[tokio::test]
    async fn test_stream_update_keeps_id() {
        let remote = MemoryRemote::new("secret");
        let cred = Credential::new("secret");
        let first = remote.update_stream(&cred, &update("a")).await.unwrap();
        let second = remote.update_stream(&cred, &update("b")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(remote.fetch_stream().await.unwrap().unwrap().url, "b");
    }

    #[tokio::test]
    async fn test_news_gets_timestamp_and_unique_ids() {
        let remote = MemoryRemote::new("secret");
        let cred = Credential::new("secret");
        for title in ["one", "two"] {
            let post = NewNewsPost {
                title: title.to_string(),
                content: "body".to_string(),
                image_url: "img".to_string(),
            };
            remote.create_news_post(&cred, &post).await.unwrap();
        }

        let news = remote.fetch_news().await.unwrap();
        assert_eq!(news.len(), 2);
        assert_ne!(news[0].id, news[1].id);
        assert!(news[0].published().is_some());
    }

    #[tokio::test]
    async fn test_failing_fetch_is_limited_to_one_kind() {
        let remote = MemoryRemote::new("secret");
        remote.set_fetch_failing(ResourceKind::Stream, true);

        assert!(matches!(remote.fetch_stream().await, Err(RemoteError::Status(500))));
        assert!(remote.fetch_news().await.is_ok());
        assert!(remote
            .update_stream(&Credential::new("secret"), &update("u"))
            .await
            .is_ok());

        remote.set_fetch_failing(ResourceKind::Stream, false);
        assert_eq!(remote.fetch_stream().await.unwrap().unwrap().url, "u");
    }

    #[tokio::test]
    async fn test_offline_fails_reads_and_writes() {
        let remote = MemoryRemote::new("secret");
        remote.set_offline(true);
        assert!(matches!(remote.fetch_schedule().await, Err(RemoteError::Unreachable(_))));
        assert!(matches!(
            remote.delete_news_post(&Credential::new("secret"), 1).await,
            Err(RemoteError::Unreachable(_))
        ));
        assert_eq!(remote.fetch_count(ResourceKind::Schedule), 0);
    }
}
