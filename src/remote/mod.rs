//! The remote hub API, seen from the client.
//!
//! - [`HttpRemote`]: the real resource-selector HTTP endpoint
//! - [`MemoryRemote`]: in-process stand-in with the same contract (offline use, tests)
//!
//! The scheduler and admin gateway hold an `Arc<dyn RemoteApi>` and never
//! know which one they talk to.

pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{NewNewsPost, NewScheduleEvent, NewsPost, ScheduleEvent, StreamRecord, StreamUpdate};
use crate::session::Credential;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

#[derive(Error, Debug)]
pub enum RemoteError {
    /// The attached credential was missing or wrong (HTTP 401)
    #[error("credential rejected")]
    Unauthorized,

    #[error("server returned status {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("response carried no {0} payload")]
    MissingPayload(&'static str),

    #[error("hub unreachable: {0}")]
    Unreachable(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Resource-oriented hub API: read everything anonymously, write with a credential.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Human-readable backend name (e.g., "http", "memory").
    fn backend_name(&self) -> &str;

    // ── Reads ────────────────────────────────────────────────────────

    /// Current stream; `None` when the response carries no stream payload.
    async fn fetch_stream(&self) -> RemoteResult<Option<StreamRecord>>;

    async fn fetch_schedule(&self) -> RemoteResult<Vec<ScheduleEvent>>;

    async fn fetch_news(&self) -> RemoteResult<Vec<NewsPost>>;

    // ── Writes ───────────────────────────────────────────────────────

    /// Store a new stream and return the record as the server stored it.
    async fn update_stream(
        &self,
        credential: &Credential,
        update: &StreamUpdate,
    ) -> RemoteResult<StreamRecord>;

    async fn create_schedule_event(
        &self,
        credential: &Credential,
        event: &NewScheduleEvent,
    ) -> RemoteResult<()>;

    async fn delete_schedule_event(&self, credential: &Credential, id: i64) -> RemoteResult<()>;

    async fn create_news_post(&self, credential: &Credential, post: &NewNewsPost) -> RemoteResult<()>;

    async fn delete_news_post(&self, credential: &Credential, id: i64) -> RemoteResult<()>;
}
