//! Periodic refresh of hub state from the remote API.
//!
//! On start every resource kind is fetched once, then the stream alone is
//! re-fetched on a fixed interval until the [`SyncHandle`] is stopped or
//! dropped. Each resource kind has a single flight slot: a tick that finds
//! the slot taken (by another fetch or by an admin mutation) is skipped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::events::{EventSink, HubEvent};
use crate::models::ResourceKind;
use crate::remote::RemoteApi;
use crate::store::HubState;

/// Shortest stream refresh period accepted
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// What a single fetch did to local state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Local state was replaced with the response
    Applied,
    /// The response had no stream payload; the previous record stays
    KeptPrevious,
    /// Another fetch or mutation of the same kind was in flight
    Skipped,
    /// Transport failure, logged; local state untouched
    Failed,
}

#[derive(Default)]
struct Slots {
    stream: Mutex<()>,
    schedule: Mutex<()>,
    news: Mutex<()>,
}

impl Slots {
    fn get(&self, kind: ResourceKind) -> &Mutex<()> {
        match kind {
            ResourceKind::Stream => &self.stream,
            ResourceKind::Schedule => &self.schedule,
            ResourceKind::News => &self.news,
        }
    }
}

struct Shared {
    remote: Arc<dyn RemoteApi>,
    state: Arc<HubState>,
    events: EventSink,
    slots: Slots,
    interval: Duration,
}

/// Exclusive hold on one resource kind's flight slot
pub struct Flight<'a> {
    shared: &'a Shared,
    kind: ResourceKind,
    _guard: MutexGuard<'a, ()>,
}

impl Flight<'_> {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Fetch and apply this kind while still holding the slot
    pub async fn refresh(&self) -> RefreshOutcome {
        self.shared.fetch_and_apply(self.kind).await
    }
}

#[derive(Clone)]
pub struct SyncScheduler {
    shared: Arc<Shared>,
}

impl SyncScheduler {
    /// `interval` is raised to [`MIN_INTERVAL`] if shorter.
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        state: Arc<HubState>,
        events: EventSink,
        interval: Duration,
    ) -> Self {
        let interval = interval.max(MIN_INTERVAL);
        Self {
            shared: Arc::new(Shared {
                remote,
                state,
                events,
                slots: Slots::default(),
                interval,
            }),
        }
    }

    pub fn state(&self) -> &Arc<HubState> {
        &self.shared.state
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Spawn the refresh loop. Must be called inside a tokio runtime.
    pub fn start(&self) -> SyncHandle {
        let scheduler = self.clone();
        tracing::info!(
            backend = scheduler.shared.remote.backend_name(),
            interval_secs = scheduler.shared.interval.as_secs(),
            "Starting hub sync"
        );
        let task = tokio::spawn(async move { scheduler.run().await });
        SyncHandle { task: Some(task) }
    }

    async fn run(self) {
        let period = self.shared.interval;
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::join!(
            self.tick(ResourceKind::Stream),
            self.tick(ResourceKind::Schedule),
            self.tick(ResourceKind::News),
        );

        loop {
            interval.tick().await;
            self.tick(ResourceKind::Stream).await;
        }
    }

    /// Fetch `kind` unless a fetch or mutation of it is already in flight.
    pub async fn tick(&self, kind: ResourceKind) -> RefreshOutcome {
        match self.shared.slots.get(kind).try_lock() {
            Ok(_guard) => self.shared.fetch_and_apply(kind).await,
            Err(_) => {
                tracing::debug!(resource = %kind, "Refresh skipped, already in flight");
                RefreshOutcome::Skipped
            }
        }
    }

    /// Fetch `kind`, waiting for any in-flight fetch or mutation to finish first.
    pub async fn refresh(&self, kind: ResourceKind) -> RefreshOutcome {
        self.claim(kind).await.refresh().await
    }

    /// Take the flight slot for `kind`; ticks of that kind are skipped until it is dropped.
    pub async fn claim(&self, kind: ResourceKind) -> Flight<'_> {
        let guard = self.shared.slots.get(kind).lock().await;
        Flight {
            shared: &self.shared,
            kind,
            _guard: guard,
        }
    }
}

impl Shared {
    async fn fetch_and_apply(&self, kind: ResourceKind) -> RefreshOutcome {
        match kind {
            ResourceKind::Stream => match self.remote.fetch_stream().await {
                Ok(Some(record)) => {
                    if self.state.stream.get().as_ref() != Some(&record) {
                        tracing::info!(url = %record.url, live = record.is_live, "Stream replaced");
                    }
                    self.state.stream.replace(record);
                    self.events.send(HubEvent::StreamReplaced);
                    RefreshOutcome::Applied
                }
                Ok(None) => {
                    tracing::debug!("Stream response had no payload, keeping current record");
                    RefreshOutcome::KeptPrevious
                }
                Err(e) => self.failed(kind, e),
            },
            ResourceKind::Schedule => match self.remote.fetch_schedule().await {
                Ok(events) => {
                    let count = events.len();
                    self.state.schedule.replace(events);
                    self.events.send(HubEvent::ScheduleReplaced { count });
                    RefreshOutcome::Applied
                }
                Err(e) => self.failed(kind, e),
            },
            ResourceKind::News => match self.remote.fetch_news().await {
                Ok(posts) => {
                    let count = posts.len();
                    self.state.news.replace(posts);
                    self.events.send(HubEvent::NewsReplaced { count });
                    RefreshOutcome::Applied
                }
                Err(e) => self.failed(kind, e),
            },
        }
    }

    fn failed(&self, kind: ResourceKind, error: impl std::fmt::Display) -> RefreshOutcome {
        tracing::warn!(resource = %kind, "Failed to refresh: {}", error);
        RefreshOutcome::Failed
    }
}

/// Lifetime of the refresh loop. Dropping the handle stops the loop.
pub struct SyncHandle {
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the loop and wait until it can no longer touch hub state.
    pub async fn stop(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
            tracing::info!("Hub sync stopped");
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
