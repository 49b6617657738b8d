//! Admin mutations: validate, attach the credential, write, reconcile.
//!
//! A stream update is applied from the server's echo. Schedule and news
//! mutations are followed by a full re-fetch of the collection so local
//! state always matches the server. Every outcome emits one [`Notice`].

use std::sync::Arc;

use crate::config::DefaultsConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, HubEvent, Notice};
use crate::models::{NewNewsPost, NewScheduleEvent, ResourceKind, StreamRecord, StreamUpdate};
use crate::remote::{RemoteApi, RemoteError};
use crate::resolver::UrlResolver;
use crate::session::{Credential, Session};
use crate::sync::{RefreshOutcome, SyncScheduler};

/// Admin input for a stream change. Blank title or sport falls back to the configured defaults.
#[derive(Debug, Clone, Default)]
pub struct StreamForm {
    pub url: String,
    pub title: String,
    pub sport: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleForm {
    pub title: String,
    pub date: String,
    pub time: String,
    pub sport: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewsForm {
    pub title: String,
    pub content: String,
    pub image_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    UpdateStream,
    CreateEvent,
    DeleteEvent,
    CreateNews,
    DeleteNews,
}

impl Operation {
    fn success(&self) -> &'static str {
        match self {
            Operation::UpdateStream => "Stream updated",
            Operation::CreateEvent => "Event added",
            Operation::DeleteEvent => "Event deleted",
            Operation::CreateNews => "News post added",
            Operation::DeleteNews => "News post deleted",
        }
    }

    fn failure(&self) -> &'static str {
        match self {
            Operation::UpdateStream => "Could not update the stream",
            Operation::CreateEvent => "Could not add the event",
            Operation::DeleteEvent => "Could not delete the event",
            Operation::CreateNews => "Could not add the news post",
            Operation::DeleteNews => "Could not delete the news post",
        }
    }
}

fn trimmed(value: &str) -> &str {
    value.trim()
}

fn or_default(value: &str, default: &str) -> String {
    match value.trim() {
        "" => default.to_string(),
        v => v.to_string(),
    }
}

pub struct AdminGateway {
    remote: Arc<dyn RemoteApi>,
    session: Arc<Session>,
    scheduler: SyncScheduler,
    resolver: UrlResolver,
    defaults: DefaultsConfig,
    events: EventSink,
}

impl AdminGateway {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        session: Arc<Session>,
        scheduler: SyncScheduler,
        resolver: UrlResolver,
        defaults: DefaultsConfig,
        events: EventSink,
    ) -> Self {
        Self {
            remote,
            session,
            scheduler,
            resolver,
            defaults,
            events,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Resolve `form.url` into an embed URL and store it as the current stream.
    pub async fn update_stream(&self, form: &StreamForm) -> Result<StreamRecord> {
        let op = Operation::UpdateStream;
        let url = trimmed(&form.url);
        if url.is_empty() {
            return Err(self.invalid(Error::blank("url"), "Enter the stream URL"));
        }
        let credential = self.credential()?;

        let embed = self.resolver.resolve(url);
        tracing::info!(platform = %embed.platform, "Updating stream");
        let update = StreamUpdate {
            url: embed.url,
            title: or_default(&form.title, &self.defaults.stream_title),
            sport: or_default(&form.sport, &self.defaults.stream_sport),
            is_live: true,
        };

        let _flight = self.scheduler.claim(ResourceKind::Stream).await;
        match self.remote.update_stream(&credential, &update).await {
            Ok(record) => {
                self.scheduler.state().stream.replace(record.clone());
                self.events.send(HubEvent::StreamReplaced);
                self.succeeded(op);
                Ok(record)
            }
            Err(e) => Err(self.failed(op, e)),
        }
    }

    pub async fn create_schedule_event(&self, form: &ScheduleForm) -> Result<()> {
        let required = [
            ("title", &form.title),
            ("event_date", &form.date),
            ("event_time", &form.time),
            ("sport", &form.sport),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(self.invalid(Error::blank(*field), "Fill in all fields"));
        }
        let credential = self.credential()?;

        let event = NewScheduleEvent {
            title: trimmed(&form.title).to_string(),
            event_date: trimmed(&form.date).to_string(),
            event_time: trimmed(&form.time).to_string(),
            sport: trimmed(&form.sport).to_string(),
            description: trimmed(&form.description).to_string(),
        };

        let flight = self.scheduler.claim(ResourceKind::Schedule).await;
        match self.remote.create_schedule_event(&credential, &event).await {
            Ok(()) => {
                let outcome = flight.refresh().await;
                self.reconciled(Operation::CreateEvent, outcome);
                Ok(())
            }
            Err(e) => Err(self.failed(Operation::CreateEvent, e)),
        }
    }

    pub async fn delete_schedule_event(&self, id: i64) -> Result<()> {
        let credential = self.credential()?;

        let flight = self.scheduler.claim(ResourceKind::Schedule).await;
        match self.remote.delete_schedule_event(&credential, id).await {
            Ok(()) => {
                let outcome = flight.refresh().await;
                self.reconciled(Operation::DeleteEvent, outcome);
                Ok(())
            }
            Err(e) => Err(self.failed(Operation::DeleteEvent, e)),
        }
    }

    pub async fn create_news_post(&self, form: &NewsForm) -> Result<()> {
        for (field, value) in [("title", &form.title), ("content", &form.content)] {
            if value.trim().is_empty() {
                return Err(self.invalid(
                    Error::blank(field),
                    "Fill in the title and text of the news post",
                ));
            }
        }
        let credential = self.credential()?;

        let post = NewNewsPost {
            title: trimmed(&form.title).to_string(),
            content: trimmed(&form.content).to_string(),
            image_url: or_default(&form.image_url, &self.defaults.news_image_url),
        };

        let flight = self.scheduler.claim(ResourceKind::News).await;
        match self.remote.create_news_post(&credential, &post).await {
            Ok(()) => {
                let outcome = flight.refresh().await;
                self.reconciled(Operation::CreateNews, outcome);
                Ok(())
            }
            Err(e) => Err(self.failed(Operation::CreateNews, e)),
        }
    }

    pub async fn delete_news_post(&self, id: i64) -> Result<()> {
        let credential = self.credential()?;

        let flight = self.scheduler.claim(ResourceKind::News).await;
        match self.remote.delete_news_post(&credential, id).await {
            Ok(()) => {
                let outcome = flight.refresh().await;
                self.reconciled(Operation::DeleteNews, outcome);
                Ok(())
            }
            Err(e) => Err(self.failed(Operation::DeleteNews, e)),
        }
    }

    fn credential(&self) -> Result<Credential> {
        self.session.credential().ok_or_else(|| {
            self.events
                .notice(Notice::error("Log in to the admin panel first"));
            Error::Authorization("not logged in".to_string())
        })
    }

    fn invalid(&self, error: Error, message: &str) -> Error {
        self.events.notice(Notice::error(message));
        error
    }

    fn succeeded(&self, op: Operation) {
        tracing::info!("{}", op.success());
        self.events.notice(Notice::success(op.success()));
    }

    /// Report a successful write whose collection re-fetch may have failed.
    fn reconciled(&self, op: Operation, outcome: RefreshOutcome) {
        if outcome == RefreshOutcome::Failed {
            tracing::warn!("{}, but the list could not be reloaded", op.success());
            self.events
                .notice(Notice::success(format!("{} (list not refreshed)", op.success())));
        } else {
            self.succeeded(op);
        }
    }

    fn failed(&self, op: Operation, error: RemoteError) -> Error {
        if matches!(error, RemoteError::Unauthorized) {
            self.session.invalidate();
            self.events.notice(Notice::error("Invalid password"));
        } else {
            tracing::warn!("{}: {}", op.failure(), error);
            self.events.notice(Notice::error(op.failure()));
        }
        error.into()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::events::NoticeLevel;
    use crate::models::ScheduleEvent;
    use crate::remote::MemoryRemote;
    use crate::store::HubState;
    use tokio::sync::mpsc::UnboundedReceiver;

    const PASSWORD: &str = "secret";

    struct Fixture {
        remote: Arc<MemoryRemote>,
        scheduler: SyncScheduler,
        gateway: AdminGateway,
        rx: UnboundedReceiver<HubEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            let remote = Arc::new(MemoryRemote::new(PASSWORD));
            let (events, rx) = EventSink::channel();
            let session = Arc::new(Session::new(None, events.clone()));
            session.login(PASSWORD).unwrap();
            let scheduler = SyncScheduler::new(
                remote.clone(),
                HubState::shared(),
                events.clone(),
                Duration::from_secs(30),
            );
            let gateway = AdminGateway::new(
                remote.clone(),
                session,
                scheduler.clone(),
                UrlResolver::new("example.com"),
                DefaultsConfig::default(),
                events,
            );
            let mut fixture = Self {
                remote,
                scheduler,
                gateway,
                rx,
            };
            fixture.notices();
            fixture
        }

        fn notices(&mut self) -> Vec<Notice> {
            let mut notices = Vec::new();
            while let Ok(event) = self.rx.try_recv() {
                if let HubEvent::Notice(notice) = event {
                    notices.push(notice);
                }
            }
            notices
        }

        fn last_notice(&mut self) -> Notice {
            self.notices().pop().expect("expected a notice")
        }
    }

    fn stream_form(url: &str) -> StreamForm {
        StreamForm {
            url: url.to_string(),
            ..StreamForm::default()
        }
    }

    fn schedule_form(title: &str) -> ScheduleForm {
        ScheduleForm {
            title: title.to_string(),
            date: "2026-01-10".to_string(),
            time: "14:30".to_string(),
            sport: "Biathlon".to_string(),
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn test_update_stream_resolves_and_applies_server_echo() {
        let mut fx = Fixture::new();
        let form = StreamForm {
            url: "  https://www.twitch.tv/somechannel  ".to_string(),
            title: "Sprint 10 km".to_string(),
            sport: "Biathlon".to_string(),
        };

        let record = fx.gateway.update_stream(&form).await.unwrap();
        assert_eq!(
            record.url,
            "https://player.twitch.tv/?channel=somechannel&parent=example.com&autoplay=true&muted=false"
        );
        assert!(record.is_live);
        assert_eq!(fx.scheduler.state().stream.get(), Some(record.clone()));
        assert_eq!(fx.remote.stream(), Some(record));
        assert_eq!(fx.last_notice(), Notice::success("Stream updated"));
    }

    #[tokio::test]
    async fn test_update_stream_applies_defaults() {
        let fx = Fixture::new();
        let record = fx
            .gateway
            .update_stream(&StreamForm {
                url: "https://youtu.be/abc".to_string(),
                title: "  ".to_string(),
                sport: String::new(),
            })
            .await
            .unwrap();
        assert_eq!(record.title, "Live Broadcast");
        assert_eq!(record.sport.as_deref(), Some("Biathlon"));
        assert!(record.url.contains("youtube-nocookie.com/embed/abc"));
    }

    #[tokio::test]
    async fn test_blank_url_never_reaches_remote() {
        let mut fx = Fixture::new();
        let err = fx.gateway.update_stream(&stream_form("   ")).await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "url", .. }));
        assert_eq!(fx.remote.write_count(ResourceKind::Stream), 0);
        assert_eq!(fx.last_notice().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_schedule_validation_names_first_blank_field() {
        let fx = Fixture::new();
        let mut form = schedule_form("Relay");
        form.time = String::new();
        form.sport = String::new();

        let err = fx.gateway.create_schedule_event(&form).await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "event_time", .. }));
        assert_eq!(fx.remote.write_count(ResourceKind::Schedule), 0);
    }

    #[tokio::test]
    async fn test_news_validation() {
        let fx = Fixture::new();
        let form = NewsForm {
            title: "Title".to_string(),
            content: " ".to_string(),
            image_url: String::new(),
        };
        let err = fx.gateway.create_news_post(&form).await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "content", .. }));
        assert_eq!(fx.remote.write_count(ResourceKind::News), 0);
    }

    #[tokio::test]
    async fn test_rejected_credential_logs_out_and_blocks_next_mutation() {
        let mut fx = Fixture::new();
        fx.gateway.session().login("wrong").unwrap();
        fx.notices();

        let err = fx
            .gateway
            .update_stream(&stream_form("https://kick.com/x"))
            .await
            .unwrap_err();
        assert!(err.is_authorization());
        assert!(!fx.gateway.session().is_authenticated());
        assert_eq!(fx.last_notice(), Notice::error("Invalid password"));
        assert!(fx.scheduler.state().stream.get().is_none());

        let writes = fx.remote.write_count(ResourceKind::News);
        let err = fx.gateway.delete_news_post(1).await.unwrap_err();
        assert!(err.is_authorization());
        assert_eq!(fx.remote.write_count(ResourceKind::News), writes);

        fx.gateway.session().login(PASSWORD).unwrap();
        fx.gateway.delete_news_post(1).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_state_emits_session_change() {
        let mut fx = Fixture::new();
        fx.gateway.session().login("wrong").unwrap();
        while fx.rx.try_recv().is_ok() {}

        let _ = fx.gateway.delete_schedule_event(1).await;
        let mut saw_logout = false;
        while let Ok(event) = fx.rx.try_recv() {
            if event == (HubEvent::SessionChanged { authenticated: false }) {
                saw_logout = true;
            }
        }
        assert!(saw_logout);
    }

    #[tokio::test]
    async fn test_create_event_refetches_full_collection() {
        let fx = Fixture::new();
        // Added on the server by someone else; must show up after our write.
        fx.remote.push_event(ScheduleEvent {
            id: 100,
            title: "Elsewhere".to_string(),
            event_date: "2026-01-09".to_string(),
            event_time: "10:00".to_string(),
            sport: "Ski".to_string(),
            description: None,
        });

        fx.gateway.create_schedule_event(&schedule_form("Relay")).await.unwrap();

        let local = fx.scheduler.state().schedule.get();
        assert_eq!(local, fx.remote.events());
        assert_eq!(local.len(), 2);
        assert!(local.iter().any(|e| e.title == "Relay" && e.description.is_none()));
    }

    #[tokio::test]
    async fn test_delete_event_refetches_full_collection() {
        let fx = Fixture::new();
        fx.gateway.create_schedule_event(&schedule_form("One")).await.unwrap();
        fx.gateway.create_schedule_event(&schedule_form("Two")).await.unwrap();
        let id = fx.scheduler.state().schedule.get()[0].id;

        fx.gateway.delete_schedule_event(id).await.unwrap();

        let local = fx.scheduler.state().schedule.get();
        assert_eq!(local, fx.remote.events());
        assert!(local.iter().all(|e| e.id != id));
    }

    #[tokio::test]
    async fn test_news_create_uses_placeholder_image_and_delete() {
        let mut fx = Fixture::new();
        let form = NewsForm {
            title: "Season opener".to_string(),
            content: "Tickets are on sale".to_string(),
            image_url: String::new(),
        };
        fx.gateway.create_news_post(&form).await.unwrap();
        assert_eq!(fx.last_notice(), Notice::success("News post added"));

        let local = fx.scheduler.state().news.get();
        assert_eq!(local, fx.remote.news());
        assert_eq!(local[0].image_url, DefaultsConfig::default().news_image_url);

        fx.gateway.delete_news_post(local[0].id).await.unwrap();
        assert!(fx.scheduler.state().news.is_empty());
        assert_eq!(fx.last_notice(), Notice::success("News post deleted"));
    }

    #[tokio::test]
    async fn test_failed_refetch_is_reported_with_the_success() {
        let mut fx = Fixture::new();
        fx.remote.set_fetch_failing(ResourceKind::Schedule, true);

        fx.gateway.create_schedule_event(&schedule_form("Relay")).await.unwrap();

        assert_eq!(fx.remote.events().len(), 1);
        assert!(fx.scheduler.state().schedule.is_empty());
        let notices = fx.notices();
        assert_eq!(
            notices,
            vec![Notice::success("Event added (list not refreshed)")]
        );
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_session_and_state() {
        let mut fx = Fixture::new();
        fx.gateway.update_stream(&stream_form("https://kick.com/a")).await.unwrap();
        fx.remote.set_offline(true);

        let err = fx
            .gateway
            .update_stream(&stream_form("https://kick.com/b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(fx.gateway.session().is_authenticated());
        assert!(fx.scheduler.state().stream.get().unwrap().url.contains("/a?"));
        assert_eq!(fx.last_notice(), Notice::error("Could not update the stream"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_tick_is_suppressed_during_update() {
        let fx = Fixture::new();
        fx.remote.set_latency(Some(Duration::from_secs(2)));
        let form = stream_form("https://kick.com/live");

        let (update, tick) = tokio::join!(
            fx.gateway.update_stream(&form),
            fx.scheduler.tick(ResourceKind::Stream)
        );
        assert!(update.is_ok());
        assert_eq!(tick, RefreshOutcome::Skipped);
        assert_eq!(fx.remote.fetch_count(ResourceKind::Stream), 0);
    }
}
