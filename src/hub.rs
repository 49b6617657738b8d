use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::admin::AdminGateway;
use crate::config::Config;
use crate::events::{EventSink, HubEvent};
use crate::remote::{HttpRemote, RemoteApi};
use crate::resolver::UrlResolver;
use crate::session::{CredentialFile, Session};
use crate::store::HubState;
use crate::sync::{SyncHandle, SyncScheduler};

/// Everything a client of the hub needs, wired to one remote and one event channel.
pub struct Hub {
    state: Arc<HubState>,
    session: Arc<Session>,
    scheduler: SyncScheduler,
    admin: AdminGateway,
    resolver: UrlResolver,
}

impl Hub {
    pub fn new(
        config: &Config,
        remote: Arc<dyn RemoteApi>,
        session: Arc<Session>,
        events: EventSink,
    ) -> Self {
        let state = HubState::shared();
        let resolver = UrlResolver::new(config.embed.resolved_host());
        let scheduler = SyncScheduler::new(
            remote.clone(),
            state.clone(),
            events.clone(),
            config.sync.stream_interval(),
        );
        let admin = AdminGateway::new(
            remote,
            session.clone(),
            scheduler.clone(),
            resolver.clone(),
            config.defaults.clone(),
            events,
        );

        Self {
            state,
            session,
            scheduler,
            admin,
            resolver,
        }
    }

    /// Connect to the configured HTTP endpoint and restore any saved admin session.
    pub fn connect(config: &Config) -> anyhow::Result<(Self, UnboundedReceiver<HubEvent>)> {
        let remote = Arc::new(HttpRemote::new(&config.api)?);
        let (events, rx) = EventSink::channel();

        let file = match CredentialFile::default_location() {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!("Admin session will not be persisted: {:#}", e);
                None
            }
        };
        let session = Arc::new(Session::new(file, events.clone()));
        session.restore();

        tracing::info!(base_url = remote.base_url(), "Connected to hub");
        Ok((Self::new(config, remote, session, events), rx))
    }

    pub fn state(&self) -> &Arc<HubState> {
        &self.state
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    pub fn admin(&self) -> &AdminGateway {
        &self.admin
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    /// Start periodic sync. Dropping the handle stops it.
    pub fn start_sync(&self) -> SyncHandle {
        self.scheduler.start()
    }
}
