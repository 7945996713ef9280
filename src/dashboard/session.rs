//! One dashboard session: the store plus everything that writes to it.
//!
//! This is the surface the CLI and the projection server consume. It exposes
//! current state through snapshots and the action/chat entry points, and
//! tears everything down in [`DashboardSession::shutdown`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;

use super::actions::{ActionCoordinator, DEFAULT_RECONCILE_DELAY};
use super::chat::{ChatSession, DEFAULT_REPLY_DELAY};
use super::client::RemoteService;
use super::models::{ChatMessage, HealthStatus};
use super::poller::{DEFAULT_POLL_INTERVAL, LoadReport, Poller, PollerHandle, load_job};
use super::store::{DashboardStore, StoreEvent, StoreSnapshot};

/// Timing knobs, normally taken from `DashboardConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub poll_interval: Duration,
    pub reconcile_delay: Duration,
    pub agent_reply_delay: Duration,
    /// `None` disables optimistic placeholder jobs.
    pub placeholder_ttl: Option<Duration>,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            reconcile_delay: DEFAULT_RECONCILE_DELAY,
            agent_reply_delay: DEFAULT_REPLY_DELAY,
            placeholder_ttl: None,
        }
    }
}

pub struct DashboardSession {
    service: Arc<dyn RemoteService>,
    store: DashboardStore,
    poller: Arc<Poller>,
    actions: ActionCoordinator,
    chat: ChatSession,
    poller_handle: Mutex<Option<PollerHandle>>,
}

impl DashboardSession {
    pub fn new(service: Arc<dyn RemoteService>, timings: SessionTimings) -> Self {
        let store = DashboardStore::new();
        let poller = Arc::new(Poller::new(
            Arc::clone(&service),
            store.clone(),
            timings.poll_interval,
        ));
        let actions = ActionCoordinator::new(
            Arc::clone(&service),
            store.clone(),
            timings.reconcile_delay,
            timings.placeholder_ttl,
        );
        let chat = ChatSession::new(store.clone(), timings.agent_reply_delay);
        Self {
            service,
            store,
            poller,
            actions,
            chat,
            poller_handle: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &DashboardStore {
        &self.store
    }

    /// Begin the initial load and the repeating refresh. Calling this on a
    /// running session does nothing.
    pub fn start(&self) {
        let mut handle = self.poller_handle.lock().unwrap_or_else(|p| p.into_inner());
        if handle.is_some() || self.store.is_disposed() {
            return;
        }
        tracing::info!(
            interval_ms = self.poller.interval().as_millis() as u64,
            "Starting dashboard polling"
        );
        *handle = Some(Arc::clone(&self.poller).start());
    }

    /// One full load without a timer, for one-shot commands.
    pub async fn load_once(&self) -> LoadReport {
        self.poller.initial_load().await
    }

    pub async fn refresh_job(&self, job_id: &str) -> bool {
        load_job(self.service.as_ref(), &self.store, job_id).await
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub async fn connect_repository(&self, url: &str, name: Option<&str>, token: Option<&str>) -> bool {
        self.actions.connect_repository(url, name, token).await
    }

    pub async fn trigger_demo_analysis(&self) -> bool {
        self.actions.trigger_demo_analysis().await
    }

    /// Wait for scheduled reconciliations and chat replies.
    pub async fn settle(&self) {
        self.actions.settle().await;
        self.chat.settle().await;
    }

    pub fn send_chat_message(&self, text: &str) -> Option<ChatMessage> {
        self.chat.send_message(text)
    }

    pub fn chat_messages(&self) -> Vec<ChatMessage> {
        self.chat.messages()
    }

    pub async fn health(&self) -> Option<HealthStatus> {
        match self.service.health().await {
            Ok(health) => Some(health),
            Err(e) => {
                tracing::warn!(error = %e, "Backend health check failed");
                None
            }
        }
    }

    /// Dispose the store, cancel the timer and drop scheduled work.
    /// In-flight requests may still finish; their results are discarded.
    pub async fn shutdown(&self) {
        self.store.dispose();
        let handle = self
            .poller_handle
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.stop().await;
        }
        self.actions.abort_pending();
        self.chat.abort_pending();
        tracing::info!("Dashboard session shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::fake::{FakeService, Op, job, repository};

    fn session(fake: &Arc<FakeService>) -> DashboardSession {
        DashboardSession::new(fake.clone(), SessionTimings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_lifecycle() {
        let fake = Arc::new(FakeService::new());
        fake.set_repositories(vec![repository("repo-1", "payments")]);
        fake.set_jobs(vec![job("a", "running")]);
        let session = session(&fake);

        session.start();
        session.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fake.calls(Op::ListRepositories), 1);
        assert_eq!(session.snapshot().jobs.len(), 1);

        fake.set_jobs(vec![job("a", "completed")]);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(session.snapshot().jobs[0].status.as_str(), "completed");

        session.shutdown().await;
        fake.set_jobs(Vec::new());
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(fake.calls(Op::ListJobs), 2);
        assert_eq!(session.snapshot().jobs.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_scheduled_work() {
        let fake = Arc::new(FakeService::new());
        fake.set_repositories(vec![repository("repo-1", "payments")]);
        let session = session(&fake);

        assert!(session.trigger_demo_analysis().await);
        assert!(session.send_chat_message("ping").is_some());
        session.shutdown().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fake.calls(Op::ListJobs), 0);
        assert_eq!(session.chat_messages().len(), 1);
        session.start();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fake.calls(Op::ListRepositories), 0);
    }

    #[tokio::test]
    async fn test_health_degrades_to_none() {
        let fake = Arc::new(FakeService::new());
        let session = session(&fake);
        assert_eq!(session.health().await.map(|h| h.status), Some("running".into()));
        fake.fail(Op::Health, 503);
        assert!(session.health().await.is_none());
    }
}
