//! User-initiated mutations against the backend.
//!
//! Both actions report a plain `bool` to the caller. Failure detail is
//! logged here and goes no further.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::errors::DashboardError;

use super::client::RemoteService;
use super::models::ConnectRepositoryRequest;
use super::poller::{load_jobs, load_repositories, load_stats};
use super::status::{UNKNOWN_REPOSITORY, format_repo_name};
use super::store::DashboardStore;

/// Default delay between an accepted trigger and its reconciliation.
pub const DEFAULT_RECONCILE_DELAY: Duration = Duration::from_secs(1);

pub struct ActionCoordinator {
    service: Arc<dyn RemoteService>,
    store: DashboardStore,
    reconcile_delay: Duration,
    /// `Some(ttl)` inserts an optimistic pending job after a trigger.
    placeholder_ttl: Option<Duration>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl ActionCoordinator {
    pub fn new(
        service: Arc<dyn RemoteService>,
        store: DashboardStore,
        reconcile_delay: Duration,
        placeholder_ttl: Option<Duration>,
    ) -> Self {
        Self {
            service,
            store,
            reconcile_delay,
            placeholder_ttl,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Connect a repository and, once the backend confirms, reload the full
    /// repository list. Nothing is shown before confirmation. Without a
    /// name, one is derived from the URL.
    pub async fn connect_repository(&self, url: &str, name: Option<&str>, token: Option<&str>) -> bool {
        match self.try_connect(url, name, token).await {
            Ok(()) => true,
            Err(DashboardError::InvalidInput(reason)) => {
                tracing::warn!(%reason, "Connect request rejected locally");
                false
            }
            Err(e) => {
                tracing::error!(repo_url = %url, repo_name = ?name, error = %e, "Failed to connect repository");
                false
            }
        }
    }

    async fn try_connect(
        &self,
        url: &str,
        name: Option<&str>,
        token: Option<&str>,
    ) -> Result<(), DashboardError> {
        let request = validate_connect(url, name, token)?;
        if self.store.is_disposed() {
            return Err(DashboardError::StoreDisposed);
        }
        self.service.connect_repository(&request).await?;
        tracing::info!(repo_name = %request.repo_name, "Repository connected");

        if !load_repositories(self.service.as_ref(), &self.store).await {
            // The connection itself succeeded; the list catches up on reload.
            tracing::warn!("Repository connected but list reload failed");
        }
        Ok(())
    }

    /// Ask the backend to start a demo analysis. Returns once the request is
    /// accepted; jobs and stats are reloaded once after the reconcile delay.
    pub async fn trigger_demo_analysis(&self) -> bool {
        if let Err(e) = self.service.trigger_demo_analysis().await {
            tracing::error!(error = %e, "Failed to trigger demo analysis");
            return false;
        }
        tracing::info!(
            delay_ms = self.reconcile_delay.as_millis() as u64,
            "Demo analysis triggered; reconciliation scheduled"
        );

        if let Some(ttl) = self.placeholder_ttl
            && let Some(job) = self.store.add_placeholder(ttl)
        {
            tracing::debug!(job_id = %job.id, "Inserted placeholder job");
        }

        let service = Arc::clone(&self.service);
        let store = self.store.clone();
        let delay = self.reconcile_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if store.is_disposed() {
                return;
            }
            let (jobs_ok, stats_ok) =
                tokio::join!(load_jobs(service.as_ref(), &store), load_stats(service.as_ref(), &store));
            tracing::debug!(jobs_ok, stats_ok, "Post-trigger reconciliation settled");
        });
        self.track(handle);
        true
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Number of scheduled reconciliations that have not run yet.
    pub fn pending_reconciliations(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        pending.iter().filter(|h| !h.is_finished()).count()
    }

    /// Wait for every scheduled reconciliation to finish.
    pub async fn settle(&self) {
        let handles: Vec<_> = {
            let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
            pending.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await
                && !e.is_cancelled()
            {
                tracing::error!(error = %e, "Reconciliation task panicked");
            }
        }
    }

    /// Cancel reconciliations that have not fired yet.
    pub fn abort_pending(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(|p| p.into_inner());
        for handle in pending.drain(..) {
            handle.abort();
        }
    }
}

/// Reject blank input before anything is sent. A missing or blank name is
/// taken from the URL's last path segment.
pub fn validate_connect(
    url: &str,
    name: Option<&str>,
    token: Option<&str>,
) -> Result<ConnectRepositoryRequest, DashboardError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(DashboardError::InvalidInput("repository URL is required".into()));
    }
    let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format_repo_name(Some(url)),
    };
    if name == UNKNOWN_REPOSITORY {
        return Err(DashboardError::InvalidInput("repository name is required".into()));
    }
    Ok(ConnectRepositoryRequest {
        repo_url: url.to_string(),
        repo_name: name,
        access_token: token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    })
}
