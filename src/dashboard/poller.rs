//! Periodic refresh of the shared store.
//!
//! The poller runs one initial full load (repositories, jobs and stats in
//! parallel) and then refreshes jobs and stats on a fixed interval until it
//! is stopped. Each resource loads independently: a failure is logged and
//! left for the next tick, and never rolls back what the other loads applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::client::RemoteService;
use super::store::{ApplyOutcome, DashboardStore, Resource};

/// Default refresh cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Reload the repository list. Returns false if the request failed.
pub async fn load_repositories(service: &dyn RemoteService, store: &DashboardStore) -> bool {
    let ticket = store.issue(Resource::Repositories);
    match service.list_repositories().await {
        Ok(repositories) => {
            store.replace_repositories(ticket, repositories);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, transient = e.is_transient(), "Failed to load repositories");
            false
        }
    }
}

pub async fn load_jobs(service: &dyn RemoteService, store: &DashboardStore) -> bool {
    let ticket = store.issue(Resource::Jobs);
    match service.list_jobs().await {
        Ok(jobs) => {
            store.merge_jobs(ticket, jobs);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, transient = e.is_transient(), "Failed to load jobs");
            false
        }
    }
}

pub async fn load_stats(service: &dyn RemoteService, store: &DashboardStore) -> bool {
    let ticket = store.issue(Resource::Stats);
    match service.dashboard_stats().await {
        Ok(stats) => {
            store.apply_stats(ticket, stats);
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, transient = e.is_transient(), "Failed to load dashboard stats");
            false
        }
    }
}

/// Fetch one job and merge it. `Ok(None)`-style misses return false.
pub async fn load_job(service: &dyn RemoteService, store: &DashboardStore, job_id: &str) -> bool {
    let ticket = store.issue(Resource::Jobs);
    match service.get_job(job_id).await {
        Ok(Some(job)) => store.upsert_job(ticket, job) == ApplyOutcome::Applied,
        Ok(None) => {
            tracing::info!(job_id, "Job not found on backend");
            false
        }
        Err(e) => {
            tracing::warn!(job_id, error = %e, "Failed to load job");
            false
        }
    }
}

/// Result of one poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The previous tick had not settled yet.
    Skipped,
    Completed { jobs_ok: bool, stats_ok: bool },
    Disposed,
}

/// Result of the initial full load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub repositories_ok: bool,
    pub jobs_ok: bool,
    pub stats_ok: bool,
}

impl LoadReport {
    pub fn all_ok(&self) -> bool {
        self.repositories_ok && self.jobs_ok && self.stats_ok
    }
}

pub struct Poller {
    service: Arc<dyn RemoteService>,
    store: DashboardStore,
    interval: Duration,
    in_flight: AtomicBool,
}

impl Poller {
    pub fn new(service: Arc<dyn RemoteService>, store: DashboardStore, interval: Duration) -> Self {
        Self {
            service,
            store,
            interval,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Load repositories, jobs and stats in parallel. The loading flag is
    /// set for the duration and cleared however the loads settle.
    pub async fn initial_load(&self) -> LoadReport {
        self.store.set_loading(true);
        let service = self.service.as_ref();
        let (repositories_ok, jobs_ok, stats_ok) = tokio::join!(
            load_repositories(service, &self.store),
            load_jobs(service, &self.store),
            load_stats(service, &self.store),
        );
        self.store.set_loading(false);

        let report = LoadReport {
            repositories_ok,
            jobs_ok,
            stats_ok,
        };
        if report.all_ok() {
            tracing::info!("Initial dashboard load complete");
        } else {
            tracing::warn!(
                repositories_ok,
                jobs_ok,
                stats_ok,
                "Initial dashboard load incomplete; showing last known state"
            );
        }
        report
    }

    /// Refresh jobs and stats once, unless the previous tick is still running.
    pub async fn tick(&self) -> TickOutcome {
        if self.store.is_disposed() {
            return TickOutcome::Disposed;
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Previous poll tick still in flight; skipping");
            return TickOutcome::Skipped;
        }

        let service = self.service.as_ref();
        let (jobs_ok, stats_ok) =
            tokio::join!(load_jobs(service, &self.store), load_stats(service, &self.store));
        self.in_flight.store(false, Ordering::Release);

        tracing::debug!(jobs_ok, stats_ok, "Poll tick settled");
        TickOutcome::Completed { jobs_ok, stats_ok }
    }

    /// Run the initial load, then tick every interval until stopped.
    pub fn start(self: Arc<Self>) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let poller = self;
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = poller.initial_load() => {}
                _ = shutdown_rx.changed() => return,
            }

            let mut ticker = tokio::time::interval_at(Instant::now() + poller.interval, poller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Run ticks in their own task so a slow backend never
                        // delays shutdown; the in-flight flag prevents overlap.
                        let poller = Arc::clone(&poller);
                        tokio::spawn(async move {
                            if poller.tick().await == TickOutcome::Disposed {
                                tracing::debug!("Store disposed; poll tick ignored");
                            }
                        });
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::debug!("Poller stopped");
                            break;
                        }
                    }
                }
            }
        });
        PollerHandle { shutdown_tx, task }
    }
}

/// Cancels the repeating timer when stopped or dropped.
pub struct PollerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signal the timer loop and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.shutdown_tx.send(true);
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}
