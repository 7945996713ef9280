//! Shared dashboard store.
//!
//! The store is the single owner of repository, job, stats and chat state
//! for a session. Writers (poller, action coordinator, chat) replace whole
//! entities keyed by id; nobody mutates individual fields in place.
//!
//! Every fetch takes a [`Ticket`] from the store *before* issuing its
//! request. A response is applied only if its ticket is newer than the one
//! that produced the data currently held, so a slow response can never
//! overwrite data from a request issued after it. Once the store is
//! disposed every apply is discarded.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;

use super::models::{ChatMessage, DashboardStats, Job, JobStatus, Repository};

/// A separately fetched slice of backend state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Repositories,
    Jobs,
    Stats,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Repositories => "repositories",
            Self::Jobs => "jobs",
            Self::Stats => "stats",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Repositories => 0,
            Self::Jobs => 1,
            Self::Stats => 2,
        }
    }
}

/// Issuance-order stamp for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    resource: Resource,
    seq: u64,
}

impl Ticket {
    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// What happened to a response handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A response to a later request has already been applied.
    Stale,
    Disposed,
}

/// Change notifications for read-only consumers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreEvent {
    RepositoriesReplaced { count: usize },
    JobsMerged { count: usize, placeholders: usize },
    StatsUpdated { stats: DashboardStats },
    LoadingChanged { loading: bool },
    PlaceholderAdded { job_id: String },
    ChatAppended { message: ChatMessage },
    Disposed,
}

/// Read-only copy of the store handed to projections.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreSnapshot {
    pub repositories: Vec<Repository>,
    /// Server jobs followed by any live placeholders.
    pub jobs: Vec<Job>,
    pub stats: DashboardStats,
    pub chat: Vec<ChatMessage>,
    pub loading: bool,
    /// True once a stats response has been applied.
    pub stats_loaded: bool,
}

/// An optimistic job awaiting its server record.
#[derive(Debug, Clone)]
struct Placeholder {
    job: Job,
    /// Job ids the store held when the placeholder was created; the first
    /// server job outside this set claims the placeholder.
    known_ids: HashSet<String>,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, Default)]
struct Sequencer {
    issued: u64,
    applied: u64,
}

#[derive(Debug)]
struct StoreState {
    repositories: Vec<Repository>,
    jobs: Vec<Job>,
    placeholders: Vec<Placeholder>,
    stats: DashboardStats,
    chat: Vec<ChatMessage>,
    loading: bool,
    disposed: bool,
    sequencers: [Sequencer; 3],
    /// Ticket of the last single-record fetch applied per job id.
    job_seqs: HashMap<String, u64>,
}

impl StoreState {
    fn new() -> Self {
        Self {
            repositories: Vec::new(),
            jobs: Vec::new(),
            placeholders: Vec::new(),
            stats: DashboardStats::default(),
            chat: Vec::new(),
            loading: false,
            disposed: false,
            sequencers: [Sequencer::default(); 3],
            job_seqs: HashMap::new(),
        }
    }

    /// Accept `ticket` as the newest applied response, or report why not.
    fn admit(&mut self, ticket: Ticket) -> ApplyOutcome {
        if self.disposed {
            return ApplyOutcome::Disposed;
        }
        let seq = &mut self.sequencers[ticket.resource.index()];
        if ticket.seq <= seq.applied {
            return ApplyOutcome::Stale;
        }
        seq.applied = ticket.seq;
        ApplyOutcome::Applied
    }

    fn prune_placeholders(&mut self, now: Instant) {
        self.placeholders.retain(|p| {
            let live = p.expires_at > now;
            if !live {
                tracing::debug!(job_id = %p.job.id, "Dropping expired placeholder job");
            }
            live
        });
    }

    fn visible_jobs(&self, now: Instant) -> Vec<Job> {
        self.jobs
            .iter()
            .cloned()
            .chain(
                self.placeholders
                    .iter()
                    .filter(|p| p.expires_at > now)
                    .map(|p| p.job.clone()),
            )
            .collect()
    }
}

/// Cloneable handle to the shared store.
#[derive(Clone)]
pub struct DashboardStore {
    inner: Arc<Mutex<StoreState>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardStore {
    pub fn new() -> Self {
        let (events, _rx) = broadcast::channel(256);
        Self {
            inner: Arc::new(Mutex::new(StoreState::new())),
            events,
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // A panicked writer cannot leave a half-applied entity behind since
        // every write is a whole-value assignment.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn emit(&self, event: StoreEvent) {
        let _ = self.events.send(event); // no subscribers is fine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Stamp a request for `resource`. Call before sending it.
    pub fn issue(&self, resource: Resource) -> Ticket {
        let mut state = self.lock();
        let seq = &mut state.sequencers[resource.index()];
        seq.issued += 1;
        Ticket {
            resource,
            seq: seq.issued,
        }
    }

    pub fn replace_repositories(&self, ticket: Ticket, repositories: Vec<Repository>) -> ApplyOutcome {
        debug_assert_eq!(ticket.resource, Resource::Repositories);
        let count = repositories.len();
        let outcome = {
            let mut state = self.lock();
            let outcome = state.admit(ticket);
            if outcome == ApplyOutcome::Applied {
                state.repositories = repositories;
            }
            outcome
        };
        self.log_outcome(ticket, outcome);
        if outcome == ApplyOutcome::Applied {
            self.emit(StoreEvent::RepositoriesReplaced { count });
        }
        outcome
    }

    /// Merge a full job listing from the server.
    ///
    /// The listing becomes the authoritative job collection: records replace
    /// held records with the same id wholesale, and held jobs missing from
    /// the listing are dropped. Placeholders survive until a new server job
    /// claims them or they expire.
    pub fn merge_jobs(&self, ticket: Ticket, incoming: Vec<Job>) -> ApplyOutcome {
        debug_assert_eq!(ticket.resource, Resource::Jobs);
        let now = Instant::now();
        let observed_at = Utc::now();
        let mut merged_counts = None;
        let outcome = {
            let mut state = self.lock();
            let outcome = state.admit(ticket);
            if outcome == ApplyOutcome::Applied {
                let mut merged: Vec<Job> = Vec::with_capacity(incoming.len());
                for job in incoming {
                    let previous = state.jobs.iter().find(|held| held.id == job.id);
                    let job = job.normalize(previous, observed_at);
                    match merged.iter_mut().find(|m| m.id == job.id) {
                        Some(slot) => *slot = job,
                        None => merged.push(job),
                    }
                }

                // Records fetched singly after this listing was issued win.
                let newer: Vec<Job> = state
                    .jobs
                    .iter()
                    .filter(|held| state.job_seqs.get(&held.id).is_some_and(|&seq| seq > ticket.seq))
                    .cloned()
                    .collect();
                for held in newer {
                    tracing::debug!(job_id = %held.id, "Keeping newer single-job record over listing");
                    match merged.iter_mut().find(|m| m.id == held.id) {
                        Some(slot) => *slot = held,
                        None => merged.push(held),
                    }
                }
                state.job_seqs.retain(|_, seq| *seq > ticket.seq);

                state.prune_placeholders(now);
                let mut claimed: HashSet<String> = HashSet::new();
                state.placeholders.retain(|placeholder| {
                    let claim = merged.iter().find(|job| {
                        !placeholder.known_ids.contains(&job.id)
                            && !claimed.contains(&job.id)
                            && (placeholder.job.repository_id.is_empty()
                                || placeholder.job.repository_id == job.repository_id)
                    });
                    match claim {
                        Some(job) => {
                            tracing::debug!(
                                placeholder = %placeholder.job.id,
                                job_id = %job.id,
                                "Placeholder job reconciled with server record"
                            );
                            claimed.insert(job.id.clone());
                            false
                        }
                        None => true,
                    }
                });

                state.jobs = merged;
                merged_counts = Some((state.jobs.len(), state.placeholders.len()));
            }
            outcome
        };
        self.log_outcome(ticket, outcome);
        if let Some((count, placeholders)) = merged_counts {
            self.emit(StoreEvent::JobsMerged {
                count,
                placeholders,
            });
        }
        outcome
    }

    /// Replace a single job with a freshly fetched record.
    pub fn upsert_job(&self, ticket: Ticket, job: Job) -> ApplyOutcome {
        debug_assert_eq!(ticket.resource, Resource::Jobs);
        let observed_at = Utc::now();
        let mut counts = None;
        let outcome = {
            let mut state = self.lock();
            // Single-record fetches do not advance the listing's ticket; a
            // listing issued later still wins. One issued earlier keeps this
            // record through `job_seqs`.
            let held_seq = state.job_seqs.get(&job.id).copied().unwrap_or(0);
            let outcome = if state.disposed {
                ApplyOutcome::Disposed
            } else if ticket.seq < state.sequencers[Resource::Jobs.index()].applied
                || ticket.seq < held_seq
            {
                ApplyOutcome::Stale
            } else {
                ApplyOutcome::Applied
            };
            if outcome == ApplyOutcome::Applied {
                state.job_seqs.insert(job.id.clone(), ticket.seq);
                let index = state.jobs.iter().position(|held| held.id == job.id);
                let previous = index.map(|i| &state.jobs[i]);
                let job = job.normalize(previous, observed_at);
                match index {
                    Some(i) => state.jobs[i] = job,
                    None => state.jobs.push(job),
                }
                counts = Some((state.jobs.len(), state.placeholders.len()));
            }
            outcome
        };
        self.log_outcome(ticket, outcome);
        if let Some((count, placeholders)) = counts {
            self.emit(StoreEvent::JobsMerged {
                count,
                placeholders,
            });
        }
        outcome
    }

    pub fn apply_stats(&self, ticket: Ticket, stats: DashboardStats) -> ApplyOutcome {
        debug_assert_eq!(ticket.resource, Resource::Stats);
        let stats = stats.sanitized();
        let outcome = {
            let mut state = self.lock();
            let outcome = state.admit(ticket);
            if outcome == ApplyOutcome::Applied {
                state.stats = stats.clone();
            }
            outcome
        };
        self.log_outcome(ticket, outcome);
        if outcome == ApplyOutcome::Applied {
            self.emit(StoreEvent::StatsUpdated { stats });
        }
        outcome
    }

    /// Insert an optimistic pending job for a trigger the server accepted.
    pub fn add_placeholder(&self, ttl: Duration) -> Option<Job> {
        let now = Instant::now();
        let job = {
            let mut state = self.lock();
            if state.disposed {
                return None;
            }
            state.prune_placeholders(now);
            let job = Job {
                id: format!("pending-{}", uuid::Uuid::new_v4()),
                repository_id: state
                    .repositories
                    .first()
                    .map(|r| r.id.clone())
                    .unwrap_or_default(),
                commit_hash: None,
                status: JobStatus::Pending,
                created_at: Some(Utc::now().to_rfc3339()),
                completed_at: None,
                logs: Vec::new(),
                error: None,
                result: None,
                analysis: Vec::new(),
                placeholder: true,
            };
            let known_ids = state.jobs.iter().map(|j| j.id.clone()).collect();
            state.placeholders.push(Placeholder {
                job: job.clone(),
                known_ids,
                expires_at: now + ttl,
            });
            job
        };
        self.emit(StoreEvent::PlaceholderAdded {
            job_id: job.id.clone(),
        });
        Some(job)
    }

    pub fn set_loading(&self, loading: bool) {
        {
            let mut state = self.lock();
            if state.disposed || state.loading == loading {
                return;
            }
            state.loading = loading;
        }
        self.emit(StoreEvent::LoadingChanged { loading });
    }

    /// Append a chat message. Returns false once the store is disposed.
    pub fn append_chat(&self, message: ChatMessage) -> bool {
        {
            let mut state = self.lock();
            if state.disposed {
                return false;
            }
            state.chat.push(message.clone());
        }
        self.emit(StoreEvent::ChatAppended { message });
        true
    }

    /// Tear the store down. Later applies are discarded.
    pub fn dispose(&self) {
        {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.loading = false;
        }
        tracing::debug!("Dashboard store disposed");
        self.emit(StoreEvent::Disposed);
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    pub fn is_loading(&self) -> bool {
        self.lock().loading
    }

    pub fn repositories(&self) -> Vec<Repository> {
        self.lock().repositories.clone()
    }

    /// Server jobs followed by live placeholders.
    pub fn jobs(&self) -> Vec<Job> {
        self.lock().visible_jobs(Instant::now())
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.lock().jobs.iter().map(|j| j.id.clone()).collect()
    }

    pub fn stats(&self) -> DashboardStats {
        self.lock().stats.clone()
    }

    pub fn chat(&self) -> Vec<ChatMessage> {
        self.lock().chat.clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            repositories: state.repositories.clone(),
            jobs: state.visible_jobs(Instant::now()),
            stats: state.stats.clone(),
            chat: state.chat.clone(),
            loading: state.loading,
            stats_loaded: state.sequencers[Resource::Stats.index()].applied > 0,
        }
    }

    fn log_outcome(&self, ticket: Ticket, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Applied => {
                tracing::trace!(resource = ticket.resource.as_str(), seq = ticket.seq, "Applied response")
            }
            ApplyOutcome::Stale => tracing::debug!(
                resource = ticket.resource.as_str(),
                seq = ticket.seq,
                "Discarding stale response; a later request already applied"
            ),
            ApplyOutcome::Disposed => tracing::debug!(
                resource = ticket.resource.as_str(),
                seq = ticket.seq,
                "Discarding response for disposed store"
            ),
        }
    }
}
