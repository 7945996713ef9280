//! Deterministic in-memory backend for unit tests.
//!
//! Responses are captured when a call starts and returned after an optional
//! scripted delay, so tests can line up out-of-order arrivals under paused
//! tokio time.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ClientError;

use super::client::RemoteService;
use super::models::{ConnectRepositoryRequest, DashboardStats, HealthStatus, Job, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListRepositories,
    Connect,
    ListJobs,
    GetJob,
    Stats,
    Trigger,
    Health,
}

#[derive(Default)]
struct FakeState {
    repositories: Vec<Repository>,
    jobs: Vec<Job>,
    stats: DashboardStats,
    failing: HashMap<Op, u16>,
    delays: HashMap<Op, VecDeque<Duration>>,
    calls: HashMap<Op, usize>,
    connect_requests: Vec<ConnectRepositoryRequest>,
    /// Job created server-side by the next successful trigger.
    on_trigger: Option<Job>,
}

#[derive(Default)]
pub struct FakeService {
    state: Mutex<FakeState>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_repositories(&self, repositories: Vec<Repository>) {
        self.with_state(|s| s.repositories = repositories);
    }

    pub fn set_jobs(&self, jobs: Vec<Job>) {
        self.with_state(|s| s.jobs = jobs);
    }

    pub fn set_stats(&self, stats: DashboardStats) {
        self.with_state(|s| s.stats = stats);
    }

    /// Make every call to `op` fail with `status` until [`Self::recover`].
    pub fn fail(&self, op: Op, status: u16) {
        self.with_state(|s| {
            s.failing.insert(op, status);
        });
    }

    pub fn recover(&self, op: Op) {
        self.with_state(|s| {
            s.failing.remove(&op);
        });
    }

    /// Queue a delay for the next call to `op`.
    pub fn delay_next(&self, op: Op, delay: Duration) {
        self.with_state(|s| s.delays.entry(op).or_default().push_back(delay));
    }

    pub fn create_on_trigger(&self, job: Job) {
        self.with_state(|s| s.on_trigger = Some(job));
    }

    pub fn calls(&self, op: Op) -> usize {
        self.with_state(|s| s.calls.get(&op).copied().unwrap_or(0))
    }

    pub fn connect_requests(&self) -> Vec<ConnectRepositoryRequest> {
        self.with_state(|s| s.connect_requests.clone())
    }

    /// Record the call and return its scripted delay and failure.
    fn begin(&self, op: Op) -> (Option<Duration>, Option<u16>) {
        self.with_state(|s| {
            *s.calls.entry(op).or_default() += 1;
            let delay = s.delays.get_mut(&op).and_then(VecDeque::pop_front);
            (delay, s.failing.get(&op).copied())
        })
    }

    async fn finish<T>(
        &self,
        op: Op,
        path: &str,
        value: impl FnOnce(&mut FakeState) -> T,
    ) -> Result<T, ClientError> {
        let (delay, failure) = self.begin(op);
        let captured = match failure {
            Some(status) => Err(ClientError::Status {
                url: format!("fake://{}", path),
                status,
                body: "scripted failure".into(),
            }),
            None => Ok(self.with_state(value)),
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        captured
    }
}

#[async_trait]
impl RemoteService for FakeService {
    async fn list_repositories(&self) -> Result<Vec<Repository>, ClientError> {
        self.finish(Op::ListRepositories, "/repositories", |s| s.repositories.clone())
            .await
    }

    async fn connect_repository(
        &self,
        request: &ConnectRepositoryRequest,
    ) -> Result<(), ClientError> {
        let request = request.clone();
        self.finish(Op::Connect, "/repositories/connect", move |s| {
            s.repositories.push(Repository {
                id: format!("repo-{}", s.repositories.len() + 1),
                name: request.repo_name.clone(),
                url: Some(request.repo_url.clone()),
                connected_at: Some("2024-05-01T09:00:00".into()),
                status: Some("connected".into()),
                last_commit: None,
            });
            s.connect_requests.push(request);
        })
        .await
    }

    async fn list_jobs(&self) -> Result<Vec<Job>, ClientError> {
        self.finish(Op::ListJobs, "/jobs", |s| s.jobs.clone()).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<Job>, ClientError> {
        let job_id = job_id.to_string();
        self.finish(Op::GetJob, "/jobs/{id}", move |s| {
            s.jobs.iter().find(|j| j.id == job_id).cloned()
        })
        .await
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, ClientError> {
        self.finish(Op::Stats, "/dashboard/stats", |s| s.stats.clone())
            .await
    }

    async fn trigger_demo_analysis(&self) -> Result<(), ClientError> {
        self.finish(Op::Trigger, "/demo/trigger-commit", |s| {
            if let Some(job) = s.on_trigger.take() {
                s.jobs.push(job);
            }
        })
        .await
    }

    async fn health(&self) -> Result<HealthStatus, ClientError> {
        self.finish(Op::Health, "/", |_| HealthStatus {
            message: "fake".into(),
            status: "running".into(),
        })
        .await
    }
}

/// Parse a job fixture from JSON, panicking on malformed test input.
pub fn job(id: &str, status: &str) -> Job {
    let terminal = matches!(status, "completed" | "failed");
    serde_json::from_value(serde_json::json!({
        "id": id,
        "repository_id": "repo-1",
        "status": status,
        "created_at": "2024-05-01T10:00:00",
        "completed_at": if terminal { Some("2024-05-01T10:02:00") } else { None },
        "logs": ["Starting analysis"],
    }))
    .unwrap()
}

pub fn repository(id: &str, name: &str) -> Repository {
    Repository {
        id: id.into(),
        name: name.into(),
        url: Some(format!("https://github.com/acme/{}", name)),
        connected_at: Some("2024-05-01T09:00:00".into()),
        status: Some("connected".into()),
        last_commit: None,
    }
}
