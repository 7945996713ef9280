//! Read-only projections of a store snapshot.
//!
//! Projections borrow nothing from the store: they are built from a
//! [`StoreSnapshot`] and serialized as-is by the projection server or
//! rendered by the terminal UI.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregate::{
    StatusCounts, StatusFilter, compute_stats, filter_jobs, recent_jobs, running_jobs,
};
use super::models::{AnalysisLogEntry, DashboardStats, Job, Repository};
use super::status::{
    AnalysisProgress, ResultSummary, StatusDescriptor, describe_status, format_duration,
    format_repo_name, format_timestamp, job_duration_secs, truncate_text,
};
use super::store::StoreSnapshot;

pub const DEFAULT_RECENT_JOBS: usize = 5;

pub const HINT_CONNECT_REPOSITORY: &str = "Connect a repository to get started";
pub const HINT_TRIGGER_DEMO: &str = "Trigger a demo to see the agent in action";

/// One row in a job list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobCard {
    pub id: String,
    pub repository: String,
    pub commit: String,
    pub status: StatusDescriptor,
    pub created: String,
    pub duration: String,
    pub placeholder: bool,
    pub last_log: Option<String>,
}

impl JobCard {
    pub fn new(job: &Job, repositories: &[Repository], now: DateTime<Utc>) -> Self {
        Self {
            id: job.id.clone(),
            repository: repository_label(&job.repository_id, repositories),
            commit: job.short_commit().to_string(),
            status: describe_status(&job.status),
            created: format_timestamp(job.created_at.as_deref()),
            duration: format_duration(job_duration_secs(job, now)),
            placeholder: job.placeholder,
            last_log: job.logs.last().map(|line| truncate_text(line, 80)),
        }
    }
}

fn repository_label(repository_id: &str, repositories: &[Repository]) -> String {
    match repositories.iter().find(|r| r.id == repository_id) {
        Some(repo) if !repo.name.trim().is_empty() => repo.name.clone(),
        Some(repo) => format_repo_name(repo.url.as_deref()),
        None if repository_id.is_empty() => format_repo_name(None),
        None => repository_id.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryRow {
    pub id: String,
    pub name: String,
    pub url: String,
    pub status: String,
    pub connected: String,
    pub last_commit: String,
}

impl From<&Repository> for RepositoryRow {
    fn from(repo: &Repository) -> Self {
        let name = if repo.name.trim().is_empty() {
            format_repo_name(repo.url.as_deref())
        } else {
            repo.name.clone()
        };
        Self {
            id: repo.id.clone(),
            name,
            url: repo.url.clone().unwrap_or_default(),
            status: repo.status.clone().unwrap_or_else(|| "connected".to_string()),
            connected: format_timestamp(repo.connected_at.as_deref()),
            last_commit: repo
                .last_commit
                .as_deref()
                .map(|c| truncate_text(c, 8))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

/// The overview page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub loading: bool,
    /// As reported by the backend, or `local_stats` until the first stats
    /// response arrives.
    pub stats: DashboardStats,
    /// Computed from the server jobs held locally.
    pub local_stats: DashboardStats,
    /// Computed from the jobs held locally.
    pub counts: StatusCounts,
    pub running_count: usize,
    pub repositories: Vec<RepositoryRow>,
    pub recent_jobs: Vec<JobCard>,
    pub running_jobs: Vec<JobCard>,
    pub can_trigger: bool,
    pub empty_hint: Option<&'static str>,
}

impl DashboardView {
    pub fn project(snapshot: &StoreSnapshot, recent_limit: usize, now: DateTime<Utc>) -> Self {
        let jobs = &snapshot.jobs;
        let repos = &snapshot.repositories;
        let counts = StatusCounts::tally(jobs);
        let running: Vec<JobCard> = running_jobs(jobs)
            .into_iter()
            .map(|job| JobCard::new(job, repos, now))
            .collect();

        let empty_hint = if !jobs.is_empty() {
            None
        } else if repos.is_empty() {
            Some(HINT_CONNECT_REPOSITORY)
        } else {
            Some(HINT_TRIGGER_DEMO)
        };

        let server_jobs: Vec<Job> = jobs.iter().filter(|j| !j.placeholder).cloned().collect();
        let local_stats = compute_stats(repos.len(), &server_jobs);
        let stats = if snapshot.stats_loaded {
            snapshot.stats.clone()
        } else {
            local_stats.clone()
        };

        Self {
            loading: snapshot.loading,
            stats,
            local_stats,
            counts,
            running_count: running.len(),
            repositories: repos.iter().map(RepositoryRow::from).collect(),
            recent_jobs: recent_jobs(jobs, recent_limit)
                .into_iter()
                .map(|job| JobCard::new(job, repos, now))
                .collect(),
            running_jobs: running,
            can_trigger: !repos.is_empty(),
            empty_hint,
        }
    }
}

/// A filter tab with its count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterTab {
    pub filter: String,
    pub count: usize,
    pub active: bool,
}

/// The jobs page: filter tabs plus the filtered list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobsView {
    pub filter: String,
    pub tabs: Vec<FilterTab>,
    pub jobs: Vec<JobCard>,
}

impl JobsView {
    pub fn project(snapshot: &StoreSnapshot, filter: &StatusFilter, now: DateTime<Utc>) -> Self {
        let jobs = &snapshot.jobs;
        let counts = StatusCounts::tally(jobs);
        let tabs = ["all", "pending", "running", "completed", "failed"]
            .into_iter()
            .map(|raw| {
                let tab = raw.parse::<StatusFilter>().unwrap_or_default();
                FilterTab {
                    filter: raw.to_string(),
                    count: counts.for_filter(&tab, jobs),
                    active: &tab == filter,
                }
            })
            .collect();
        Self {
            filter: filter.to_string(),
            tabs,
            jobs: filter_jobs(jobs, filter)
                .into_iter()
                .map(|job| JobCard::new(job, &snapshot.repositories, now))
                .collect(),
        }
    }
}

/// Everything shown for a single job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDetail {
    pub card: JobCard,
    pub completed: String,
    pub logs: Vec<String>,
    pub error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub summary: ResultSummary,
    pub analysis: Vec<AnalysisLogEntry>,
    pub progress: AnalysisProgress,
}

impl JobDetail {
    pub fn project(snapshot: &StoreSnapshot, job_id: &str, now: DateTime<Utc>) -> Option<Self> {
        let job = snapshot.jobs.iter().find(|j| j.id == job_id)?;
        Some(Self {
            card: JobCard::new(job, &snapshot.repositories, now),
            completed: format_timestamp(job.completed_at.as_deref()),
            logs: job.logs.clone(),
            error: job.error.clone(),
            result: job.result.clone(),
            summary: ResultSummary::from_result(job.result.as_ref()),
            analysis: job.analysis.clone(),
            progress: AnalysisProgress::for_job(job),
        })
    }
}
