//! Derived statistics over the current job collection.
//!
//! Every function here is a pure function of its inputs and is recomputed
//! on each query; nothing caches a filtered view, since the collection can
//! change between renders.

use std::str::FromStr;

use serde::Serialize;

use super::models::{DashboardStats, Job, JobStatus};
use super::status::parse_timestamp;

/// `completed / total * 100`, or 0 for an empty collection.
pub fn success_rate(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed.min(total) as f64 / total as f64) * 100.0
}

/// Per-status tallies, as shown on the job filter tabs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub all: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub other: usize,
}

impl StatusCounts {
    pub fn tally(jobs: &[Job]) -> Self {
        let mut counts = Self {
            all: jobs.len(),
            ..Self::default()
        };
        for job in jobs {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Running => counts.running += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Other(_) => counts.other += 1,
            }
        }
        counts
    }

    /// Count matching `filter`, consistent with [`filter_jobs`].
    pub fn for_filter(&self, filter: &StatusFilter, jobs: &[Job]) -> usize {
        match filter {
            StatusFilter::All => self.all,
            StatusFilter::Status(JobStatus::Pending) => self.pending,
            StatusFilter::Status(JobStatus::Running) => self.running,
            StatusFilter::Status(JobStatus::Completed) => self.completed,
            StatusFilter::Status(JobStatus::Failed) => self.failed,
            StatusFilter::Status(other) => jobs.iter().filter(|j| &j.status == other).count(),
        }
    }
}

/// Compute the dashboard statistics from local state.
pub fn compute_stats(total_repositories: usize, jobs: &[Job]) -> DashboardStats {
    let counts = StatusCounts::tally(jobs);
    let total_jobs = counts.all as u64;
    let completed_jobs = counts.completed as u64;
    DashboardStats {
        total_repositories: total_repositories as u64,
        total_jobs,
        completed_jobs,
        failed_jobs: counts.failed as u64,
        success_rate: success_rate(completed_jobs, total_jobs),
    }
}

/// Job filter: `all`, or exactly one status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Status(JobStatus),
}

impl StatusFilter {
    pub fn matches(&self, job: &Job) -> bool {
        match self {
            Self::All => true,
            Self::Status(status) => &job.status == status,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Status(status) => status.as_str(),
        }
    }
}

impl std::fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "all" {
            Ok(Self::All)
        } else {
            Ok(Self::Status(JobStatus::from(s)))
        }
    }
}

pub fn filter_jobs<'a>(jobs: &'a [Job], filter: &StatusFilter) -> Vec<&'a Job> {
    jobs.iter().filter(|job| filter.matches(job)).collect()
}

pub fn running_jobs(jobs: &[Job]) -> Vec<&Job> {
    filter_jobs(jobs, &StatusFilter::Status(JobStatus::Running))
}

/// The `limit` newest jobs by `created_at`. Jobs without a parseable
/// timestamp sort last, keeping their collection order.
pub fn recent_jobs(jobs: &[Job], limit: usize) -> Vec<&Job> {
    let mut ordered: Vec<(usize, &Job)> = jobs.iter().enumerate().collect();
    ordered.sort_by(|(ia, a), (ib, b)| {
        let ta = a.created_at.as_deref().and_then(parse_timestamp);
        let tb = b.created_at.as_deref().and_then(parse_timestamp);
        match (ta, tb) {
            (Some(ta), Some(tb)) => tb.cmp(&ta).then(ia.cmp(ib)),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => ia.cmp(ib),
        }
    });
    ordered.into_iter().take(limit).map(|(_, job)| job).collect()
}
