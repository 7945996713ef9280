//! Job status descriptors, display formatters and the analysis-phase
//! state machine.
//!
//! Everything here is pure: no I/O, no clocks except the `now` the caller
//! passes in. Nothing in this module rejects input; data it cannot
//! classify degrades to a generic descriptor or a placeholder string.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use super::models::{AnalysisLogEntry, AnalysisPhase, Job, JobStatus, PhaseResult};

/// Shown wherever a timestamp is missing.
pub const MISSING_TIMESTAMP: &str = "N/A";

/// Shown for a repository whose URL is missing.
pub const UNKNOWN_REPOSITORY: &str = "Unknown Repository";

/// How a job status is presented to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDescriptor {
    pub label: String,
    pub color_class: &'static str,
    pub background_class: &'static str,
}

/// Describe a job status. Unknown statuses get the gray descriptor
/// labelled with their raw value.
pub fn describe_status(status: &JobStatus) -> StatusDescriptor {
    let (label, color_class, background_class) = match status {
        JobStatus::Pending => ("Pending", "text-yellow-400", "bg-yellow-400/10"),
        JobStatus::Running => ("Running", "text-blue-400", "bg-blue-400/10"),
        JobStatus::Completed => ("Completed", "text-accent-green", "bg-accent-green/10"),
        JobStatus::Failed => ("Failed", "text-red-400", "bg-red-400/10"),
        JobStatus::Other(raw) => {
            let label = if raw.trim().is_empty() { "unknown" } else { raw.as_str() };
            return StatusDescriptor {
                label: label.to_string(),
                color_class: "text-gray-400",
                background_class: "bg-gray-400/10",
            };
        }
    };
    StatusDescriptor {
        label: label.to_string(),
        color_class,
        background_class,
    }
}

/// Human-readable duration.
///
/// - missing, zero, negative or non-finite: `"0s"`
/// - under a minute: `"12.3s"`
/// - under an hour: `"4m 5s"`
/// - otherwise: `"2h 15m"`
pub fn format_duration(seconds: Option<f64>) -> String {
    let secs = match seconds {
        Some(s) if s.is_finite() && s > 0.0 => s,
        _ => return "0s".to_string(),
    };
    if secs < 60.0 {
        return format!("{:.1}s", secs);
    }
    let whole = secs.floor() as u64;
    if whole < 3600 {
        return format!("{}m {}s", whole / 60, whole % 60);
    }
    format!("{}h {}m", whole / 3600, (whole % 3600) / 60)
}

/// Parse a backend timestamp. Accepts RFC 3339 and the naive ISO form the
/// backend emits (`2024-05-01T10:00:00.123456`), which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// Display form of an optional timestamp. Unparseable values are shown as
/// received.
pub fn format_timestamp(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        None | Some("") => MISSING_TIMESTAMP.to_string(),
        Some(value) => match parse_timestamp(value) {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => value.to_string(),
        },
    }
}

/// Seconds a job has taken: until `completed_at` for finished jobs, until
/// `now` for jobs still in flight.
pub fn job_duration_secs(job: &Job, now: DateTime<Utc>) -> Option<f64> {
    let started = parse_timestamp(job.created_at.as_deref()?)?;
    let finished = match job.completed_at.as_deref() {
        Some(raw) => parse_timestamp(raw)?,
        None if job.status.is_terminal() => return None,
        None => now,
    };
    let millis = (finished - started).num_milliseconds();
    Some((millis.max(0) as f64) / 1000.0)
}

/// Repository display name from its URL: the last path segment without a
/// `.git` suffix.
pub fn format_repo_name(url: Option<&str>) -> String {
    let url = match url.map(str::trim) {
        None | Some("") => return UNKNOWN_REPOSITORY.to_string(),
        Some(u) => u.trim_end_matches('/'),
    };
    let last = url.rsplit('/').next().unwrap_or(url);
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        UNKNOWN_REPOSITORY.to_string()
    } else {
        name.to_string()
    }
}

/// Cut `text` to `max_chars` characters, appending `...` when shortened.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ── Analysis phase state machine ─────────────────────────────────────

/// Where a job stands in detection → testing → optimization/validation →
/// pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AnalysisState {
    NotStarted,
    InProgress { phase: AnalysisPhase },
    /// The latest phase succeeded but was not a terminal one.
    Advancing { completed: AnalysisPhase },
    Halted { phase: AnalysisPhase },
    /// A terminal phase succeeded; a pull request follows downstream.
    ReadyForPullRequest { phase: AnalysisPhase },
}

impl AnalysisState {
    pub fn pull_request_expected(&self) -> bool {
        matches!(self, Self::ReadyForPullRequest { .. })
    }

    pub fn label(&self) -> String {
        match self {
            Self::NotStarted => "not started".to_string(),
            Self::InProgress { phase } => format!("{} in progress", phase),
            Self::Advancing { completed } => format!("{} done", completed),
            Self::Halted { phase } => format!("halted in {}", phase),
            Self::ReadyForPullRequest { .. } => "pull request".to_string(),
        }
    }
}

/// State of a job's analysis log, plus whether the entries ran backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AnalysisProgress {
    #[serde(flatten)]
    pub state: AnalysisState,
    pub out_of_order: bool,
}

impl AnalysisProgress {
    /// Evaluate entries in occurrence order. The latest entry determines the
    /// state; a phase earlier than one already seen marks the log as out of
    /// order but is still taken as the latest step.
    pub fn evaluate(entries: &[AnalysisLogEntry]) -> Self {
        let mut highest: Option<u8> = None;
        let mut out_of_order = false;
        for entry in entries {
            let rank = entry.phase.rank();
            if highest.is_some_and(|h| rank < h) {
                out_of_order = true;
            }
            highest = Some(highest.map_or(rank, |h| h.max(rank)));
        }

        let state = match entries.last() {
            None => AnalysisState::NotStarted,
            Some(last) => match last.result {
                PhaseResult::InProgress => AnalysisState::InProgress { phase: last.phase },
                PhaseResult::Failed => AnalysisState::Halted { phase: last.phase },
                PhaseResult::Success if last.phase.is_terminal() => {
                    AnalysisState::ReadyForPullRequest { phase: last.phase }
                }
                PhaseResult::Success => AnalysisState::Advancing {
                    completed: last.phase,
                },
            },
        };

        Self {
            state,
            out_of_order,
        }
    }

    pub fn for_job(job: &Job) -> Self {
        Self::evaluate(&job.analysis)
    }
}

// ── Result payload summary ───────────────────────────────────────────

/// Counts pulled out of a completed job's `result` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub pull_requests: usize,
    pub tests_total: usize,
    pub tests_failed: usize,
}

impl ResultSummary {
    const PR_KEYS: [&'static str; 3] = ["pull_requests", "optimization_prs", "roadmap_prs"];

    /// Summarize a result payload, looking one level deep for nested phase
    /// results. Fields of the wrong type count as zero.
    pub fn from_result(result: Option<&serde_json::Value>) -> Self {
        let mut summary = Self::default();
        let Some(serde_json::Value::Object(map)) = result else {
            return summary;
        };
        let nested = map.values().filter_map(|v| v.as_object());
        for obj in std::iter::once(map).chain(nested) {
            for key in Self::PR_KEYS {
                summary.pull_requests += obj.get(key).and_then(|v| v.as_array()).map_or(0, Vec::len);
            }
            summary.tests_total += obj.get("test_results").and_then(|v| v.as_array()).map_or(0, Vec::len);
            summary.tests_failed += obj
                .get("failed_tests")
                .and_then(|v| v.as_u64())
                .map_or(0, |n| n as usize);
        }
        summary
    }
}
