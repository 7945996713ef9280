use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};

// ── Lenient decoding helpers ─────────────────────────────────────────

/// Treat an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decode a list element by element, dropping records that do not parse
/// instead of failing the whole list.
pub(crate) fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let mut items = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<T>(value) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(error = %e, "Dropping malformed record from backend list"),
        }
    }
    Ok(items)
}

// ── Repositories ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub connected_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_commit: Option<String>,
}

// ── Jobs ─────────────────────────────────────────────────────────────

/// Lifecycle state of an analysis job.
///
/// Values the dashboard does not recognise are kept verbatim in `Other`
/// so they can still be listed and described.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(raw) => raw,
        }
    }

    /// Completed and failed jobs carry a `completed_at` timestamp.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Other("unknown".to_string())
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Other(s),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for JobStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s.to_string()))
    }
}

/// One unit of automated analysis work tied to a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repository_id: String,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: JobStatus,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(
        default,
        deserialize_with = "lenient_vec",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub analysis: Vec<AnalysisLogEntry>,
    /// Locally synthesized stand-in awaiting its server record.
    #[serde(skip_deserializing, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder: bool,
}

impl Job {
    /// Enforce the `completed_at` iff terminal invariant on an incoming
    /// record. `previous` is the record currently held for the same id.
    pub fn normalize(mut self, previous: Option<&Job>, observed_at: DateTime<Utc>) -> Self {
        if !self.status.is_terminal() {
            self.completed_at = None;
        } else if self.completed_at.as_deref().is_none_or(str::is_empty) {
            self.completed_at = Some(
                previous
                    .and_then(|p| p.completed_at.clone())
                    .unwrap_or_else(|| observed_at.to_rfc3339()),
            );
        }
        if let Some(prev) = previous
            && prev.logs.len() > self.logs.len()
        {
            tracing::warn!(
                job_id = %self.id,
                held = prev.logs.len(),
                incoming = self.logs.len(),
                "Incoming job record has fewer log lines than held; keeping held logs"
            );
            self.logs = prev.logs.clone();
        }
        self
    }

    pub fn short_commit(&self) -> &str {
        match self.commit_hash.as_deref() {
            Some(hash) => hash.char_indices().nth(8).map_or(hash, |(i, _)| &hash[..i]),
            None => "-",
        }
    }
}

// ── Analysis phases ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    Detection,
    Testing,
    Optimization,
    Validation,
}

impl AnalysisPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detection => "detection",
            Self::Testing => "testing",
            Self::Optimization => "optimization",
            Self::Validation => "validation",
        }
    }

    /// Position in the detection → testing → optimization → validation order.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Detection => 0,
            Self::Testing => 1,
            Self::Optimization => 2,
            Self::Validation => 3,
        }
    }

    /// Phases whose outcome decides whether a pull request is opened.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Optimization | Self::Validation)
    }
}

impl std::fmt::Display for AnalysisPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "detection" => Ok(Self::Detection),
            "testing" => Ok(Self::Testing),
            "optimization" => Ok(Self::Optimization),
            "validation" => Ok(Self::Validation),
            _ => Err(format!("Invalid analysis phase: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseResult {
    Success,
    Failed,
    InProgress,
}

impl PhaseResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::InProgress => "in_progress",
        }
    }
}

impl std::fmt::Display for PhaseResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            "in_progress" => Ok(Self::InProgress),
            _ => Err(format!("Invalid phase result: {}", s)),
        }
    }
}

/// One step of a job's internal analysis progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisLogEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub phase: AnalysisPhase,
    pub result: PhaseResult,
    #[serde(default, deserialize_with = "null_as_default")]
    pub action: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// ── Stats ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_repositories: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_jobs: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_jobs: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed_jobs: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub success_rate: f64,
}

impl DashboardStats {
    /// Recompute `success_rate` from the counts when the reported value is
    /// not a percentage.
    pub fn sanitized(mut self) -> Self {
        if !self.success_rate.is_finite() || !(0.0..=100.0).contains(&self.success_rate) {
            tracing::warn!(
                reported = self.success_rate,
                "Backend reported an out-of-range success rate; recomputing"
            );
            self.success_rate =
                super::aggregate::success_rate(self.completed_jobs, self.total_jobs);
        }
        self
    }
}

// ── Chat ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatSender {
    User,
    Agent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Info,
    Question,
    Update,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub sender: ChatSender,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
}

// ── Wire envelopes ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ConnectRepositoryRequest {
    pub repo_url: String,
    pub repo_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RepositoryList {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub repositories: Vec<Repository>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobList {
    #[serde(default, deserialize_with = "lenient_vec")]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Default, Deserialize)]
pub struct JobEnvelope {
    #[serde(default)]
    pub job: Option<Job>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str, status: JobStatus) -> Job {
        Job {
            id: id.to_string(),
            repository_id: "repo-1".to_string(),
            commit_hash: Some("demo-1a2b3c4d5e".to_string()),
            status,
            created_at: Some("2024-05-01T10:00:00".to_string()),
            completed_at: None,
            logs: Vec::new(),
            error: None,
            result: None,
            analysis: Vec::new(),
            placeholder: false,
        }
    }

    #[test]
    fn test_job_status_keeps_unknown_values() {
        let status: JobStatus = serde_json::from_str("\"queued\"").unwrap();
        assert_eq!(status, JobStatus::Other("queued".to_string()));
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"queued\"");
        assert_eq!(
            serde_json::from_str::<JobStatus>("\"running\"").unwrap(),
            JobStatus::Running
        );
    }

    #[test]
    fn test_job_decodes_with_missing_and_null_fields() {
        let json = r#"{"id": "j1", "status": "running", "logs": null}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.id, "j1");
        assert!(job.logs.is_empty());
        assert!(job.repository_id.is_empty());
        assert!(!job.placeholder);
    }

    #[test]
    fn test_placeholder_flag_cannot_come_from_backend() {
        let json = r#"{"id": "j1", "status": "pending", "placeholder": true}"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert!(!job.placeholder);
    }

    #[test]
    fn test_job_list_drops_malformed_records() {
        let json = r#"{"jobs": [{"id": "a", "status": "running"}, {"status": "failed"}, 42]}"#;
        let list: JobList = serde_json::from_str(json).unwrap();
        assert_eq!(list.jobs.len(), 1);
        assert_eq!(list.jobs[0].id, "a");
    }

    #[test]
    fn test_missing_lists_default_to_empty() {
        let repos: RepositoryList = serde_json::from_str("{}").unwrap();
        assert!(repos.repositories.is_empty());
        let jobs: JobList = serde_json::from_str(r#"{"jobs": null}"#).unwrap();
        assert!(jobs.jobs.is_empty());
    }

    #[test]
    fn test_stats_default_missing_fields_to_zero() {
        let stats: DashboardStats = serde_json::from_str(r#"{"total_jobs": 4}"#).unwrap();
        assert_eq!(stats.total_jobs, 4);
        assert_eq!(stats.completed_jobs, 0);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn test_sanitized_recomputes_out_of_range_rate() {
        let stats = DashboardStats {
            total_jobs: 4,
            completed_jobs: 1,
            success_rate: 250.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(stats.success_rate, 25.0);
    }

    #[test]
    fn test_normalize_clears_completed_at_for_active_jobs() {
        let mut running = job("a", JobStatus::Running);
        running.completed_at = Some("2024-05-01T10:05:00".to_string());
        let normalized = running.normalize(None, Utc::now());
        assert!(normalized.completed_at.is_none());
    }

    #[test]
    fn test_normalize_fills_completed_at_for_terminal_jobs() {
        let observed = Utc::now();
        let normalized = job("a", JobStatus::Failed).normalize(None, observed);
        assert_eq!(normalized.completed_at, Some(observed.to_rfc3339()));

        let mut held = job("a", JobStatus::Completed);
        held.completed_at = Some("2024-05-01T10:05:00".to_string());
        let again = job("a", JobStatus::Completed).normalize(Some(&held), Utc::now());
        assert_eq!(again.completed_at.as_deref(), Some("2024-05-01T10:05:00"));
    }

    #[test]
    fn test_normalize_never_shrinks_logs() {
        let mut held = job("a", JobStatus::Running);
        held.logs = vec!["Cloning repository...".into(), "Running test suite...".into()];
        let mut incoming = job("a", JobStatus::Running);
        incoming.logs = vec!["Cloning repository...".into()];
        let normalized = incoming.normalize(Some(&held), Utc::now());
        assert_eq!(normalized.logs.len(), 2);
    }

    #[test]
    fn test_short_commit() {
        assert_eq!(job("a", JobStatus::Pending).short_commit(), "demo-1a2");
        let mut no_commit = job("b", JobStatus::Pending);
        no_commit.commit_hash = None;
        assert_eq!(no_commit.short_commit(), "-");
    }

    #[test]
    fn test_analysis_phase_roundtrip() {
        for s in &["detection", "testing", "optimization", "validation"] {
            let parsed: AnalysisPhase = s.parse().unwrap();
            assert_eq!(parsed.as_str(), *s);
        }
        assert!("deploy".parse::<AnalysisPhase>().is_err());
        assert_eq!(
            serde_json::from_str::<PhaseResult>("\"in_progress\"").unwrap(),
            PhaseResult::InProgress
        );
    }

    #[test]
    fn test_connect_request_omits_missing_token() {
        let req = ConnectRepositoryRequest {
            repo_url: "https://github.com/acme/api".into(),
            repo_name: "api".into(),
            access_token: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["repo_url"], "https://github.com/acme/api");
        assert!(json.get("access_token").is_none());
    }
}
