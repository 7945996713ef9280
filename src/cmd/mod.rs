//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module    | Commands handled                       |
//! |-----------|----------------------------------------|
//! | `watch`   | `Watch`                                |
//! | `query`   | `Repos`, `Jobs`, `Job`, `Stats`        |
//! | `actions` | `Connect`, `Trigger`, `Chat`           |
//! | `serve`   | `Serve`                                |
//! | `config`  | `Config`                               |

pub mod actions;
pub mod config;
pub mod query;
pub mod serve;
pub mod watch;

pub use actions::{cmd_chat, cmd_connect, cmd_trigger};
pub use config::cmd_config;
pub use query::{cmd_job, cmd_jobs, cmd_repos, cmd_stats};
pub use serve::cmd_serve;
pub use watch::cmd_watch;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use devagent::config::DashboardConfig;
use devagent::dashboard::client::HttpService;
use devagent::dashboard::session::DashboardSession;

/// Install the global subscriber. With `log_dir`, logs go to a daily file
/// instead of stderr; keep the returned guard alive to flush it.
pub fn init_logging(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if let Some(dir) = log_dir {
        match std::fs::create_dir_all(dir) {
            Ok(()) => {
                let appender = tracing_appender::rolling::daily(dir, "devagent.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_ansi(false)
                    .try_init();
                return Some(guard);
            }
            Err(e) => {
                eprintln!(
                    "Failed to create log directory {}: {}; logging to stderr",
                    dir.display(),
                    e
                );
            }
        }
    }

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
    None
}

/// Build a session talking to the configured backend.
pub fn build_session(config: &DashboardConfig) -> Result<Arc<DashboardSession>> {
    let service = HttpService::new(&config.api_url, config.request_timeout())
        .with_context(|| format!("Failed to create API client for {}", config.api_url))?;
    Ok(Arc::new(DashboardSession::new(
        Arc::new(service),
        config.timings(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_logging_falls_back_to_stderr_when_dir_unusable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();

        let guard = init_logging(false, Some(&blocker.join("logs")));
        assert!(guard.is_none());
        assert!(tracing::dispatcher::has_been_set());
    }
}
