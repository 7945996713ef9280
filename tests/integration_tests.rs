//! Integration tests for the devagent CLI
//!
//! These tests run the binary against a missing backend and against a stub
//! backend served from a background thread.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a devagent Command isolated from the caller's env
fn devagent(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("devagent");
    cmd.current_dir(dir.path())
        .env_remove("DEVAGENT_API_URL")
        .env_remove("DEVAGENT_POLL_INTERVAL_MS")
        .env_remove("RUST_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// A local URL nothing listens on.
fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

/// Serve a stub agent backend from a background thread; returns its URL.
fn spawn_stub_backend() -> String {
    use axum::{
        Json, Router,
        http::StatusCode,
        routing::{get, post},
    };
    use serde_json::json;

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let router = Router::new()
                .route(
                    "/",
                    get(|| async { Json(json!({"message": "Autonomous Developer Agent API", "status": "running"})) }),
                )
                .route(
                    "/repositories",
                    get(|| async {
                        Json(json!({"repositories": [{
                            "id": "repo-1",
                            "name": "payments",
                            "url": "https://github.com/acme/payments",
                            "connected_at": "2024-05-01T09:00:00",
                            "status": "connected"
                        }]}))
                    }),
                )
                .route(
                    "/repositories/connect",
                    post(|| async { (StatusCode::BAD_REQUEST, Json(json!({"detail": "Invalid repository URL"}))) }),
                )
                .route(
                    "/jobs",
                    get(|| async {
                        Json(json!({"jobs": [
                            {"id": "job-a", "repository_id": "repo-1", "status": "running",
                             "created_at": "2024-05-01T10:00:00", "logs": ["Cloning repository"]},
                            {"id": "job-b", "repository_id": "repo-1", "status": "completed",
                             "created_at": "2024-05-01T10:01:00", "completed_at": "2024-05-01T10:03:00",
                             "logs": ["Cloning repository", "All tests passed"],
                             "result": {"pull_requests": [{"number": 7}]}},
                            {"id": "job-c", "repository_id": "repo-1", "status": "failed",
                             "created_at": "2024-05-01T10:02:00", "completed_at": "2024-05-01T10:04:00",
                             "error": "Tests failed"}
                        ]}))
                    }),
                )
                .route(
                    "/dashboard/stats",
                    get(|| async {
                        Json(json!({"total_repositories": 1, "total_jobs": 3, "completed_jobs": 1,
                                    "failed_jobs": 1, "success_rate": 33.33}))
                    }),
                )
                .route(
                    "/demo/trigger-commit",
                    post(|| async { Json(json!({"message": "Demo commit triggered"})) }),
                );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(format!("http://{}", listener.local_addr().unwrap())).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });
    rx.recv().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_devagent_help() {
        let dir = create_temp_project();
        devagent(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("watch"))
            .stdout(predicate::str::contains("trigger"));
    }

    #[test]
    fn test_devagent_version() {
        let dir = create_temp_project();
        devagent(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let dir = create_temp_project();
        devagent(&dir).arg("frobnicate").assert().failure();
    }
}

// =============================================================================
// Configuration
// =============================================================================

mod config_command {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();
        devagent(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No devagent.toml found"))
            .stdout(predicate::str::contains("http://localhost:8000"));
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = create_temp_project();
        devagent(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created devagent.toml"));

        let content = fs::read_to_string(dir.path().join(".devagent/devagent.toml")).unwrap();
        assert!(content.contains("poll_interval_ms = 5000"));

        devagent(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".devagent")).unwrap();
        fs::write(
            dir.path().join(".devagent/devagent.toml"),
            "api_url = \"localhost:8000\"\npoll_interval_ms = 0\n",
        )
        .unwrap();

        devagent(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("api_url"));
    }

    #[test]
    fn test_env_and_cli_override_file() {
        let dir = create_temp_project();
        devagent(&dir)
            .env("DEVAGENT_API_URL", "http://from-env:1")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("http://from-env:1"));

        devagent(&dir)
            .env("DEVAGENT_API_URL", "http://from-env:1")
            .args(["--api-url", "http://from-cli:2", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("http://from-cli:2"));
    }

    #[test]
    fn test_malformed_config_fails() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".devagent")).unwrap();
        fs::write(dir.path().join(".devagent/devagent.toml"), "poll_interval_ms = \"soon\"").unwrap();

        devagent(&dir)
            .arg("stats")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to load configuration"));
    }
}

// =============================================================================
// Degraded backend
// =============================================================================

mod unreachable_backend {
    use super::*;

    #[test]
    fn test_stats_degrades_to_last_known_state() {
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &unreachable_url(), "stats"])
            .assert()
            .success()
            .stdout(predicate::str::contains("unreachable"))
            .stdout(predicate::str::contains("Jobs: 0"));
    }

    #[test]
    fn test_jobs_lists_nothing() {
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &unreachable_url(), "jobs"])
            .assert()
            .success()
            .stdout(predicate::str::contains("all (0)"));
    }

    #[test]
    fn test_trigger_failure_exits_nonzero() {
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &unreachable_url(), "trigger"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to trigger demo analysis"));
    }

    #[test]
    fn test_connect_blank_url_fails_without_request() {
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &unreachable_url(), "connect", " ", "--name", "x"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to connect repository"));
    }

    #[test]
    fn test_connect_without_derivable_name_fails() {
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &unreachable_url(), "connect", "https://github.com/acme/.git"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to connect repository"));
    }
}

// =============================================================================
// Stub backend
// =============================================================================

mod stub_backend {
    use super::*;

    #[test]
    fn test_repos_lists_connected_repositories() {
        let url = spawn_stub_backend();
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &url, "repos"])
            .assert()
            .success()
            .stdout(predicate::str::contains("payments"));
    }

    #[test]
    fn test_jobs_filter() {
        let url = spawn_stub_backend();
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &url, "jobs", "--status", "failed"])
            .assert()
            .success()
            .stdout(predicate::str::contains("job-c"))
            .stdout(predicate::str::contains("job-a").not())
            .stdout(predicate::str::contains("failed (1)"));
    }

    #[test]
    fn test_stats_reports_backend_numbers() {
        let url = spawn_stub_backend();
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &url, "stats"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Jobs: 3"))
            .stdout(predicate::str::contains("33.3%"))
            .stdout(predicate::str::contains("running 1"));
    }

    #[test]
    fn test_job_detail() {
        let url = spawn_stub_backend();
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &url, "job", "job-b"])
            .assert()
            .success()
            .stdout(predicate::str::contains("All tests passed"))
            .stdout(predicate::str::contains("1 pull request(s)"));

        devagent(&dir)
            .args(["--api-url", &url, "job", "missing"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn test_connect_rejection_exits_nonzero() {
        let url = spawn_stub_backend();
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &url, "connect", "not-a-url", "--name", "broken"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to connect repository"));
    }

    #[test]
    fn test_trigger_reloads_jobs() {
        let url = spawn_stub_backend();
        let dir = create_temp_project();
        devagent(&dir)
            .args(["--api-url", &url, "trigger"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Demo analysis triggered"))
            .stdout(predicate::str::contains("all (3)"));
    }

    #[test]
    fn test_chat_prints_acknowledgment() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join(".devagent")).unwrap();
        fs::write(dir.path().join(".devagent/devagent.toml"), "agent_reply_delay_ms = 50\n").unwrap();

        devagent(&dir)
            .args(["chat", "ping"])
            .assert()
            .success()
            .stdout(predicate::str::contains("ping"))
            .stdout(predicate::str::contains("Got it!"));

        devagent(&dir).args(["chat", "  "]).assert().failure();
    }
}
