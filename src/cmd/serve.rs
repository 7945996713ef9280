//! Projection server command: `devagent serve`.

use anyhow::Result;

use devagent::config::DashboardConfig;
use devagent::dashboard::server::{ServerConfig, start_server};

use super::build_session;

pub async fn cmd_serve(config: &DashboardConfig, open: bool, dev: bool) -> Result<()> {
    let session = build_session(config)?;

    // Skip in dev mode (no browser inside containers)
    if open && !dev {
        let url = format!("http://localhost:{}/api/dashboard", config.serve_port);
        tokio::spawn(async move {
            // Small delay to let the server start binding
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
            if let Err(e) = open::that(&url) {
                eprintln!("Failed to open browser: {}", e);
            }
        });
    }

    start_server(
        ServerConfig {
            port: config.serve_port,
            recent_jobs_limit: config.recent_jobs_limit,
            dev_mode: dev,
        },
        session,
    )
    .await
}
