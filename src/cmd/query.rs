//! One-shot read commands: `devagent repos|jobs|job|stats`.
//!
//! Each runs a single full load and prints a projection. An unreachable
//! backend is not an error: the commands print what could be loaded.

use anyhow::Result;
use chrono::Utc;

use devagent::config::DashboardConfig;
use devagent::dashboard::aggregate::StatusFilter;
use devagent::dashboard::view::{DashboardView, JobDetail, JobsView, RepositoryRow};
use devagent::ui::render;

use super::build_session;

pub async fn cmd_repos(config: &DashboardConfig) -> Result<()> {
    let session = build_session(config)?;
    session.load_once().await;
    let snapshot = session.snapshot();
    let rows: Vec<RepositoryRow> = snapshot.repositories.iter().map(RepositoryRow::from).collect();
    print!("{}", render::render_repositories(&rows));
    Ok(())
}

pub async fn cmd_jobs(config: &DashboardConfig, status: &str) -> Result<()> {
    let filter: StatusFilter = status.parse().unwrap_or_default();
    let session = build_session(config)?;
    session.load_once().await;
    let view = JobsView::project(&session.snapshot(), &filter, Utc::now());
    print!("{}", render::render_jobs(&view));
    Ok(())
}

pub async fn cmd_job(config: &DashboardConfig, job_id: &str) -> Result<()> {
    let session = build_session(config)?;
    session.load_once().await;
    // The listing may lag behind; fetch the record itself too.
    session.refresh_job(job_id).await;

    match JobDetail::project(&session.snapshot(), job_id, Utc::now()) {
        Some(detail) => {
            print!("{}", render::render_job_detail(&detail));
            Ok(())
        }
        None => anyhow::bail!("Job {} not found", job_id),
    }
}

pub async fn cmd_stats(config: &DashboardConfig) -> Result<()> {
    let session = build_session(config)?;
    let (health, _) = tokio::join!(session.health(), session.load_once());
    let view = DashboardView::project(&session.snapshot(), config.recent_jobs_limit, Utc::now());

    println!("{}", render::render_health(health.as_ref(), &config.api_url));
    println!();
    println!("{}", render::render_stats(&view.stats, view.running_count));

    let counts = view.counts;
    println!(
        "  pending {}  running {}  completed {}  failed {}  other {}",
        counts.pending, counts.running, counts.completed, counts.failed, counts.other
    );
    Ok(())
}
