//! Mutating commands: `devagent connect|trigger|chat`.

use anyhow::Result;
use chrono::Utc;

use devagent::config::DashboardConfig;
use devagent::dashboard::aggregate::StatusFilter;
use devagent::dashboard::view::{JobsView, RepositoryRow};
use devagent::ui::icons::{CHECK, SPARKLE};
use devagent::ui::render;

use super::build_session;

pub async fn cmd_connect(
    config: &DashboardConfig,
    url: &str,
    name: Option<&str>,
    token: Option<&str>,
) -> Result<()> {
    let session = build_session(config)?;
    if !session.connect_repository(url, name, token).await {
        anyhow::bail!("Failed to connect repository {}", url);
    }

    println!("{}Connected {}", CHECK, url.trim());
    let snapshot = session.snapshot();
    let rows: Vec<RepositoryRow> = snapshot.repositories.iter().map(RepositoryRow::from).collect();
    print!("{}", render::render_repositories(&rows));
    Ok(())
}

pub async fn cmd_trigger(config: &DashboardConfig) -> Result<()> {
    let session = build_session(config)?;
    if !session.trigger_demo_analysis().await {
        anyhow::bail!("Failed to trigger demo analysis");
    }
    println!("{}Demo analysis triggered; refreshing jobs...", SPARKLE);

    session.settle().await;
    let view = JobsView::project(&session.snapshot(), &StatusFilter::All, Utc::now());
    print!("{}", render::render_jobs(&view));
    Ok(())
}

pub async fn cmd_chat(config: &DashboardConfig, message: &str) -> Result<()> {
    let session = build_session(config)?;
    if session.send_chat_message(message).is_none() {
        anyhow::bail!("Message must not be empty");
    }
    session.settle().await;
    print!("{}", render::render_chat(&session.chat_messages()));
    Ok(())
}
