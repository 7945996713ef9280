//! Live terminal dashboard: `devagent watch`.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use console::Term;
use tokio::sync::broadcast::{self, error::RecvError};

use devagent::config::DashboardConfig;
use devagent::dashboard::session::DashboardSession;
use devagent::dashboard::store::StoreEvent;
use devagent::dashboard::view::DashboardView;
use devagent::ui::{LoadingSpinner, render};

use super::build_session;

/// Durations of running jobs tick even when nothing changes.
const REDRAW_INTERVAL: Duration = Duration::from_secs(1);

pub async fn cmd_watch(config: &DashboardConfig) -> Result<()> {
    let session = build_session(config)?;
    let term = Term::stdout();
    let mut events = session.subscribe();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let spinner = LoadingSpinner::start(&format!("Loading dashboard from {}...", config.api_url));
    session.start();
    let interrupted = tokio::select! {
        _ = wait_for_initial_load(&mut events) => false,
        _ = &mut ctrl_c => true,
    };
    spinner.finish();
    if interrupted {
        session.shutdown().await;
        return Ok(());
    }

    draw(&term, &session, config)?;
    let mut redraw = tokio::time::interval(REDRAW_INTERVAL);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = events.recv() => match event {
                Ok(StoreEvent::Disposed) | Err(RecvError::Closed) => break,
                Ok(_) | Err(RecvError::Lagged(_)) => draw(&term, &session, config)?,
            },
            _ = redraw.tick() => draw(&term, &session, config)?,
        }
    }

    session.shutdown().await;
    println!("\nStopped watching.");
    Ok(())
}

async fn wait_for_initial_load(events: &mut broadcast::Receiver<StoreEvent>) {
    loop {
        match events.recv().await {
            Ok(StoreEvent::LoadingChanged { loading: false })
            | Ok(StoreEvent::Disposed)
            | Err(_) => return,
            Ok(_) => {}
        }
    }
}

fn draw(term: &Term, session: &DashboardSession, config: &DashboardConfig) -> Result<()> {
    let view = DashboardView::project(&session.snapshot(), config.recent_jobs_limit, Utc::now());
    let frame = render::render_dashboard(&view, &config.api_url);
    term.clear_screen().context("Failed to clear terminal")?;
    term.write_str(&frame).context("Failed to write to terminal")?;
    Ok(())
}
