//! Terminal rendering of dashboard projections.
//!
//! Render functions return plain `String`s so the watch loop can redraw the
//! whole screen at once and tests can inspect the output.

use std::fmt::Write as _;
use std::time::Duration;

use console::{StyledObject, style};
use indicatif::{ProgressBar, ProgressStyle};

use crate::dashboard::models::{ChatMessage, ChatSender, DashboardStats, HealthStatus};
use crate::dashboard::status::{StatusDescriptor, truncate_text};
use crate::dashboard::view::{DashboardView, JobCard, JobDetail, JobsView, RepositoryRow};
use crate::ui::icons::{
    AGENT, CHAT, CHECK, CLOCK, CROSS, PENDING, PROGRESS, PULL_REQUEST, REPO, RUNNING, SPARKLE,
    UNKNOWN,
};

/// Spinner shown while the initial load is in flight.
pub struct LoadingSpinner {
    bar: ProgressBar,
}

impl LoadingSpinner {
    pub fn start(message: &str) -> Self {
        let bar = ProgressBar::new_spinner();
        let spinner_style = ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}

/// Color a status label according to its descriptor.
fn styled_status(status: &StatusDescriptor) -> StyledObject<String> {
    let label = style(status.label.clone());
    match status.color_class {
        c if c.contains("yellow") => label.yellow(),
        c if c.contains("blue") => label.blue(),
        c if c.contains("green") => label.green(),
        c if c.contains("red") => label.red(),
        _ => label.dim(),
    }
}

fn status_icon(status: &StatusDescriptor) -> String {
    match status.label.as_str() {
        "Pending" => PENDING.to_string(),
        "Running" => RUNNING.to_string(),
        "Completed" => CHECK.to_string(),
        "Failed" => CROSS.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn job_line(card: &JobCard) -> String {
    let mut line = format!(
        "  {}{:<12} {:<20} {:<9} {} {}",
        status_icon(&card.status),
        styled_status(&card.status),
        truncate_text(&card.repository, 18),
        card.commit,
        style(&card.created).dim(),
        style(format!("({})", card.duration)).dim(),
    );
    if card.placeholder {
        line.push_str(&format!(" {}", style("awaiting server").italic().dim()));
    }
    let _ = write!(line, "  {}", style(&card.id).dim());
    line
}

pub fn render_stats(stats: &DashboardStats, running: usize) -> String {
    format!(
        "{}Repositories: {}  Jobs: {}  Completed: {}  Failed: {}  Running: {}  Success rate: {}",
        PROGRESS,
        style(stats.total_repositories).bold(),
        style(stats.total_jobs).bold(),
        style(stats.completed_jobs).green(),
        style(stats.failed_jobs).red(),
        style(running).blue(),
        style(format!("{:.1}%", stats.success_rate)).bold(),
    )
}

pub fn render_health(health: Option<&HealthStatus>, api_url: &str) -> String {
    match health {
        Some(h) => format!("{}Backend {} ({})", CHECK, style(api_url).cyan(), h.status),
        None => format!(
            "{}Backend {} unreachable; showing last known state",
            CROSS,
            style(api_url).cyan()
        ),
    }
}

pub fn render_repositories(rows: &[RepositoryRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style("Repositories").bold().underlined());
    if rows.is_empty() {
        let _ = writeln!(out, "  {}", style("No repositories connected").dim());
        return out;
    }
    for row in rows {
        let _ = writeln!(
            out,
            "  {}{} {} {} {}",
            REPO,
            style(&row.name).bold(),
            style(&row.url).dim(),
            row.status,
            style(format!("connected {}", row.connected)).dim(),
        );
    }
    out
}

pub fn render_dashboard(view: &DashboardView, api_url: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}{}", SPARKLE, style("DevAgent Dashboard").bold().cyan());
    let _ = writeln!(out, "{}", style(api_url).dim());
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", render_stats(&view.stats, view.running_count));
    let _ = writeln!(out);
    out.push_str(&render_repositories(&view.repositories));
    let _ = writeln!(out);

    let _ = writeln!(out, "{}", style("Recent Jobs").bold().underlined());
    match view.empty_hint {
        Some(hint) => {
            let _ = writeln!(out, "  {}", style(hint).dim());
        }
        None => {
            for card in &view.recent_jobs {
                let _ = writeln!(out, "{}", job_line(card));
            }
        }
    }

    if !view.running_jobs.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}{}",
            CLOCK,
            style(format!("Running ({})", view.running_count)).bold().blue()
        );
        for card in &view.running_jobs {
            let _ = writeln!(out, "{}", job_line(card));
            if let Some(last) = &card.last_log {
                let _ = writeln!(out, "      {}", style(last).dim());
            }
        }
    }

    let _ = writeln!(out);
    let trigger_hint = if view.can_trigger {
        "trigger: `devagent trigger`"
    } else {
        "trigger disabled: connect a repository first"
    };
    let _ = writeln!(out, "{}", style(trigger_hint).dim());
    if view.loading {
        let _ = writeln!(out, "{}", style("Loading...").yellow());
    }
    out
}

pub fn render_jobs(view: &JobsView) -> String {
    let mut out = String::new();
    let tabs: Vec<String> = view
        .tabs
        .iter()
        .map(|tab| {
            let text = format!("{} ({})", tab.filter, tab.count);
            if tab.active {
                style(text).bold().reverse().to_string()
            } else {
                style(text).dim().to_string()
            }
        })
        .collect();
    let _ = writeln!(out, "{}", tabs.join("  "));
    let _ = writeln!(out);
    if view.jobs.is_empty() {
        let _ = writeln!(out, "  {}", style(format!("No {} jobs", view.filter)).dim());
    }
    for card in &view.jobs {
        let _ = writeln!(out, "{}", job_line(card));
    }
    out
}

pub fn render_job_detail(detail: &JobDetail) -> String {
    let card = &detail.card;
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", style("Job").bold(), style(&card.id).cyan());
    let _ = writeln!(out, "  Status:     {}{}", status_icon(&card.status), styled_status(&card.status));
    let _ = writeln!(out, "  Repository: {}", card.repository);
    let _ = writeln!(out, "  Commit:     {}", card.commit);
    let _ = writeln!(out, "  Created:    {}", card.created);
    let _ = writeln!(out, "  Completed:  {}", detail.completed);
    let _ = writeln!(out, "  Duration:   {}", card.duration);
    let _ = writeln!(out, "  Analysis:   {}", detail.progress.state.label());
    if detail.progress.out_of_order {
        let _ = writeln!(out, "              {}", style("(phases reported out of order)").yellow());
    }

    if let Some(error) = &detail.error {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}{}", CROSS, style(error).red());
    }

    if detail.result.is_some() {
        let summary = &detail.summary;
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}{} pull request(s), {} test(s), {} failed",
            PULL_REQUEST, summary.pull_requests, summary.tests_total, summary.tests_failed
        );
    }

    if !detail.analysis.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", style("Analysis log").bold().underlined());
        for entry in &detail.analysis {
            let _ = writeln!(
                out,
                "  [{}] {} {}",
                entry.phase,
                style(entry.result.as_str()).bold(),
                entry.action
            );
            if !entry.details.is_empty() {
                let _ = writeln!(out, "      {}", style(truncate_text(&entry.details, 120)).dim());
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "{}", style("Logs").bold().underlined());
    if detail.logs.is_empty() {
        let _ = writeln!(out, "  {}", style("No logs yet").dim());
    }
    for line in &detail.logs {
        let _ = writeln!(out, "  {}", line);
    }
    out
}

pub fn render_chat(messages: &[ChatMessage]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}{}", CHAT, style("Agent chat").bold());
    for message in messages {
        let (icon, who) = match message.sender {
            ChatSender::User => ("  ".to_string(), style("you").cyan()),
            ChatSender::Agent => (AGENT.to_string(), style("agent").green()),
        };
        let _ = writeln!(
            out,
            "{}{} {} {}",
            icon,
            who,
            style(message.timestamp.format("%H:%M:%S")).dim(),
            message.message
        );
    }
    out
}
