//! Read-only job inspection commands.
//!
//! These query the same tables the server serves, so they are handy for
//! checking what the scheduler will do without hitting the HTTP API.

use chrono::{DateTime, Utc};
use clap::Subcommand;

use copychef_core::{parse_timezone, ScheduleTime};

/// Sub-commands available under `jobs`.
#[derive(Debug, Subcommand)]
pub enum JobsCommands {
    /// List active scheduled jobs
    List,
    /// Show recently generated content, optionally scoped to one job
    Content {
        /// Filter by job id
        #[arg(long)]
        job: Option<i64>,
        /// Maximum number of items to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: JobsCommands) -> anyhow::Result<()> {
    match command {
        JobsCommands::List => list_jobs(pool).await,
        JobsCommands::Content { job, limit } => list_content(pool, job, limit).await,
    }
}

async fn list_jobs(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let jobs = copychef_db::list_active_jobs(pool).await?;

    if jobs.is_empty() {
        println!("no active scheduled jobs");
        return Ok(());
    }

    for job in &jobs {
        println!(
            "#{} {} — daily at {} {} (next run {})",
            job.id,
            job.name,
            job.schedule_time,
            job.timezone,
            fmt_next_run(job)
        );
        println!(
            "    niches: [{}]  platforms: [{}]  models: [{}]",
            job.niches.join(", "),
            job.platforms.join(", "),
            job.ai_models.join(", ")
        );
        println!(
            "    runs: {}  consecutive failures: {}  last run: {}",
            job.total_runs,
            job.consecutive_failures,
            fmt_date(job.last_run_at)
        );
        if let Some(err) = &job.last_error {
            println!("    last error: {err}");
        }
    }
    println!("{} active job(s)", jobs.len());

    Ok(())
}

async fn list_content(
    pool: &sqlx::PgPool,
    job_id: Option<i64>,
    limit: i64,
) -> anyhow::Result<()> {
    let items = copychef_db::list_recent_content(pool, job_id, limit).await?;

    if items.is_empty() {
        println!("no generated content found");
        return Ok(());
    }

    for item in &items {
        println!(
            "#{} [{}] {}/{} ({}, {}) via {}",
            item.id,
            item.created_at.format("%Y-%m-%d %H:%M"),
            item.niche,
            item.platform,
            item.tone,
            item.template,
            item.model
        );
        println!("    {}", item.caption);
    }

    Ok(())
}

/// Recompute the next fire time from the stored schedule; fall back to the
/// persisted value when the row no longer parses.
fn fmt_next_run(job: &copychef_db::ScheduledJobRow) -> String {
    let next = match (
        job.schedule_time.parse::<ScheduleTime>(),
        parse_timezone(&job.timezone),
    ) {
        (Ok(time), Ok(tz)) => time.next_run_from(Utc::now(), tz),
        _ => job.next_run_at,
    };
    next.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn fmt_date(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(
        || "\u{2014}".to_string(),
        |d| d.format("%Y-%m-%d %H:%M").to_string(),
    )
}
