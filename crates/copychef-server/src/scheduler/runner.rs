//! The Job Runner: turn one stored job into one bulk-generation run and
//! record the outcome, whatever happens.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use copychef_core::ScheduleTime;
use copychef_db::{DbError, NewContentItem, ScheduledJobRow, UpdateScheduledJob};
use copychef_generator::{
    deliver_run_summary, GenerationOutcome, GenerationRequest, RunSummary, TriggerSource,
};

use super::RunContext;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("scheduled job {0} not found")]
    NotFound(i64),
    #[error("scheduled job {0} is already running")]
    AlreadyRunning(i64),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Outcome of one runner invocation, as reported to the manual-trigger caller.
#[derive(Debug)]
pub struct RunReport {
    pub success: bool,
    pub generated: usize,
    pub failed: u32,
    pub error: Option<String>,
}

/// Cron-callback entry point: run the job and log; nothing propagates.
///
/// Every failure path lands in `record_run_result`, so a crash in generation
/// can never leave the counters unset or take the scheduler down.
pub(super) async fn run_scheduled(ctx: &Arc<RunContext>, job_id: i64) {
    tracing::info!(job_id, "scheduler: job fired");
    match execute(ctx, job_id, TriggerSource::Scheduled).await {
        Ok(report) if report.success => {
            tracing::info!(job_id, generated = report.generated, "scheduler: run succeeded");
        }
        Ok(report) => {
            tracing::warn!(
                job_id,
                failed = report.failed,
                error = report.error.as_deref().unwrap_or("unknown"),
                "scheduler: run failed"
            );
        }
        Err(RunError::AlreadyRunning(_)) => {
            tracing::warn!(job_id, "scheduler: previous run still in flight; skipping this fire");
        }
        Err(e) => {
            tracing::error!(job_id, error = %e, "scheduler: run could not start");
        }
    }
}

/// Run one job now. Shared by the cron callback and the manual trigger route.
///
/// # Errors
///
/// Returns [`RunError::NotFound`] for unknown or inactive jobs,
/// [`RunError::AlreadyRunning`] when the same job is mid-run, or
/// [`RunError::Db`] if the row cannot be read.
pub(super) async fn execute(
    ctx: &Arc<RunContext>,
    job_id: i64,
    trigger: TriggerSource,
) -> Result<RunReport, RunError> {
    let job = copychef_db::get_scheduled_job(&ctx.pool, job_id)
        .await
        .map_err(|e| match e {
            DbError::NotFound => RunError::NotFound(job_id),
            other => RunError::Db(other),
        })?;
    if !job.is_active {
        return Err(RunError::NotFound(job_id));
    }

    let _guard = ctx
        .claim(job_id)
        .ok_or(RunError::AlreadyRunning(job_id))?;

    let request = request_from_job(&job, trigger);
    let report = run_generation(ctx, &job, &request).await;

    if let Err(e) =
        copychef_db::record_run_result(&ctx.pool, job_id, report.success, report.error.as_deref())
            .await
    {
        tracing::error!(job_id, error = %e, "failed to record run result");
    }
    advance_next_run(ctx, &job).await;

    Ok(report)
}

/// Generate, persist, and notify — collapsing every failure into the report.
async fn run_generation(
    ctx: &Arc<RunContext>,
    job: &ScheduledJobRow,
    request: &GenerationRequest,
) -> RunReport {
    let outcome = match ctx.generator.generate(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            return RunReport {
                success: false,
                generated: 0,
                failed: 0,
                error: Some(e.to_string()),
            };
        }
    };

    let mut error = failure_message(&outcome);

    if !outcome.items.is_empty() {
        let items: Vec<NewContentItem> = outcome
            .items
            .iter()
            .map(|item| NewContentItem {
                job_id: Some(job.id),
                niche: item.niche.clone(),
                platform: item.platform.clone(),
                tone: item.tone.clone(),
                template: item.template.clone(),
                model: item.model.clone(),
                script: item.script.clone(),
                caption: item.caption.clone(),
                hashtags: item.hashtags.clone(),
                trigger_source: request.trigger_source.as_str().to_string(),
            })
            .collect();

        if let Err(e) = copychef_db::insert_content_items(&ctx.pool, &items).await {
            tracing::error!(job_id = job.id, error = %e, "failed to persist generated content");
            error = Some(format!("content persistence failed: {e}"));
        }
    }

    let success = error.is_none();

    if job.send_to_webhook {
        if let Some(url) = job.webhook_url.as_deref() {
            let summary = RunSummary {
                job_id: Some(job.id),
                trigger_source: request.trigger_source,
                generated: outcome.generated(),
                failed: outcome.failed,
                errors: outcome.errors.clone(),
                completed_at: Utc::now(),
            };
            // Webhook delivery is best-effort and never fails the run.
            if let Err(e) = deliver_run_summary(&ctx.webhook_client, url, &summary).await {
                tracing::warn!(job_id = job.id, error = %e, "webhook delivery failed");
            }
        }
    }

    RunReport {
        success,
        generated: outcome.generated(),
        failed: outcome.failed,
        error,
    }
}

/// `None` when the outcome counts as a success, else a joined error message.
fn failure_message(outcome: &GenerationOutcome) -> Option<String> {
    if outcome.is_success() {
        None
    } else if outcome.errors.is_empty() {
        Some("generation produced no items".to_string())
    } else {
        Some(outcome.errors.join("; "))
    }
}

/// Build the typed generation request from the job's current configuration.
pub(super) fn request_from_job(job: &ScheduledJobRow, trigger: TriggerSource) -> GenerationRequest {
    GenerationRequest {
        job_id: Some(job.id),
        niches: job.niches.clone(),
        tones: job.tones.clone(),
        templates: job.templates.clone(),
        platforms: job.platforms.clone(),
        use_existing_products: job.use_existing_products,
        generate_affiliate_links: job.generate_affiliate_links,
        use_smart_style: job.use_smart_style,
        ai_models: job.ai_models.clone(),
        affiliate_tag: job.affiliate_tag.clone(),
        webhook_url: job.webhook_url.clone(),
        send_to_webhook: job.send_to_webhook,
        trigger_source: trigger,
    }
}

/// Best-effort bump of the stored `next_run_at` after a fire.
async fn advance_next_run(ctx: &Arc<RunContext>, job: &ScheduledJobRow) {
    let (Ok(time), Ok(tz)) = (
        job.schedule_time.parse::<ScheduleTime>(),
        copychef_core::parse_timezone(&job.timezone),
    ) else {
        tracing::warn!(job_id = job.id, "stored schedule no longer parses; next_run_at not advanced");
        return;
    };

    let update = UpdateScheduledJob {
        next_run_at: Some(time.next_run_from(Utc::now(), tz)),
        ..UpdateScheduledJob::default()
    };
    if let Err(e) = copychef_db::update_scheduled_job(&ctx.pool, job.id, &update).await {
        tracing::warn!(job_id = job.id, error = %e, "failed to advance next_run_at");
    }
}
