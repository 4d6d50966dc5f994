//! Handlers for the scheduled-bulk job routes: CRUD over the Job Store plus
//! manual trigger and scheduler status.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use copychef_core::{parse_timezone, ModelSelection, ScheduleTime};
use copychef_db::{NewScheduledJob, ScheduledJobRow, UpdateScheduledJob};
use copychef_generator::TriggerSource;

use crate::middleware::RequestId;
use crate::scheduler::runner::RunError;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(super) struct CreateJobRequest {
    name: Option<String>,
    schedule_time: String,
    #[serde(default = "default_timezone")]
    timezone: String,
    niches: Vec<String>,
    tones: Vec<String>,
    templates: Vec<String>,
    platforms: Vec<String>,
    #[serde(default)]
    use_existing_products: bool,
    #[serde(default)]
    generate_affiliate_links: bool,
    #[serde(default)]
    use_smart_style: bool,
    // Accepts both the legacy scalar field and a list.
    #[serde(alias = "ai_model")]
    ai_models: ModelSelection,
    affiliate_tag: Option<String>,
    webhook_url: Option<String>,
    #[serde(default)]
    send_to_webhook: bool,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

/// Sparse update. Absent fields keep their stored value; `affiliate_tag` and
/// `webhook_url` accept an explicit `null` to clear.
#[allow(clippy::option_option)]
#[derive(Debug, Default, Deserialize)]
pub(super) struct UpdateJobRequest {
    name: Option<String>,
    schedule_time: Option<String>,
    timezone: Option<String>,
    niches: Option<Vec<String>>,
    tones: Option<Vec<String>>,
    templates: Option<Vec<String>>,
    platforms: Option<Vec<String>>,
    use_existing_products: Option<bool>,
    generate_affiliate_links: Option<bool>,
    use_smart_style: Option<bool>,
    #[serde(default, alias = "ai_model")]
    ai_models: Option<ModelSelection>,
    #[serde(default, deserialize_with = "present_or_null")]
    affiliate_tag: Option<Option<String>>,
    #[serde(default, deserialize_with = "present_or_null")]
    webhook_url: Option<Option<String>>,
    send_to_webhook: Option<bool>,
    is_active: Option<bool>,
}

/// Serde collapses an explicit `null` into a plain `Option`'s `None`, which
/// for a double option is indistinguishable from the field being absent. This
/// deserializer only runs when the key is present, so `null` becomes
/// `Some(None)` ("clear") while a missing key stays `None` ("keep").
fn present_or_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// A job as returned by the API: the stored row plus the derived cron
/// expression, a freshly computed next-run time, and registry state.
#[derive(Debug, Serialize)]
pub(super) struct JobView {
    id: i64,
    public_id: Uuid,
    name: String,
    schedule_time: String,
    timezone: String,
    cron_expression: String,
    niches: Vec<String>,
    tones: Vec<String>,
    templates: Vec<String>,
    platforms: Vec<String>,
    use_existing_products: bool,
    generate_affiliate_links: bool,
    use_smart_style: bool,
    ai_models: Vec<String>,
    affiliate_tag: Option<String>,
    webhook_url: Option<String>,
    send_to_webhook: bool,
    is_active: bool,
    total_runs: i32,
    consecutive_failures: i32,
    last_run_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    next_run_at: DateTime<Utc>,
    registered: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobView {
    fn from_row(row: ScheduledJobRow, registered: bool) -> Self {
        // Recompute the next run live so listings stay accurate even when the
        // stored value predates the last fire. Fall back to the stored value
        // if the row no longer parses.
        let (cron_expression, next_run_at) = match (
            row.schedule_time.parse::<ScheduleTime>(),
            parse_timezone(&row.timezone),
        ) {
            (Ok(time), Ok(tz)) => (
                time.cron_expression(),
                time.next_run_from(Utc::now(), tz),
            ),
            _ => (String::new(), row.next_run_at),
        };

        Self {
            id: row.id,
            public_id: row.public_id,
            name: row.name,
            schedule_time: row.schedule_time,
            timezone: row.timezone,
            cron_expression,
            niches: row.niches,
            tones: row.tones,
            templates: row.templates,
            platforms: row.platforms,
            use_existing_products: row.use_existing_products,
            generate_affiliate_links: row.generate_affiliate_links,
            use_smart_style: row.use_smart_style,
            ai_models: row.ai_models,
            affiliate_tag: row.affiliate_tag,
            webhook_url: row.webhook_url,
            send_to_webhook: row.send_to_webhook,
            is_active: row.is_active,
            total_runs: row.total_runs,
            consecutive_failures: row.consecutive_failures,
            last_run_at: row.last_run_at,
            last_error: row.last_error,
            next_run_at,
            registered,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct DeleteJobResponse {
    id: i64,
    deactivated: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct TriggerRunResponse {
    job_id: i64,
    success: bool,
    generated: usize,
    failed: u32,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct SchedulerStatus {
    registered_jobs: usize,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validation_error(request_id: &str, message: impl Into<String>) -> ApiError {
    ApiError::new(request_id, "validation_error", message)
}

fn validate_list(request_id: &str, field: &str, values: &[String]) -> Result<(), ApiError> {
    if values.is_empty() {
        return Err(validation_error(
            request_id,
            format!("{field} must contain at least one entry"),
        ));
    }
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(validation_error(
            request_id,
            format!("{field} must not contain blank entries"),
        ));
    }
    Ok(())
}

fn validate_webhook_url(request_id: &str, url: &str) -> Result<(), ApiError> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| validation_error(request_id, format!("webhook_url is not a valid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_error(
            request_id,
            "webhook_url must use http or https",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub(super) async fn create_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JobView>>), ApiError> {
    let rid = req_id.0.as_str();

    let time: ScheduleTime = body
        .schedule_time
        .parse()
        .map_err(|e| validation_error(rid, format!("{e}")))?;
    let tz = parse_timezone(&body.timezone).map_err(|e| validation_error(rid, format!("{e}")))?;

    validate_list(rid, "niches", &body.niches)?;
    validate_list(rid, "tones", &body.tones)?;
    validate_list(rid, "templates", &body.templates)?;
    validate_list(rid, "platforms", &body.platforms)?;

    let ai_models = body
        .ai_models
        .normalize()
        .map_err(|e| validation_error(rid, format!("{e}")))?;

    if let Some(url) = body.webhook_url.as_deref() {
        validate_webhook_url(rid, url)?;
    }

    let name = body
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("{} daily batch", body.niches.join(", ")));

    let new_job = NewScheduledJob {
        name,
        schedule_time: body.schedule_time,
        timezone: body.timezone,
        niches: body.niches,
        tones: body.tones,
        templates: body.templates,
        platforms: body.platforms,
        use_existing_products: body.use_existing_products,
        generate_affiliate_links: body.generate_affiliate_links,
        use_smart_style: body.use_smart_style,
        ai_models,
        affiliate_tag: body.affiliate_tag,
        webhook_url: body.webhook_url,
        send_to_webhook: body.send_to_webhook,
        next_run_at: time.next_run_from(Utc::now(), tz),
    };

    let row = copychef_db::create_scheduled_job(&state.pool, &new_job)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if let Err(e) = state.scheduler.register(&row).await {
        tracing::error!(job_id = row.id, error = %e, "failed to register created job");
        return Err(ApiError::new(
            req_id.0.clone(),
            "internal_error",
            "job was stored but could not be scheduled",
        ));
    }

    let registered = state.scheduler.is_registered(row.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: JobView::from_row(row, registered),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn list_jobs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<JobView>>>, ApiError> {
    let rows = copychef_db::list_active_jobs(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let jobs = rows
        .into_iter()
        .map(|row| {
            let registered = state.scheduler.is_registered(row.id);
            JobView::from_row(row, registered)
        })
        .collect();

    Ok(Json(ApiResponse {
        data: jobs,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn update_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateJobRequest>,
) -> Result<Json<ApiResponse<JobView>>, ApiError> {
    let rid = req_id.0.as_str();

    let existing = copychef_db::get_scheduled_job(&state.pool, id)
        .await
        .map_err(|e| match e {
            copychef_db::DbError::NotFound => {
                ApiError::new(rid, "not_found", format!("scheduled job {id} not found"))
            }
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    // Validate against the merged configuration, not just the patch.
    let schedule_time = body
        .schedule_time
        .clone()
        .unwrap_or_else(|| existing.schedule_time.clone());
    let timezone = body
        .timezone
        .clone()
        .unwrap_or_else(|| existing.timezone.clone());
    let time: ScheduleTime = schedule_time
        .parse()
        .map_err(|e| validation_error(rid, format!("{e}")))?;
    let tz = parse_timezone(&timezone).map_err(|e| validation_error(rid, format!("{e}")))?;

    for (field, values) in [
        ("niches", &body.niches),
        ("tones", &body.tones),
        ("templates", &body.templates),
        ("platforms", &body.platforms),
    ] {
        if let Some(values) = values {
            validate_list(rid, field, values)?;
        }
    }

    let ai_models = body
        .ai_models
        .map(|selection| selection.normalize())
        .transpose()
        .map_err(|e| validation_error(rid, format!("{e}")))?;

    if let Some(Some(url)) = body.webhook_url.as_ref() {
        validate_webhook_url(rid, url)?;
    }

    let update = UpdateScheduledJob {
        name: body.name,
        schedule_time: body.schedule_time,
        timezone: body.timezone,
        niches: body.niches,
        tones: body.tones,
        templates: body.templates,
        platforms: body.platforms,
        use_existing_products: body.use_existing_products,
        generate_affiliate_links: body.generate_affiliate_links,
        use_smart_style: body.use_smart_style,
        ai_models,
        affiliate_tag: body.affiliate_tag,
        webhook_url: body.webhook_url,
        send_to_webhook: body.send_to_webhook,
        is_active: body.is_active,
        next_run_at: Some(time.next_run_from(Utc::now(), tz)),
    };

    let row = copychef_db::update_scheduled_job(&state.pool, id, &update)
        .await
        .map_err(|e| match e {
            copychef_db::DbError::NotFound => ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("scheduled job {id} not found"),
            ),
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    // Keep the registry in step with the stored activation state. A schedule
    // change re-registers so the cron expression matches the new time.
    if row.is_active {
        if let Err(e) = state.scheduler.register(&row).await {
            tracing::error!(job_id = row.id, error = %e, "failed to re-register updated job");
            return Err(ApiError::new(
                req_id.0.clone(),
                "internal_error",
                "job was updated but could not be rescheduled",
            ));
        }
    } else if let Err(e) = state.scheduler.unregister(row.id).await {
        tracing::error!(job_id = row.id, error = %e, "failed to unregister deactivated job");
    }

    let registered = state.scheduler.is_registered(row.id);
    Ok(Json(ApiResponse {
        data: JobView::from_row(row, registered),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeleteJobResponse>>, ApiError> {
    copychef_db::deactivate_scheduled_job(&state.pool, id)
        .await
        .map_err(|e| match e {
            copychef_db::DbError::NotFound => ApiError::new(
                req_id.0.clone(),
                "not_found",
                format!("scheduled job {id} not found"),
            ),
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    if let Err(e) = state.scheduler.unregister(id).await {
        tracing::error!(job_id = id, error = %e, "failed to unregister deleted job");
    }

    Ok(Json(ApiResponse {
        data: DeleteJobResponse {
            id,
            deactivated: true,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn trigger_job(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<TriggerRunResponse>>, ApiError> {
    match state.scheduler.run_now(id, TriggerSource::Manual).await {
        Ok(report) => Ok(Json(ApiResponse {
            data: TriggerRunResponse {
                job_id: id,
                success: report.success,
                generated: report.generated,
                failed: report.failed,
                error: report.error,
            },
            meta: ResponseMeta::new(req_id.0),
        })),
        Err(RunError::NotFound(_)) => Err(ApiError::new(
            req_id.0,
            "not_found",
            format!("scheduled job {id} not found"),
        )),
        Err(RunError::AlreadyRunning(_)) => Err(ApiError::new(
            req_id.0,
            "conflict",
            format!("scheduled job {id} is already running"),
        )),
        Err(RunError::Db(e)) => Err(map_db_error(req_id.0, &e)),
    }
}

pub(super) async fn scheduler_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<SchedulerStatus>> {
    Json(ApiResponse {
        data: SchedulerStatus {
            registered_jobs: state.scheduler.registered_count(),
        },
        meta: ResponseMeta::new(req_id.0),
    })
}
