//! Database operations for the `scheduled_bulk_jobs` table (the Job Store).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

const ALL_COLUMNS: &str = "id, public_id, name, schedule_time, timezone, niches, tones, \
     templates, platforms, use_existing_products, generate_affiliate_links, use_smart_style, \
     ai_models, affiliate_tag, webhook_url, send_to_webhook, is_active, total_runs, \
     consecutive_failures, last_run_at, last_error, next_run_at, created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `scheduled_bulk_jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScheduledJobRow {
    pub id: i64,
    pub public_id: Uuid,
    pub name: String,
    /// Canonical `HH:MM`, validated at the API boundary.
    pub schedule_time: String,
    /// IANA timezone name, validated at the API boundary.
    pub timezone: String,
    pub niches: Vec<String>,
    pub tones: Vec<String>,
    pub templates: Vec<String>,
    pub platforms: Vec<String>,
    pub use_existing_products: bool,
    pub generate_affiliate_links: bool,
    pub use_smart_style: bool,
    /// Always non-empty; normalized once when the job is written.
    pub ai_models: Vec<String>,
    pub affiliate_tag: Option<String>,
    pub webhook_url: Option<String>,
    pub send_to_webhook: bool,
    pub is_active: bool,
    pub total_runs: i32,
    pub consecutive_failures: i32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Configuration for a new scheduled job. Counters start at zero.
#[derive(Debug, Clone)]
pub struct NewScheduledJob {
    pub name: String,
    pub schedule_time: String,
    pub timezone: String,
    pub niches: Vec<String>,
    pub tones: Vec<String>,
    pub templates: Vec<String>,
    pub platforms: Vec<String>,
    pub use_existing_products: bool,
    pub generate_affiliate_links: bool,
    pub use_smart_style: bool,
    pub ai_models: Vec<String>,
    pub affiliate_tag: Option<String>,
    pub webhook_url: Option<String>,
    pub send_to_webhook: bool,
    pub next_run_at: DateTime<Utc>,
}

/// Sparse update of a scheduled job. `None` fields keep their current value.
// Option<Option<T>> is intentional: outer None = "not in request" (keep current),
// Some(None) = "explicitly cleared", Some(Some(v)) = "set to value".
#[allow(clippy::option_option)]
#[derive(Debug, Clone, Default)]
pub struct UpdateScheduledJob {
    pub name: Option<String>,
    pub schedule_time: Option<String>,
    pub timezone: Option<String>,
    pub niches: Option<Vec<String>>,
    pub tones: Option<Vec<String>>,
    pub templates: Option<Vec<String>>,
    pub platforms: Option<Vec<String>>,
    pub use_existing_products: Option<bool>,
    pub generate_affiliate_links: Option<bool>,
    pub use_smart_style: Option<bool>,
    pub ai_models: Option<Vec<String>>,
    pub affiliate_tag: Option<Option<String>>,
    pub webhook_url: Option<Option<String>>,
    pub send_to_webhook: Option<bool>,
    pub is_active: Option<bool>,
    pub next_run_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Inserts a new job row and returns it with its assigned id.
///
/// Generates a UUID in Rust and binds it to `public_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_scheduled_job(
    pool: &PgPool,
    job: &NewScheduledJob,
) -> Result<ScheduledJobRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, ScheduledJobRow>(&format!(
        "INSERT INTO scheduled_bulk_jobs \
             (public_id, name, schedule_time, timezone, niches, tones, templates, platforms, \
              use_existing_products, generate_affiliate_links, use_smart_style, ai_models, \
              affiliate_tag, webhook_url, send_to_webhook, next_run_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         RETURNING {ALL_COLUMNS}"
    ))
    .bind(public_id)
    .bind(&job.name)
    .bind(&job.schedule_time)
    .bind(&job.timezone)
    .bind(&job.niches)
    .bind(&job.tones)
    .bind(&job.templates)
    .bind(&job.platforms)
    .bind(job.use_existing_products)
    .bind(job.generate_affiliate_links)
    .bind(job.use_smart_style)
    .bind(&job.ai_models)
    .bind(job.affiliate_tag.as_deref())
    .bind(job.webhook_url.as_deref())
    .bind(job.send_to_webhook)
    .bind(job.next_run_at)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Returns all rows with `is_active = true`, oldest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_jobs(pool: &PgPool) -> Result<Vec<ScheduledJobRow>, DbError> {
    let rows = sqlx::query_as::<_, ScheduledJobRow>(&format!(
        "SELECT {ALL_COLUMNS} FROM scheduled_bulk_jobs \
         WHERE is_active = true \
         ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetches a single job by id, active or not.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_scheduled_job(pool: &PgPool, id: i64) -> Result<ScheduledJobRow, DbError> {
    let row = sqlx::query_as::<_, ScheduledJobRow>(&format!(
        "SELECT {ALL_COLUMNS} FROM scheduled_bulk_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Applies a sparse update and returns the updated row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn update_scheduled_job(
    pool: &PgPool,
    id: i64,
    update: &UpdateScheduledJob,
) -> Result<ScheduledJobRow, DbError> {
    let row = sqlx::query_as::<_, ScheduledJobRow>(&format!(
        "UPDATE scheduled_bulk_jobs SET \
             name                     = COALESCE($2, name), \
             schedule_time            = COALESCE($3, schedule_time), \
             timezone                 = COALESCE($4, timezone), \
             niches                   = COALESCE($5, niches), \
             tones                    = COALESCE($6, tones), \
             templates                = COALESCE($7, templates), \
             platforms                = COALESCE($8, platforms), \
             use_existing_products    = COALESCE($9, use_existing_products), \
             generate_affiliate_links = COALESCE($10, generate_affiliate_links), \
             use_smart_style          = COALESCE($11, use_smart_style), \
             ai_models                = COALESCE($12, ai_models), \
             affiliate_tag            = CASE WHEN $13 THEN $14 ELSE affiliate_tag END, \
             webhook_url              = CASE WHEN $15 THEN $16 ELSE webhook_url END, \
             send_to_webhook          = COALESCE($17, send_to_webhook), \
             is_active                = COALESCE($18, is_active), \
             next_run_at              = COALESCE($19, next_run_at), \
             updated_at               = NOW() \
         WHERE id = $1 \
         RETURNING {ALL_COLUMNS}"
    ))
    .bind(id)
    .bind(update.name.as_deref())
    .bind(update.schedule_time.as_deref())
    .bind(update.timezone.as_deref())
    .bind(update.niches.as_deref())
    .bind(update.tones.as_deref())
    .bind(update.templates.as_deref())
    .bind(update.platforms.as_deref())
    .bind(update.use_existing_products)
    .bind(update.generate_affiliate_links)
    .bind(update.use_smart_style)
    .bind(update.ai_models.as_deref())
    .bind(update.affiliate_tag.is_some())
    .bind(update.affiliate_tag.as_ref().and_then(|v| v.as_deref()))
    .bind(update.webhook_url.is_some())
    .bind(update.webhook_url.as_ref().and_then(|v| v.as_deref()))
    .bind(update.send_to_webhook)
    .bind(update.is_active)
    .bind(update.next_run_at)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Records the outcome of one run in a single atomic update.
///
/// Always increments `total_runs` and stamps `last_run_at`. Success resets
/// `consecutive_failures` and clears `last_error`; failure increments the
/// streak and stores a timestamped message.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn record_run_result(
    pool: &PgPool,
    id: i64,
    success: bool,
    error_message: Option<&str>,
) -> Result<(), DbError> {
    let stamped = error_message.map(|msg| format!("{}: {msg}", Utc::now().to_rfc3339()));

    let result = sqlx::query(
        "UPDATE scheduled_bulk_jobs SET \
             total_runs           = total_runs + 1, \
             consecutive_failures = CASE WHEN $2 THEN 0 ELSE consecutive_failures + 1 END, \
             last_error           = CASE WHEN $2 THEN NULL ELSE $3 END, \
             last_run_at          = NOW(), \
             updated_at           = NOW() \
         WHERE id = $1",
    )
    .bind(id)
    .bind(success)
    .bind(stamped.as_deref())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Sets `is_active = false`; keeps the row and its counters.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn deactivate_scheduled_job(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE scheduled_bulk_jobs SET is_active = false, updated_at = NOW() WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
