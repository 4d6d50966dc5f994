//! Database operations for the `content_items` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `content_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ContentItemRow {
    pub id: i64,
    pub job_id: Option<i64>,
    pub niche: String,
    pub platform: String,
    pub tone: String,
    pub template: String,
    pub model: String,
    pub script: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub trigger_source: String,
    pub created_at: DateTime<Utc>,
}

/// One generated item ready for insertion.
#[derive(Debug, Clone)]
pub struct NewContentItem {
    pub job_id: Option<i64>,
    pub niche: String,
    pub platform: String,
    pub tone: String,
    pub template: String,
    pub model: String,
    pub script: String,
    pub caption: String,
    pub hashtags: Vec<String>,
    pub trigger_source: String,
}

/// Inserts a batch of generated items; returns the number inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails.
pub async fn insert_content_items(
    pool: &PgPool,
    items: &[NewContentItem],
) -> Result<usize, DbError> {
    // Runs are small (niches x platforms); per-row inserts inside one
    // transaction keep the query simple.
    let mut tx = pool.begin().await?;
    for item in items {
        sqlx::query(
            "INSERT INTO content_items \
                 (job_id, niche, platform, tone, template, model, script, caption, \
                  hashtags, trigger_source) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(item.job_id)
        .bind(&item.niche)
        .bind(&item.platform)
        .bind(&item.tone)
        .bind(&item.template)
        .bind(&item.model)
        .bind(&item.script)
        .bind(&item.caption)
        .bind(&item.hashtags)
        .bind(&item.trigger_source)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(items.len())
}

/// Returns the most recent items, newest first, optionally scoped to one job.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_content(
    pool: &PgPool,
    job_id: Option<i64>,
    limit: i64,
) -> Result<Vec<ContentItemRow>, DbError> {
    let rows = sqlx::query_as::<_, ContentItemRow>(
        "SELECT id, job_id, niche, platform, tone, template, model, script, caption, \
                hashtags, trigger_source, created_at \
         FROM content_items \
         WHERE ($1::BIGINT IS NULL OR job_id = $1) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(job_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
