//! Live integration tests for copychef-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/copychef-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::Utc;
use copychef_db::{
    create_scheduled_job, deactivate_scheduled_job, get_scheduled_job, insert_content_items,
    list_active_jobs, list_recent_content, record_run_result, update_scheduled_job, DbError,
    NewContentItem, NewScheduledJob, UpdateScheduledJob,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_new_job(name: &str) -> NewScheduledJob {
    NewScheduledJob {
        name: name.to_string(),
        schedule_time: "09:00".to_string(),
        timezone: "UTC".to_string(),
        niches: vec!["cooking".to_string(), "baking".to_string()],
        tones: vec!["friendly".to_string()],
        templates: vec!["recipe_teaser".to_string()],
        platforms: vec!["tiktok".to_string(), "instagram".to_string()],
        use_existing_products: false,
        generate_affiliate_links: true,
        use_smart_style: false,
        ai_models: vec!["claude-sonnet-4".to_string()],
        affiliate_tag: Some("chef-21".to_string()),
        webhook_url: None,
        send_to_webhook: false,
        next_run_at: Utc::now() + chrono::Duration::hours(1),
    }
}

// ---------------------------------------------------------------------------
// scheduled_bulk_jobs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn create_then_list_returns_matching_configuration(pool: sqlx::PgPool) {
    let created = create_scheduled_job(&pool, &make_new_job("morning batch"))
        .await
        .expect("create job");

    let active = list_active_jobs(&pool).await.expect("list active");
    assert_eq!(active.len(), 1, "expected exactly the created job");

    let row = &active[0];
    assert_eq!(row.id, created.id);
    assert_eq!(row.name, "morning batch");
    assert_eq!(row.schedule_time, "09:00");
    assert_eq!(row.niches, vec!["cooking", "baking"]);
    assert_eq!(row.platforms, vec!["tiktok", "instagram"]);
    assert_eq!(row.ai_models, vec!["claude-sonnet-4"]);
    assert_eq!(row.total_runs, 0);
    assert_eq!(row.consecutive_failures, 0);
    assert!(row.is_active);
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_unknown_job_is_not_found(pool: sqlx::PgPool) {
    let err = get_scheduled_job(&pool, 9_999).await.expect_err("missing row");
    assert!(matches!(err, DbError::NotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn sparse_update_keeps_unmentioned_fields(pool: sqlx::PgPool) {
    let created = create_scheduled_job(&pool, &make_new_job("to update"))
        .await
        .expect("create job");

    let update = UpdateScheduledJob {
        schedule_time: Some("14:30".to_string()),
        ..UpdateScheduledJob::default()
    };
    let updated = update_scheduled_job(&pool, created.id, &update)
        .await
        .expect("update job");

    assert_eq!(updated.schedule_time, "14:30");
    assert_eq!(updated.name, "to update");
    assert_eq!(updated.niches, created.niches);
    assert_eq!(updated.affiliate_tag.as_deref(), Some("chef-21"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_can_explicitly_clear_optional_fields(pool: sqlx::PgPool) {
    let created = create_scheduled_job(&pool, &make_new_job("to clear"))
        .await
        .expect("create job");
    assert!(created.affiliate_tag.is_some());

    let update = UpdateScheduledJob {
        affiliate_tag: Some(None),
        webhook_url: Some(Some("https://hooks.example.com/run".to_string())),
        ..UpdateScheduledJob::default()
    };
    let updated = update_scheduled_job(&pool, created.id, &update)
        .await
        .expect("update job");

    assert!(updated.affiliate_tag.is_none(), "tag should be cleared");
    assert_eq!(
        updated.webhook_url.as_deref(),
        Some("https://hooks.example.com/run")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn deactivate_removes_from_active_listing_but_keeps_row(pool: sqlx::PgPool) {
    let created = create_scheduled_job(&pool, &make_new_job("to deactivate"))
        .await
        .expect("create job");

    deactivate_scheduled_job(&pool, created.id)
        .await
        .expect("deactivate");

    let active = list_active_jobs(&pool).await.expect("list active");
    assert!(active.is_empty(), "deactivated job should not be listed");

    let row = get_scheduled_job(&pool, created.id).await.expect("row kept");
    assert!(!row.is_active);
}

#[sqlx::test(migrations = "../../migrations")]
async fn record_run_result_success_resets_failure_streak(pool: sqlx::PgPool) {
    let created = create_scheduled_job(&pool, &make_new_job("streaky"))
        .await
        .expect("create job");

    record_run_result(&pool, created.id, false, Some("provider timeout"))
        .await
        .expect("record failure");
    record_run_result(&pool, created.id, false, Some("provider timeout"))
        .await
        .expect("record failure");

    let row = get_scheduled_job(&pool, created.id).await.expect("get");
    assert_eq!(row.total_runs, 2);
    assert_eq!(row.consecutive_failures, 2);
    let last_error = row.last_error.expect("last_error set");
    assert!(last_error.contains("provider timeout"));
    assert!(row.last_run_at.is_some());

    record_run_result(&pool, created.id, true, None)
        .await
        .expect("record success");

    let row = get_scheduled_job(&pool, created.id).await.expect("get");
    assert_eq!(row.total_runs, 3, "total_runs increments regardless");
    assert_eq!(row.consecutive_failures, 0, "success resets the streak");
    assert!(row.last_error.is_none(), "success clears last_error");
}

#[sqlx::test(migrations = "../../migrations")]
async fn record_run_result_for_unknown_job_is_not_found(pool: sqlx::PgPool) {
    let err = record_run_result(&pool, 12_345, true, None)
        .await
        .expect_err("missing row");
    assert!(matches!(err, DbError::NotFound));
}

// ---------------------------------------------------------------------------
// content_items
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn content_items_insert_and_list_by_job(pool: sqlx::PgPool) {
    let job = create_scheduled_job(&pool, &make_new_job("content owner"))
        .await
        .expect("create job");

    let items: Vec<NewContentItem> = ["tiktok", "instagram"]
        .iter()
        .map(|platform| NewContentItem {
            job_id: Some(job.id),
            niche: "cooking".to_string(),
            platform: (*platform).to_string(),
            tone: "friendly".to_string(),
            template: "recipe_teaser".to_string(),
            model: "claude-sonnet-4".to_string(),
            script: "Hook, steps, payoff.".to_string(),
            caption: "Weeknight pasta, upgraded.".to_string(),
            hashtags: vec!["#cooking".to_string(), "#easyrecipes".to_string()],
            trigger_source: "scheduled".to_string(),
        })
        .collect();

    let inserted = insert_content_items(&pool, &items).await.expect("insert");
    assert_eq!(inserted, 2);

    let listed = list_recent_content(&pool, Some(job.id), 10)
        .await
        .expect("list");
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|i| i.job_id == Some(job.id)));

    let unscoped = list_recent_content(&pool, None, 1).await.expect("list all");
    assert_eq!(unscoped.len(), 1, "limit respected");
}
