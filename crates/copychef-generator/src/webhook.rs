//! Webhook delivery of run summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::TriggerSource;
use crate::GeneratorError;

/// The JSON payload posted to a job's webhook after a run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub job_id: Option<i64>,
    pub trigger_source: TriggerSource,
    pub generated: usize,
    pub failed: u32,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// POST a run summary to `url`.
///
/// Delivery failure is the caller's to log; it never fails the run itself.
///
/// # Errors
///
/// Returns [`GeneratorError::Http`] on network failure or a non-2xx response.
pub async fn deliver_run_summary(
    client: &reqwest::Client,
    url: &str,
    summary: &RunSummary,
) -> Result<(), GeneratorError> {
    client
        .post(url)
        .json(summary)
        .send()
        .await?
        .error_for_status()?;
    Ok(())
}
