//! The cron registry: one live scheduled-trigger handle per active job.
//!
//! An explicit [`Scheduler`] object owns the [`JobScheduler`], the
//! `job id -> cron handle` map, and the in-flight set — constructed once per
//! process, with `register`/`unregister`/`reconcile` as its only mutation
//! entry points. The database row is the durable source of truth; handles
//! are rebuilt from `is_active` rows at boot and have no persistence of
//! their own.

pub mod runner;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use sqlx::PgPool;
use thiserror::Error;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use copychef_core::{parse_timezone, CoreError, ScheduleTime};
use copychef_db::ScheduledJobRow;
use copychef_generator::BulkGenerator;

use runner::{RunError, RunReport};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Invalid(#[from] CoreError),
    #[error(transparent)]
    Cron(#[from] JobSchedulerError),
    #[error(transparent)]
    Db(#[from] copychef_db::DbError),
}

/// Everything a firing job needs, shared between cron callbacks and the
/// manual-trigger path.
pub struct RunContext {
    pool: PgPool,
    generator: Arc<dyn BulkGenerator>,
    webhook_client: reqwest::Client,
    // Overlap policy: a job whose previous run is still in flight skips the
    // new fire instead of queueing or running concurrently.
    in_flight: Mutex<HashSet<i64>>,
}

impl RunContext {
    /// Claim the in-flight slot for a job; `None` means a run is already active.
    fn claim(self: &Arc<Self>, job_id: i64) -> Option<InFlightGuard> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        set.insert(job_id).then(|| InFlightGuard {
            ctx: Arc::clone(self),
            job_id,
        })
    }
}

/// Releases a job's in-flight slot on drop, whatever path the run took.
struct InFlightGuard {
    ctx: Arc<RunContext>,
    job_id: i64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.ctx
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.job_id);
    }
}

/// Owns all live cron handles for this process.
pub struct Scheduler {
    inner: JobScheduler,
    ctx: Arc<RunContext>,
    handles: Mutex<HashMap<i64, Uuid>>,
}

impl Scheduler {
    /// Build and start an empty scheduler. Call [`Scheduler::reconcile`]
    /// afterwards to pick up persisted jobs.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Cron`] if the underlying scheduler cannot be
    /// initialised or started.
    pub async fn new(
        pool: PgPool,
        generator: Arc<dyn BulkGenerator>,
        webhook_client: reqwest::Client,
    ) -> Result<Self, SchedulerError> {
        let inner = JobScheduler::new().await?;
        inner.start().await?;

        Ok(Self {
            inner,
            ctx: Arc::new(RunContext {
                pool,
                generator,
                webhook_client,
                in_flight: Mutex::new(HashSet::new()),
            }),
            handles: Mutex::new(HashMap::new()),
        })
    }

    /// Register (or re-register) the cron handle for a job.
    ///
    /// Any prior handle for the same id is unregistered first, so a job never
    /// has two live timers. The callback re-reads the row on every fire, so
    /// configuration updates take effect without re-registration.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Invalid`] if the stored schedule time or
    /// timezone does not parse, or [`SchedulerError::Cron`] if the handle
    /// cannot be added.
    pub async fn register(&self, job: &ScheduledJobRow) -> Result<(), SchedulerError> {
        self.unregister(job.id).await?;

        let time: ScheduleTime = job.schedule_time.parse()?;
        let tz = parse_timezone(&job.timezone)?;
        let expression = time.cron_expression();

        let job_id = job.id;
        let ctx = Arc::clone(&self.ctx);
        let cron_job = Job::new_async_tz(expression.as_str(), tz, move |_uuid, _lock| {
            let ctx = Arc::clone(&ctx);
            Box::pin(async move {
                runner::run_scheduled(&ctx, job_id).await;
            })
        })?;

        let handle = cron_job.guid();
        self.inner.add(cron_job).await?;
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id, handle);

        tracing::info!(job_id, %expression, timezone = %job.timezone, "scheduler: job registered");
        Ok(())
    }

    /// Stop and drop the handle for a job; no-op when none is registered.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Cron`] if the live handle cannot be removed.
    pub async fn unregister(&self, job_id: i64) -> Result<bool, SchedulerError> {
        let handle = self
            .handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&job_id);

        match handle {
            Some(uuid) => {
                self.inner.remove(&uuid).await?;
                tracing::info!(job_id, "scheduler: job unregistered");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Boot-time pass: register every `is_active` row from the Job Store.
    ///
    /// A row that fails to register (for example a timezone no longer in the
    /// tz database) is logged and skipped rather than aborting the rest.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Db`] if the active-job listing itself fails.
    pub async fn reconcile(&self) -> Result<usize, SchedulerError> {
        let jobs = copychef_db::list_active_jobs(&self.ctx.pool).await?;

        let mut registered = 0;
        for job in &jobs {
            match self.register(job).await {
                Ok(()) => registered += 1,
                Err(e) => {
                    tracing::error!(job_id = job.id, error = %e, "scheduler: failed to register job");
                }
            }
        }
        Ok(registered)
    }

    /// Number of live handles in this process (diagnostic).
    #[must_use]
    pub fn registered_count(&self) -> usize {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether a specific job currently has a live handle.
    #[must_use]
    pub fn is_registered(&self, job_id: i64) -> bool {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&job_id)
    }

    /// Fire the Job Runner for a job outside its schedule.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::NotFound`] for unknown or inactive jobs,
    /// [`RunError::AlreadyRunning`] when the overlap guard rejects the run,
    /// or [`RunError::Db`] if the row cannot be read.
    pub async fn run_now(
        &self,
        job_id: i64,
        trigger: copychef_generator::TriggerSource,
    ) -> Result<RunReport, RunError> {
        runner::execute(&self.ctx, job_id, trigger).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use async_trait::async_trait;
    use copychef_generator::{
        BulkGenerator, GeneratedItem, GenerationOutcome, GenerationRequest, GeneratorError,
        Provider,
    };
    use std::time::Duration;

    /// How a [`StubGenerator`] behaves when asked to generate.
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum StubBehavior {
        /// One item per niche x platform combination.
        Succeed,
        /// The generation call itself errors out.
        Error,
        /// Every combination fails, zero items produced.
        AllCombinationsFail,
        /// Sleep before succeeding, to exercise the overlap guard.
        SlowSucceed(Duration),
    }

    pub(crate) struct StubGenerator {
        pub behavior: StubBehavior,
    }

    #[async_trait]
    impl BulkGenerator for StubGenerator {
        async fn generate(
            &self,
            request: &GenerationRequest,
        ) -> Result<GenerationOutcome, GeneratorError> {
            match self.behavior {
                StubBehavior::Error => Err(GeneratorError::MissingApiKey(Provider::OpenAi)),
                StubBehavior::AllCombinationsFail => Ok(GenerationOutcome {
                    items: vec![],
                    failed: (request.niches.len() * request.platforms.len()) as u32,
                    errors: vec!["stub: provider unavailable".to_string()],
                }),
                StubBehavior::SlowSucceed(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(success_outcome(request))
                }
                StubBehavior::Succeed => Ok(success_outcome(request)),
            }
        }
    }

    fn success_outcome(request: &GenerationRequest) -> GenerationOutcome {
        let model = request
            .ai_models
            .first()
            .cloned()
            .unwrap_or_else(|| "stub-model".to_string());
        let items = request
            .niches
            .iter()
            .flat_map(|niche| {
                let model = model.clone();
                request.platforms.iter().map(move |platform| GeneratedItem {
                    niche: niche.clone(),
                    platform: platform.clone(),
                    tone: request.tones.first().cloned().unwrap_or_default(),
                    template: request.templates.first().cloned().unwrap_or_default(),
                    model: model.clone(),
                    script: "stub script".to_string(),
                    caption: "stub caption".to_string(),
                    hashtags: vec!["#stub".to_string()],
                })
            })
            .collect();
        GenerationOutcome {
            items,
            failed: 0,
            errors: vec![],
        }
    }
}
