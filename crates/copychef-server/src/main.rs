mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, default_rate_limit_state, AppState},
    middleware::AuthState,
    scheduler::Scheduler,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(copychef_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = copychef_db::PoolConfig::from_app_config(&config);
    let pool = copychef_db::connect_pool(&config.database_url, pool_config).await?;
    copychef_db::run_migrations(&pool).await?;

    let provider_keys = copychef_generator::ProviderKeys::from_app_config(&config);
    let provider_client = copychef_generator::ProviderClient::new(
        provider_keys,
        config.generator_request_timeout_secs,
    )?;
    let generator = Arc::new(copychef_generator::LlmBulkGenerator::new(
        provider_client,
        config.generator_max_concurrent_items,
    ));

    let webhook_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.webhook_timeout_secs))
        .build()?;

    let scheduler = Arc::new(Scheduler::new(pool.clone(), generator, webhook_client).await?);
    let registered = scheduler.reconcile().await?;
    tracing::info!(registered, "scheduler: reconciled active jobs from store");

    let auth = AuthState::from_env(matches!(
        config.env,
        copychef_core::Environment::Development
    ))?;
    let app = build_app(
        AppState {
            pool,
            scheduler: Arc::clone(&scheduler),
        },
        auth,
        default_rate_limit_state(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
