//! Domain types and configuration shared across the copychef workspace:
//! schedule-time parsing, next-run computation, AI-model selection
//! normalization, and env-driven application config.

pub mod app_config;
pub mod config;
pub mod models;
pub mod schedule;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use models::{normalize_model_selection, ModelSelection};
pub use schedule::{parse_timezone, ScheduleTime};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid schedule time '{0}': expected HH:MM")]
    InvalidScheduleTime(String),
    #[error("unknown timezone '{0}'")]
    UnknownTimezone(String),
    #[error("ai model selection must contain at least one model")]
    EmptyModelSelection,
}
