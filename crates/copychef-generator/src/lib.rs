//! Bulk content generation: one item per niche x platform combination,
//! produced by a third-party LLM provider behind the [`BulkGenerator`] trait.
//!
//! The entry point is a plain typed function — both the HTTP API and the
//! scheduler call [`BulkGenerator::generate`] with a [`GenerationRequest`]
//! directly; there is no transport-layer object to fake.

mod pipeline;
mod prompt;
mod provider;
mod types;
mod webhook;

pub use pipeline::{BulkGenerator, LlmBulkGenerator};
pub use provider::{Provider, ProviderClient, ProviderKeys};
pub use types::{GeneratedItem, GenerationOutcome, GenerationRequest, TriggerSource};
pub use webhook::{deliver_run_summary, RunSummary};

use thiserror::Error;

/// Errors from the generation pipeline and its provider clients.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// No API key configured for the provider a model routes to.
    #[error("no API key configured for provider {0}")]
    MissingApiKey(Provider),

    /// The provider returned a non-2xx status with a message body.
    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: Provider,
        status: u16,
        message: String,
    },

    /// The response body could not be deserialized into the expected shape.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The provider answered but the completion text was empty.
    #[error("{0} returned an empty completion")]
    EmptyCompletion(Provider),

    /// The request carried no models; normalization should prevent this.
    #[error("generation request has no ai model selected")]
    NoModelSelected,

    /// A provider base URL could not be parsed at client construction.
    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),
}
