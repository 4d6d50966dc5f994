//! Request and result types for a single bulk-generation run.

use serde::{Deserialize, Serialize};

/// Provenance marker: who asked for this run.
///
/// Carried on every request so downstream logic (and persisted content rows)
/// can distinguish scheduled/automated runs from direct manual submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Manual,
    Scheduled,
}

impl TriggerSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TriggerSource::Manual => "manual",
            TriggerSource::Scheduled => "scheduled",
        }
    }
}

impl std::fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully-resolved request for one bulk-generation run.
///
/// `ai_models` is always a non-empty list — scalar inputs are normalized at
/// the API boundary, so manual and scheduled runs can no longer disagree
/// about the model in use.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The stored job this run belongs to; `None` for one-off manual runs.
    pub job_id: Option<i64>,
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
    pub trigger_source: TriggerSource,
}

/// One generated piece of content for a niche x platform combination.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedItem {
    pub niche: String,
    pub platform: String,
    pub tone: String,
    pub template: String,
    pub model: String,
    pub script: String,
    pub caption: String,
    pub hashtags: Vec<String>,
}

/// Structured result of one run: generated items plus per-combination failures.
#[derive(Debug, Default)]
pub struct GenerationOutcome {
    pub items: Vec<GeneratedItem>,
    pub failed: u32,
    pub errors: Vec<String>,
}

impl GenerationOutcome {
    #[must_use]
    pub fn generated(&self) -> usize {
        self.items.len()
    }

    /// A run counts as successful when at least one item was produced and
    /// nothing failed outright with zero output.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.items.is_empty() || self.failed == 0
    }
}
