//! Report version stamps

use crate::prompts::prompt_version;
use chrono::{DateTime, Utc};
use premortem_catalog::{CatalogHash, PatternRegistry};
use serde::{Deserialize, Serialize};

/// Engine version recorded on every report
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything needed to reproduce a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionStamp {
    /// Content hash of the loaded catalog
    pub catalog_hash: CatalogHash,
    /// Catalog's self-declared version, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_version: Option<String>,
    /// Completion model id
    pub model_id: String,
    /// Prompt template version
    pub prompt_version: String,
    /// Engine version
    pub engine_version: String,
    /// When the analysis ran
    pub generated_at: DateTime<Utc>,
}

impl VersionStamp {
    /// Stamp for `registry` and `model_id`, timestamped now
    #[must_use]
    pub fn capture(registry: &PatternRegistry, model_id: &str) -> Self {
        Self {
            catalog_hash: registry.hash(),
            catalog_version: registry.version().map(str::to_string),
            model_id: model_id.to_string(),
            prompt_version: prompt_version().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            generated_at: Utc::now(),
        }
    }

    /// True when two stamps describe the same catalog, model and prompts
    #[must_use]
    pub fn same_inputs(&self, other: &Self) -> bool {
        self.catalog_hash == other.catalog_hash
            && self.model_id == other.model_id
            && self.prompt_version == other.prompt_version
            && self.engine_version == other.engine_version
    }
}
