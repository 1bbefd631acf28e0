//! TOML settings file
//!
//! ```toml
//! [backend]
//! base_url = "http://localhost:11434"
//! model = "llama3"
//!
//! [analysis.semantic]
//! max_concurrency = 4
//! request_deadline_ms = 120000
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use anyhow::{Context, Result};
use premortem_core::AnalysisConfig;
use premortem_llm::OllamaConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Backend and analysis settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct Settings {
    /// Completion backend
    pub(crate) backend: OllamaConfig,
    /// Engine configuration
    pub(crate) analysis: AnalysisConfig,
}

impl Settings {
    pub(crate) fn from_toml_str(source: &str) -> Result<Self> {
        let settings: Self = toml::from_str(source).context("invalid settings")?;
        settings
            .analysis
            .validate()
            .context("inconsistent [analysis] settings")?;
        Ok(settings)
    }

    pub(crate) fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&source).with_context(|| format!("loading settings from {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use premortem_core::MissingSemanticPolicy;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Settings::from_toml_str("").unwrap(), Settings::default());
    }

    #[test]
    fn partial_sections_merge_over_defaults() {
        let settings = Settings::from_toml_str(
            r#"
            [backend]
            model = "qwen2.5:14b"

            [analysis.semantic]
            max_concurrency = 2

            [analysis.semantic.retry]
            max_retries = 0

            [analysis.scoring]
            missing_semantic = "drop"
            "#,
        )
        .unwrap();

        assert_eq!(settings.backend.model, "qwen2.5:14b");
        assert_eq!(settings.backend.base_url, OllamaConfig::default().base_url);
        assert_eq!(settings.analysis.semantic.max_concurrency, 2);
        assert_eq!(settings.analysis.semantic.retry.max_retries, 0);
        assert_eq!(
            settings.analysis.semantic.call_timeout_ms,
            AnalysisConfig::default().semantic.call_timeout_ms
        );
        assert_eq!(settings.analysis.scoring.missing_semantic, MissingSemanticPolicy::Drop);
    }

    #[test]
    fn inconsistent_analysis_settings_are_rejected() {
        let err = Settings::from_toml_str("[analysis.semantic]\nmax_concurrency = 0\n").unwrap_err();
        assert!(format!("{err:#}").contains("max_concurrency"));
    }

    #[test]
    fn unknown_top_level_tables_are_rejected() {
        assert!(Settings::from_toml_str("[server]\nport = 1\n").is_err());
    }

    #[test]
    fn load_reports_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend\nmodel = ").unwrap();
        let err = Settings::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains(&file.path().display().to_string()));
    }
}
