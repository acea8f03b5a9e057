//! Scan configuration
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! page_size = 30
//! reference_kinds = ["entity_reference", "entity_reference_revisions"]
//! additional_exclusions = ["media.thumbnail"]
//! ```

use refscan_host::ENTITY_REFERENCE;
use refscan_topology::{ExcludedField, ExclusionList, ResolverOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Entities loaded and checked per scan step
pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Not valid TOML for a scan config
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Parsed but unusable
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Scan configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanConfig {
    /// Entities loaded per step
    pub page_size: usize,

    /// Field kinds holding entity references
    pub reference_kinds: Vec<String>,

    /// Pairs excluded on top of the built-in known anomalies
    pub additional_exclusions: Vec<ExcludedField>,
}

impl ScanConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With page size
    #[inline]
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// With an additional reference field kind
    #[must_use]
    pub fn with_reference_kind(mut self, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        if !self.reference_kinds.contains(&kind) {
            self.reference_kinds.push(kind);
        }
        self
    }

    /// With an additional excluded pair
    #[must_use]
    pub fn with_exclusion(mut self, entry: ExcludedField) -> Self {
        self.additional_exclusions.push(entry);
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns error on malformed TOML or invalid values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the scan cannot run with
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] describing the first bad value
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.reference_kinds.is_empty() {
            return Err(ConfigError::Invalid(
                "reference_kinds must name at least one field kind".into(),
            ));
        }
        Ok(())
    }

    /// Topology resolver options for this configuration
    #[must_use]
    pub fn resolver_options(&self) -> ResolverOptions {
        let exclusions = self
            .additional_exclusions
            .iter()
            .cloned()
            .fold(ExclusionList::default(), ExclusionList::with);
        ResolverOptions {
            kinds: self.reference_kinds.clone(),
            exclusions,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            reference_kinds: vec![ENTITY_REFERENCE.to_string()],
            additional_exclusions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = ScanConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.page_size, 30);
    }

    #[test]
    fn parses_all_keys() {
        let config = ScanConfig::from_toml_str(
            r#"
            page_size = 50
            reference_kinds = ["entity_reference", "entity_reference_revisions"]
            additional_exclusions = ["media.thumbnail"]
            "#,
        )
        .unwrap();

        assert_eq!(config.page_size, 50);
        assert_eq!(config.reference_kinds.len(), 2);

        let options = config.resolver_options();
        assert!(options.exclusions.contains("media", "thumbnail"));
        assert!(options.exclusions.contains("comment", "entity_id"));
    }

    #[test]
    fn rejects_zero_page_size() {
        assert!(matches!(
            ScanConfig::from_toml_str("page_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            ScanConfig::from_toml_str("probe_limit = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn rejects_malformed_exclusion() {
        assert!(matches!(
            ScanConfig::from_toml_str(r#"additional_exclusions = ["nodot"]"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refscan.toml");
        std::fs::write(&path, "page_size = 5").unwrap();

        assert_eq!(ScanConfig::load(&path).unwrap().page_size, 5);
        assert!(matches!(
            ScanConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
