//! Analysis configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::matcher::DEFAULT_MAX_GROUP_DEPTH;
use crate::{Error, Result, Vendor};

/// Default outer-rule batch size of the parallel sweeps.
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default per-row resolver deadline in milliseconds.
pub const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 5000;

/// Configuration for normalization and analysis runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Vendor the rules were exported from
    pub vendor: Vendor,

    /// Outer rules per parallel batch; cancellation is checked between batches
    pub batch_size: usize,

    /// Dedicated worker threads (None uses the global rayon pool)
    pub threads: Option<usize>,

    /// Per-row deadline for object resolution, in milliseconds
    pub resolver_timeout_ms: u64,

    /// Maximum nesting depth of object groups
    pub max_group_depth: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            vendor: Vendor::Default,
            batch_size: DEFAULT_BATCH_SIZE,
            threads: None,
            resolver_timeout_ms: DEFAULT_RESOLVER_TIMEOUT_MS,
            max_group_depth: DEFAULT_MAX_GROUP_DEPTH,
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a YAML config.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        if self.threads == Some(0) {
            return Err(Error::Config("threads must be at least 1".to_string()));
        }
        if self.max_group_depth == 0 {
            return Err(Error::Config("max_group_depth must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_vendor(mut self, vendor: Vendor) -> Self {
        self.vendor = vendor;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Resolver deadline as a duration.
    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.batch_size, 64);
        assert_eq!(config.threads, None);
        assert_eq!(config.resolver_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_group_depth, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let config = AnalysisConfig::from_yaml_str("vendor: paloalto\nthreads: 4\n").unwrap();
        assert_eq!(config.vendor, Vendor::PaloAlto);
        assert_eq!(config.threads, Some(4));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            AnalysisConfig::from_yaml_str("batch_size: 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_yaml_str("threads: 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AnalysisConfig::from_yaml_str("batch_size: [1]"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "vendor: ngf").unwrap();
        writeln!(file, "resolver_timeout_ms: 250").unwrap();

        let config = AnalysisConfig::from_path(file.path()).unwrap();
        assert_eq!(config.vendor, Vendor::Ngf);
        assert_eq!(config.resolver_timeout(), Duration::from_millis(250));

        assert!(matches!(
            AnalysisConfig::from_path(Path::new("/nonexistent/fwaudit.yaml")),
            Err(Error::Io(_))
        ));
    }
}
