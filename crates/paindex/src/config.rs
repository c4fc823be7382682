//! Run configuration loaded from TOML.

use crate::universe::reference::ReferenceSpec;
use chrono::NaiveDate;
use paindex_data::DateRange;
use paindex_data::eod::DEFAULT_PREFIX;
use paindex_output::ExportFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("IO error reading {path}: {error}")]
    Io {
        /// Path being read
        path: PathBuf,
        /// Underlying error
        error: std::io::Error,
    },

    /// TOML could not be parsed.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Values are inconsistent.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

fn default_name() -> String {
    "PA Index".to_string()
}

const fn default_base_value() -> f64 {
    100.0
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

const fn default_true() -> bool {
    true
}

/// Daily EOD file feed settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EodConfig {
    /// Directory holding extracted daily files.
    pub dir: PathBuf,
    /// File-name prefix before the date.
    #[serde(default = "default_prefix")]
    pub file_prefix: String,
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory for written files.
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// File format.
    #[serde(default)]
    pub format: ExportFormat,
    /// Also write the divisor audit and deletion-adjusted matrices.
    #[serde(default = "default_true")]
    pub include_audit: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            format: ExportFormat::default(),
            include_audit: true,
        }
    }
}

/// Snapshot store settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite file; the platform cache directory is used when absent.
    pub path: Option<PathBuf>,
}

/// One chained segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Label used in logs and output.
    pub name: String,
    /// First date (inclusive).
    pub start: NaiveDate,
    /// Last date (inclusive).
    pub end: NaiveDate,
    /// Constituent reference for the segment.
    pub reference: ReferenceSpec,
}

impl SegmentConfig {
    /// Window as a [`DateRange`].
    pub fn range(&self) -> Result<DateRange> {
        DateRange::new(self.start, self.end).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Index name.
    #[serde(default = "default_name")]
    pub name: String,
    /// Level of the first segment on its first date.
    #[serde(default = "default_base_value")]
    pub base_index_value: f64,
    /// Daily file feed.
    pub eod: Option<EodConfig>,
    /// Output settings.
    #[serde(default)]
    pub output: OutputConfig,
    /// Snapshot store.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Segments in date order.
    pub segments: Vec<SegmentConfig>,
}

impl IndexConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file.
    ///
    /// Relative paths inside the file are resolved against the file's own
    /// directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.to_path_buf(),
            error,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        if !self.base_index_value.is_finite() || self.base_index_value <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "base_index_value must be finite and > 0, got {}",
                self.base_index_value
            )));
        }
        if self.segments.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one segment is required".to_string(),
            ));
        }

        for segment in &self.segments {
            if segment.start > segment.end {
                return Err(ConfigError::Invalid(format!(
                    "segment '{}' starts {} after it ends {}",
                    segment.name, segment.start, segment.end
                )));
            }
            if segment.reference.top_n == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "segment '{}' has top_n = 0",
                    segment.name
                )));
            }
        }

        for pair in self.segments.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.start < prev.end {
                return Err(ConfigError::Invalid(format!(
                    "segment '{}' overlaps '{}' (only a shared boundary date is allowed)",
                    next.name, prev.name
                )));
            }
        }

        Ok(())
    }

    /// Window covering every segment.
    pub fn full_range(&self) -> Result<DateRange> {
        let start = self.segments.iter().map(|s| s.start).min();
        let end = self.segments.iter().map(|s| s.end).max();
        match (start, end) {
            (Some(start), Some(end)) => {
                DateRange::new(start, end).map_err(|e| ConfigError::Invalid(e.to_string()))
            }
            _ => Err(ConfigError::Invalid("no segments configured".to_string())),
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        if let Some(eod) = self.eod.as_mut() {
            resolve(&mut eod.dir);
        }
        resolve(&mut self.output.dir);
        if let Some(path) = self.cache.path.as_mut() {
            resolve(path);
        }
        for segment in &mut self.segments {
            resolve(&mut segment.reference.path);
        }
    }
}
