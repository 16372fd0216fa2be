//! Renderer configuration module.
//!
//! Handles loading, validating, and merging `manrender.toml`. Stock defaults
//! are overridden by the user's config file, which in turn is overridden by
//! command-line flags (applied in `main.rs`).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! serving_dir = "/srv/man"   # Root of the suite/package tree
//! suites = []                # Recognized suites (empty = every directory)
//! only_render = []           # Restrict rendering to these binary packages
//! # package_versions = "/var/lib/manrender/versions.json"
//!
//! [processing]
//! max_workers = 8            # Concurrent render workers (omit for auto = CPU cores)
//!
//! [logging]
//! level = "info"             # trace | debug | info | warn | error
//! format = "compact"         # compact | json
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! suites = ["bookworm", "trixie"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILENAME: &str = "manrender.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Renderer configuration loaded from `manrender.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Root of the serving tree (`<suite>/<package>/<page>.gz`).
    pub serving_dir: PathBuf,
    /// Suites to render. Empty means every directory under `serving_dir`.
    pub suites: Vec<String>,
    /// Binary packages to restrict rendering to. Empty means all.
    pub only_render: Vec<String>,
    /// JSON file mapping `"suite/package"` to the package version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_versions: Option<PathBuf>,
    /// Worker pool settings.
    pub processing: ProcessingConfig,
    /// Diagnostic logging settings.
    pub logging: LoggingConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            serving_dir: PathBuf::from("/srv/man"),
            suites: Vec::new(),
            only_render: Vec::new(),
            package_versions: None,
            processing: ProcessingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl RenderConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.serving_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "serving_dir must not be empty".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be at least 1".into(),
            ));
        }
        if let Some(bad) = self
            .suites
            .iter()
            .find(|s| s.is_empty() || s.contains('/'))
        {
            return Err(ConfigError::Validation(format!(
                "suites: invalid suite name {bad:?}"
            )));
        }
        Ok(())
    }
}

/// Worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Number of concurrent render workers.
    /// When absent, defaults to the number of CPU cores.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `n` (rendering is partly I/O bound, so more workers
///   than cores is allowed)
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.unwrap_or(cores).max(1)
}

/// Severity threshold for diagnostic logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::level_filters::LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Diagnostic logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(RenderConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<RenderConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: RenderConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or from `manrender.toml` in the working
/// directory when no path is given.
///
/// An explicitly named file must exist; the implicit one is optional.
pub fn load_config(path: Option<&Path>) -> Result<RenderConfig, ConfigError> {
    let overlay = match path {
        Some(p) => match load_raw_config(p)? {
            Some(v) => Some(v),
            None => {
                return Err(ConfigError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("config file not found: {}", p.display()),
                )));
            }
        },
        None => load_raw_config(Path::new(CONFIG_FILENAME))?,
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Returns a fully-commented stock `manrender.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# manrender Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# Root of the serving tree. Layout:
#   <serving_dir>/<suite>/<binary package>/<name>.<section>[.<lang>].gz
serving_dir = "/srv/man"

# Suites to render. An empty list renders every directory found under
# serving_dir.
suites = []

# Restrict document and index rendering to these binary packages.
# Suite listings still include every package. Empty renders everything.
only_render = []

# JSON object mapping "suite/package" to the package version, shown on
# rendered pages and in the variants navigation.
# package_versions = "/var/lib/manrender/versions.json"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Number of concurrent render workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_workers = 8

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# trace | debug | info | warn | error. RUST_LOG overrides this.
level = "info"

# compact (human readable) | json (one object per line)
format = "compact"
"##
}
