//! apidiff configuration loading from `.apidiff.toml`.
//!
//! The file is optional and lives in the repository root. Every section may be
//! omitted; command-line flags override whatever the file sets.
//!
//! # Example Configuration
//!
//! ```toml
//! [policy]
//! field_order = "keyed"            # or "positional"
//! interface_additions = "consumed" # or "implemented"
//!
//! [scanner]
//! include_internal = false
//! ignore = ["vendor/", "examples/"]
//! goos = "linux"                   # platform files are selected for
//! goarch = "amd64"
//! cgo = false
//! tags = ["integration"]
//!
//! [output]
//! format = "text"                  # text | json | markdown
//! color = true
//!
//! [engine]
//! threads = 4
//! ```

use apidiff_core::{DiffPolicy, ScanOptions};
use serde::Deserialize;
use std::path::Path;

/// Name of the configuration file looked up in the repository root.
pub const CONFIG_FILE: &str = ".apidiff.toml";

/// Root configuration structure loaded from `.apidiff.toml`.
#[derive(Debug, Deserialize, Default)]
pub struct ApidiffConfig {
    /// Compatibility rules the comparator applies.
    #[serde(default)]
    pub policy: DiffPolicy,

    /// Which packages take part in a comparison.
    #[serde(default)]
    pub scanner: ScanOptions,

    /// Output formatting preferences.
    #[serde(default)]
    pub output: OutputSettings,

    #[serde(default)]
    pub engine: EngineConfig,
}

/// Output formatting preferences.
///
/// Distinct from the runtime `OutputConfig` in the output module, which
/// handles actual rendering.
#[derive(Debug, Deserialize, Default)]
pub struct OutputSettings {
    /// Default output format: `text`, `json` or `markdown`.
    #[serde(default)]
    pub format: Option<String>,

    /// Whether to use colored output. Unset means auto-detect from the TTY.
    #[serde(default)]
    pub color: Option<bool>,
}

/// Comparison engine settings.
#[derive(Debug, Deserialize, Default)]
pub struct EngineConfig {
    /// Worker threads for package comparison; unset uses one per core.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl ApidiffConfig {
    /// Load configuration from `.apidiff.toml` in the given directory.
    ///
    /// A missing file yields defaults. Read and parse errors are logged as
    /// warnings and also yield defaults.
    pub fn load(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse {}: {}", CONFIG_FILE, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read {}: {}", CONFIG_FILE, e);
                }
            }
        }
        Self::default()
    }

    /// Get the default output format, if configured.
    pub fn default_format(&self) -> Option<&str> {
        self.output.format.as_deref()
    }

    /// Configured color preference, or `None` to auto-detect.
    pub fn use_color(&self) -> Option<bool> {
        self.output.color
    }

    pub fn threads(&self) -> Option<usize> {
        self.engine.threads
    }
}
