//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/mscalls/mscalls.toml`
//! 3. Explicit config file passed to [`Settings::load`]
//! 4. Environment variables: `MSCALLS_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Run taxa and per-species fetches on a rayon pool
    pub parallel: bool,
    /// Size of the dedicated pool (default: rayon's choice)
    pub max_threads: Option<usize>,
    /// Only use trusted anatomical similarity annotations
    pub trusted_similarities_only: bool,
    /// TOML data snapshot backing the in-memory collaborators
    pub snapshot: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallel: true,
            max_threads: None,
            trusted_similarities_only: true,
            snapshot: None,
        }
    }
}

/// Raw settings for intermediate parsing (Option = "not specified in this layer").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub parallel: Option<bool>,
    pub max_threads: Option<usize>,
    pub trusted_similarities_only: Option<bool>,
    pub snapshot: Option<PathBuf>,
}

/// Get the XDG config directory for mscalls.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mscalls").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("mscalls.toml"))
}

/// Expand `~`, `$VAR` and `${VAR}` in a path string.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            parallel: overlay.parallel.unwrap_or(self.parallel),
            max_threads: overlay.max_threads.or(self.max_threads),
            trusted_similarities_only: overlay
                .trusted_similarities_only
                .unwrap_or(self.trusted_similarities_only),
            snapshot: overlay.snapshot.clone().or_else(|| self.snapshot.clone()),
        }
    }

    fn expand_paths(&mut self) {
        if let Some(snapshot) = &self.snapshot {
            let expanded = expand_env_vars(snapshot.to_string_lossy().as_ref());
            self.snapshot = Some(PathBuf::from(expanded));
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `config_file` - Optional explicit config file, applied over the global one
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/mscalls/mscalls.toml`
    /// 3. `config_file` (must exist when given)
    /// 4. Environment variables: `MSCALLS_*` prefix
    pub fn load(config_file: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        if let Some(path) = config_file {
            let raw = load_raw_settings(path)?;
            current = current.merge_with(&raw);
        }

        current = Self::apply_env_overrides(current)?;
        current.validate()?;
        current.expand_paths();

        Ok(current)
    }

    /// Apply MSCALLS_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("MSCALLS").try_parsing(true))
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_bool("parallel") {
            settings.parallel = val;
        }
        if let Ok(val) = config.get_int("max_threads") {
            let threads = usize::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("MSCALLS_MAX_THREADS must be positive, got {}", val),
            })?;
            settings.max_threads = Some(threads);
        }
        if let Ok(val) = config.get_bool("trusted_similarities_only") {
            settings.trusted_similarities_only = val;
        }
        if let Ok(val) = config.get_string("snapshot") {
            settings.snapshot = Some(PathBuf::from(val));
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.max_threads == Some(0) {
            return Err(ApplicationError::Config {
                message: "max_threads must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Serialize current settings to TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize settings: {}", e),
        })
    }

    /// Commented template for a new config file.
    pub fn template() -> String {
        r#"# mscalls configuration
# Precedence: defaults < global (~/.config/mscalls/mscalls.toml) < explicit file < MSCALLS_* env

# Run taxa and per-species call fetches in parallel
parallel = true

# Worker threads for the parallel pool (omit for one per CPU)
# max_threads = 8

# Only use trusted anatomical similarity annotations
trusted_similarities_only = true

# TOML data snapshot for the in-memory collaborators
# snapshot = "~/data/mscalls-snapshot.toml"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
