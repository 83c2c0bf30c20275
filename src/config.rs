//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/scopetree/scopetree.toml`
//! 3. Explicit config file (`--config`)
//! 4. Environment variables: `SCOPETREE_*` prefix, `__` between nested keys

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{PresentationBehavior, RenderOptions, RetryBehavior};

/// How trees are printed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RenderSettings {
    /// Label nodes by tag (otherwise by node id)
    pub show_tags: bool,
    /// List failure descriptions next to each node
    pub show_errors: bool,
    /// Maximum failure descriptions listed per node
    pub max_errors: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        let options = RenderOptions::default();
        Self {
            show_tags: options.show_tags,
            show_errors: options.show_errors,
            max_errors: options.max_errors,
        }
    }
}

impl From<RenderSettings> for RenderOptions {
    fn from(value: RenderSettings) -> Self {
        Self {
            show_tags: value.show_tags,
            show_errors: value.show_errors,
            max_errors: value.max_errors,
        }
    }
}

/// Raw render settings for intermediate parsing (None → inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawRenderSettings {
    pub show_tags: Option<bool>,
    pub show_errors: Option<bool>,
    pub max_errors: Option<usize>,
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub default_presentation: Option<PresentationBehavior>,
    pub default_retry: Option<RetryBehavior>,
    pub render: RawRenderSettings,
}

/// Unified configuration for scopetree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Settings {
    /// Presentation behavior for scenario scopes that don't declare one
    pub default_presentation: PresentationBehavior,
    /// Retry behavior for scenario scopes that don't declare one
    pub default_retry: RetryBehavior,
    pub render: RenderSettings,
}

/// Get the XDG config directory for scopetree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "scopetree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("scopetree.toml"))
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

impl RenderSettings {
    fn merge(&self, overlay: &RawRenderSettings) -> Self {
        Self {
            show_tags: overlay.show_tags.unwrap_or(self.show_tags),
            show_errors: overlay.show_errors.unwrap_or(self.show_errors),
            max_errors: overlay.max_errors.unwrap_or(self.max_errors),
        }
    }
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            default_presentation: overlay
                .default_presentation
                .unwrap_or(self.default_presentation),
            default_retry: overlay.default_retry.unwrap_or(self.default_retry),
            render: self.render.merge(&overlay.render),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `explicit` - Optional config file given on the command line; must exist
    pub fn load(explicit: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                current = current.merge_with(&load_raw_settings(&global_path)?);
            }
        }

        if let Some(path) = explicit {
            current = current.merge_with(&load_raw_settings(path)?);
        }

        Self::apply_env_overrides(current, env_source())
    }

    /// Load from one file on top of defaults, ignoring global config and env.
    pub fn from_file(path: &Path) -> Result<Self, ApplicationError> {
        Ok(Self::default().merge_with(&load_raw_settings(path)?))
    }

    /// Apply SCOPETREE_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self, env: Environment) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(env)
            .build()
            .map_err(config_err)?;

        if let Some(val) = env_value(config.get_string("default_presentation"))? {
            settings.default_presentation = val.parse().map_err(|e| ApplicationError::Config {
                message: format!("SCOPETREE_DEFAULT_PRESENTATION: {e}"),
            })?;
        }
        if let Some(val) = env_value(config.get_string("default_retry"))? {
            settings.default_retry = val.parse().map_err(|e| ApplicationError::Config {
                message: format!("SCOPETREE_DEFAULT_RETRY: {e}"),
            })?;
        }
        if let Some(val) = env_value(config.get_bool("render.show_tags"))? {
            settings.render.show_tags = val;
        }
        if let Some(val) = env_value(config.get_bool("render.show_errors"))? {
            settings.render.show_errors = val;
        }
        if let Some(val) = env_value(config.get_int("render.max_errors"))? {
            settings.render.max_errors = usize::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("SCOPETREE_RENDER__MAX_ERRORS: invalid value {val}"),
            })?;
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# scopetree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/scopetree/scopetree.toml
#   File:   --config <path>
#   Env:    SCOPETREE_* environment variables (SCOPETREE_RENDER__MAX_ERRORS=5)

# Behaviors for scenario scopes that don't declare their own
# default_presentation = "accepts-suppression"   # or "prefers-display"
# default_retry = "ancestor"                      # or "descendants", "siblings"

[render]
# show_tags = true
# show_errors = true
# max_errors = 3
"#
        .to_string()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("SCOPETREE")
        .prefix_separator("_")
        .separator("__")
}

/// Unset variables are `None`; unparsable ones are errors.
fn env_value<T>(result: Result<T, ConfigError>) -> Result<Option<T>, ApplicationError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
