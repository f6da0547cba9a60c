//! Session configuration
//!
//! Read from TOML; the four display options can be overridden through
//! `PROVLAB_*` environment variables. Unknown keys are rejected so typos do
//! not silently fall back to defaults.

use prov_recorder::RecorderSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// User options and recorder tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvConfig {
    /// Draw import edges in the graph
    pub render_imports: bool,
    /// Centre the graph on a cell when it is selected in the notebook
    pub zoom_on_select: bool,
    /// Seed renders with the cursor's execution only
    pub show_last_execution: bool,
    /// Re-render whenever the store changes
    pub render_on_update: bool,
    pub analysis_timeout_ms: u64,
    pub sequence_timeout_ms: u64,
    pub analysis_cache_capacity: u64,
    pub user_agent: String,
}

impl Default for ProvConfig {
    fn default() -> Self {
        Self {
            render_imports: false,
            zoom_on_select: true,
            show_last_execution: false,
            render_on_update: true,
            analysis_timeout_ms: 5_000,
            sequence_timeout_ms: 30_000,
            analysis_cache_capacity: 10_000,
            user_agent: format!("provlab/{}", crate::VERSION),
        }
    }
}

impl ProvConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// `ConfigError::Parse` on malformed TOML or unknown keys
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from `path` and apply environment overrides
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, `ConfigError::Parse` if
    /// it is not a valid config
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        config.apply_env_overrides();
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply `PROVLAB_*` overrides from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`; unparsable values are ignored
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        let flags: [(&str, &mut bool); 4] = [
            ("PROVLAB_RENDER_IMPORTS", &mut self.render_imports),
            ("PROVLAB_ZOOM_ON_SELECT", &mut self.zoom_on_select),
            ("PROVLAB_SHOW_LAST_EXECUTION", &mut self.show_last_execution),
            ("PROVLAB_RENDER_ON_UPDATE", &mut self.render_on_update),
        ];
        for (key, slot) in flags {
            let Some(raw) = lookup(key) else {
                continue;
            };
            match parse_flag(&raw) {
                Some(value) => *slot = value,
                None => tracing::warn!("invalid {}, ignoring: {:?}", key, raw),
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn with_render_imports(mut self, enabled: bool) -> Self {
        self.render_imports = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_zoom_on_select(mut self, enabled: bool) -> Self {
        self.zoom_on_select = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_show_last_execution(mut self, enabled: bool) -> Self {
        self.show_last_execution = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_render_on_update(mut self, enabled: bool) -> Self {
        self.render_on_update = enabled;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_analysis_timeout_ms(mut self, millis: u64) -> Self {
        self.analysis_timeout_ms = millis;
        self
    }

    /// Recorder tuning derived from this config
    #[must_use]
    pub fn recorder_settings(&self) -> RecorderSettings {
        RecorderSettings::default()
            .with_analysis_timeout(Duration::from_millis(self.analysis_timeout_ms))
            .with_sequence_timeout(Some(Duration::from_millis(self.sequence_timeout_ms)))
            .with_cache_capacity(self.analysis_cache_capacity)
            .with_user_agent(self.user_agent.clone())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
