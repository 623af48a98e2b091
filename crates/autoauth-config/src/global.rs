//! Global configuration for autoauth
//!
//! Located at `~/.config/autoauth/config.toml` (or `$AUTOAUTH_CONFIG`)

use crate::{ConfigError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "AUTOAUTH_CONFIG";

/// Global autoauth configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub defaults: DefaultsConfig,
    pub credentials: CredentialsConfig,
    pub prompts: PromptsConfig,
    /// Ordered pattern table. The first pattern matching a path wins.
    pub patterns: Vec<PatternEntry>,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Line terminator appended to every automatic answer
    pub line_terminator: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            line_terminator: "\n".to_string(),
        }
    }
}

/// Credential backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// netrc/authinfo files searched in order (tilde-expanded)
    pub authinfo_files: Vec<String>,
    /// External credential helper command, invoked as `<helper> get`
    pub helper: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            authinfo_files: vec!["~/.authinfo".to_string(), "~/.netrc".to_string()],
            helper: None,
        }
    }
}

/// Prompt classification overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    /// Regex recognising a secret (password/passphrase) prompt
    pub password: Option<String>,
    /// Regex recognising a yes/no confirmation prompt
    pub confirmation: Option<String>,
}

/// One `[[patterns]]` entry: a path regex and the credential query it maps to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternEntry {
    pub pattern: String,
    #[serde(default)]
    pub spec: BTreeMap<String, String>,
}

impl PatternEntry {
    pub fn new(pattern: impl Into<String>, spec: BTreeMap<String, String>) -> Self {
        Self {
            pattern: pattern.into(),
            spec,
        }
    }
}

impl GlobalConfig {
    /// Load global configuration from the default path
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load global configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
            path: path.to_path_buf(),
            source: e,
        })?;

        tracing::debug!(
            "Loaded config from {:?}: {} pattern(s)",
            path,
            config.patterns.len()
        );

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Ok(PathBuf::from(path));
            }
        }
        let dirs = ProjectDirs::from("", "", "autoauth").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Append a pattern to the end of the table
    pub fn add_pattern(&mut self, pattern: impl Into<String>, spec: BTreeMap<String, String>) {
        self.patterns.push(PatternEntry::new(pattern, spec));
    }

    /// Remove the first entry whose pattern text equals `pattern`
    pub fn remove_pattern(&mut self, pattern: &str) -> Result<PatternEntry> {
        let index = self.position(pattern)?;
        Ok(self.patterns.remove(index))
    }

    /// Move the entry for `pattern` to `index` (clamped to the table length)
    pub fn move_pattern(&mut self, pattern: &str, index: usize) -> Result<()> {
        let from = self.position(pattern)?;
        let entry = self.patterns.remove(from);
        let to = index.min(self.patterns.len());
        self.patterns.insert(to, entry);
        Ok(())
    }

    fn position(&self, pattern: &str) -> Result<usize> {
        self.patterns
            .iter()
            .position(|e| e.pattern == pattern)
            .ok_or_else(|| ConfigError::PatternNotFound(pattern.to_string()))
    }

    /// Authinfo file paths with `~` and environment variables expanded.
    ///
    /// Entries that fail to expand are dropped with a warning.
    pub fn authinfo_paths(&self) -> Vec<PathBuf> {
        self.credentials
            .authinfo_files
            .iter()
            .filter_map(|raw| match shellexpand::full(raw) {
                Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
                Err(e) => {
                    tracing::warn!("Skipping authinfo path {:?}: {}", raw, e);
                    None
                }
            })
            .collect()
    }
}
