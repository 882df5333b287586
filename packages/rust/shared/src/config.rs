//! Application configuration for chronomark.
//!
//! User config lives at `~/.chronomark/chronomark.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ChronoError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "chronomark.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".chronomark";

// ---------------------------------------------------------------------------
// Config structs (matching chronomark.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Matcher tuning.
    #[serde(default)]
    pub matching: MatchingConfig,

    /// Output document settings.
    #[serde(default)]
    pub output: OutputConfig,

    /// History retrieval settings.
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Which of several identical historical additions a match should report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The latest re-addition (a line deleted and re-added dates from the re-add).
    #[default]
    MostRecent,
    /// The first time the text ever appeared.
    Earliest,
}

/// `[matching]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum similarity a fuzzy or link-boosted candidate must exceed.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Bonus added to candidates sharing a URL with the fragment.
    #[serde(default = "default_link_bonus")]
    pub link_bonus: f64,

    /// Confidence reported for normalized-equality matches.
    #[serde(default = "default_normalized_confidence")]
    pub normalized_confidence: f64,

    /// Resolution for text added more than once.
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            link_bonus: default_link_bonus(),
            normalized_confidence: default_normalized_confidence(),
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

fn default_fuzzy_threshold() -> f64 {
    0.8
}
fn default_link_bonus() -> f64 {
    0.45
}
fn default_normalized_confidence() -> f64 {
    0.9
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Top-level title of the generated document.
    #[serde(default = "default_title")]
    pub title: String,

    /// File name written next to the source document.
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Line emitted under the title.
    #[serde(default = "default_preamble")]
    pub preamble: String,

    /// Line closing the document.
    #[serde(default = "default_footer")]
    pub footer: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            file_name: default_file_name(),
            preamble: default_preamble(),
            footer: default_footer(),
        }
    }
}

fn default_title() -> String {
    "Chronological View".into()
}
fn default_file_name() -> String {
    "README_CHRONOLOGICAL.md".into()
}
fn default_preamble() -> String {
    "*Reordered by addition date, newest first*".into()
}
fn default_footer() -> String {
    "*This file was automatically generated based on git history.*".into()
}

/// `[history]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Document path, relative to the repository root.
    #[serde(default = "default_document")]
    pub document: String,

    /// Pass `--follow` so history survives renames.
    #[serde(default = "default_true")]
    pub follow_renames: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            document: default_document(),
            follow_renames: true,
        }
    }
}

fn default_document() -> String {
    "README.md".into()
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime matcher configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchConfig {
    pub fuzzy_threshold: f64,
    pub link_bonus: f64,
    pub normalized_confidence: f64,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for MatchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            fuzzy_threshold: config.matching.fuzzy_threshold,
            link_bonus: config.matching.link_bonus,
            normalized_confidence: config.matching.normalized_confidence,
            duplicate_policy: config.matching.duplicate_policy,
        }
    }
}

impl MatchConfig {
    /// Reject values that would make the matcher accept everything or nothing.
    pub fn validate(&self) -> Result<()> {
        if !(self.fuzzy_threshold > 0.0 && self.fuzzy_threshold < 1.0) {
            return Err(ChronoError::config(format!(
                "fuzzy_threshold must be in (0, 1), got {}",
                self.fuzzy_threshold
            )));
        }
        if !(self.link_bonus >= 0.0 && self.link_bonus.is_finite()) {
            return Err(ChronoError::config(format!(
                "link_bonus must be >= 0, got {}",
                self.link_bonus
            )));
        }
        if !(self.normalized_confidence > 0.0 && self.normalized_confidence <= 1.0) {
            return Err(ChronoError::config(format!(
                "normalized_confidence must be in (0, 1], got {}",
                self.normalized_confidence
            )));
        }
        Ok(())
    }
}

/// Runtime rendering configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    pub title: String,
    pub preamble: String,
    pub footer: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for RenderConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            title: config.output.title.clone(),
            preamble: config.output.preamble.clone(),
            footer: config.output.footer.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.chronomark/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ChronoError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.chronomark/chronomark.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ChronoError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        ChronoError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    MatchConfig::from(&config).validate()?;
    Ok(config)
}

/// Write a default config file into `dir`, creating it if needed.
/// Returns the path to the created file.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| ChronoError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ChronoError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ChronoError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Create the config directory and write a default config file.
pub fn init_config() -> Result<PathBuf> {
    init_config_in(&config_dir()?)
}
