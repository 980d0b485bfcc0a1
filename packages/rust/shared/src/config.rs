//! Application configuration for crewout.
//!
//! User config lives at `~/.crewout/crewout.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CrewOutError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "crewout.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".crewout";

/// Model credited with usage when the runtime does not name one.
pub const DEFAULT_MODEL_NAME: &str = "claude-sonnet-4-5-20250929";

// ---------------------------------------------------------------------------
// Config structs (matching crewout.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Output extraction settings.
    #[serde(default)]
    pub extraction: ExtractionSection,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Base directory that execution folders are created under.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// `chrono` format for the `current_date` metadata entry.
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            date_format: default_date_format(),
        }
    }
}

fn default_output_dir() -> String {
    "outputs".into()
}
fn default_date_format() -> String {
    "%Y-%m-%d".into()
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionSection {
    /// Model name used when usage records omit one.
    #[serde(default = "default_model_name")]
    pub default_model_name: String,
}

impl Default for ExtractionSection {
    fn default() -> Self {
        Self {
            default_model_name: default_model_name(),
        }
    }
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.into()
}

// ---------------------------------------------------------------------------
// Extraction config (runtime, passed explicitly into extraction)
// ---------------------------------------------------------------------------

/// Runtime extraction configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionConfig {
    pub default_model_name: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_model_name: default_model_name(),
        }
    }
}

impl From<&AppConfig> for ExtractionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_model_name: config.extraction.default_model_name.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.crewout/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CrewOutError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.crewout/crewout.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| CrewOutError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CrewOutError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    init_config_in(&config_dir()?)
}

/// Write a default config file into `dir`, creating it if needed.
pub fn init_config_in(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| CrewOutError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CrewOutError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CrewOutError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("output_dir"));
        assert!(toml_str.contains(DEFAULT_MODEL_NAME));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.output_dir, "outputs");
        assert_eq!(parsed.defaults.date_format, "%Y-%m-%d");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[extraction]
default_model_name = "gpt-5.1"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.output_dir, "outputs");
        assert_eq!(ExtractionConfig::from(&config).default_model_name, "gpt-5.1");
    }

    #[test]
    fn init_and_load_from_dir() {
        let dir = std::env::temp_dir().join(format!("crewout-config-test-{}", uuid::Uuid::now_v7()));

        let path = init_config_in(&dir).expect("init config");
        let loaded = load_config_from(&path).expect("load config");
        assert_eq!(loaded.extraction.default_model_name, DEFAULT_MODEL_NAME);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_config_reports_path() {
        let dir = std::env::temp_dir().join(format!("crewout-config-test-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[defaults\noutput_dir = 3").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
