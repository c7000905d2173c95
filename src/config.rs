use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-pro-vision";
pub const DEFAULT_SIMULATED_DELAY_MS: u64 = 3000;

/// Sampling parameters sent with every analysis request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_k: 40,
            top_p: 0.95,
            max_output_tokens: 2048,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,
    /// Record store directory. Defaults to `~/.diagnostic-assistant/data`.
    pub data_dir: Option<PathBuf>,
    /// Base URL of the Gemini models API
    pub endpoint: String,
    pub model: String,
    /// Cosmetic wait before returning the canned result in simulated mode
    pub simulated_delay_ms: u64,
    /// Overall HTTP timeout. None leaves the transport default in place.
    pub request_timeout_secs: Option<u64>,
    pub generation: GenerationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            data_dir: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            simulated_delay_ms: DEFAULT_SIMULATED_DELAY_MS,
            request_timeout_secs: None,
            generation: GenerationConfig::default(),
        }
    }
}

impl Config {
    /// Get the default config directory
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".diagnostic-assistant"))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from file, or return defaults when the file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", path))
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from file or return default on any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {:#}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Resolve the record store directory
    pub fn data_dir(&self) -> Result<PathBuf> {
        match self.data_dir {
            Some(ref dir) => Ok(dir.clone()),
            None => Ok(Self::config_dir()?.join("data")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.model, "gemini-pro-vision");
        assert_eq!(config.simulated_delay_ms, 3000);
        assert!(config.request_timeout_secs.is_none());
    }

    #[test]
    fn test_generation_defaults() {
        let generation = GenerationConfig::default();
        assert_eq!(generation.temperature, 0.2);
        assert_eq!(generation.top_k, 40);
        assert_eq!(generation.top_p, 0.95);
        assert_eq!(generation.max_output_tokens, 2048);
    }

    #[test]
    fn test_generation_serializes_camel_case() {
        let json = serde_json::to_value(GenerationConfig::default()).unwrap();
        assert_eq!(json["topK"], 40);
        assert_eq!(json["maxOutputTokens"], 2048);
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"model":"gemini-1.5-flash","simulated_delay_ms":10}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.model, "gemini-1.5-flash");
        assert_eq!(config.simulated_delay_ms, 10);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.generation, GenerationConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.data_dir = Some(dir.path().join("records"));
        config.request_timeout_secs = Some(30);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.data_dir, Some(dir.path().join("records")));
        assert_eq!(loaded.request_timeout_secs, Some(30));
        assert_eq!(loaded.data_dir().unwrap(), dir.path().join("records"));
    }

    #[test]
    fn test_load_or_default_on_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(Config::load(&path).is_err());
        let config = Config::load_or_default(&path);
        assert_eq!(config.schema_version, 1);
    }
}
