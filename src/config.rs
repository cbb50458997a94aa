use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::llm;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which of the supported models to use
    pub name: String,

    /// Chat-completions endpoint
    pub endpoint: String,

    /// Name of the environment variable holding the API key. The key itself
    /// never goes in the config file.
    pub api_key_env: String,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".codechat").join("config.toml"))
    }

    /// The configured model must be one of the supported constants, so a
    /// typo in the config file fails at startup instead of at request time.
    pub fn validate(&self) -> Result<()> {
        if !llm::is_known_model(&self.model.name) {
            bail!(
                "Unknown model '{}' in config. Supported models: {}",
                self.model.name,
                llm::AVAILABLE_MODELS.join(", ")
            );
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                name: llm::MODEL_DEFAULT.to_string(),
                endpoint: llm::DEFAULT_API_URL.to_string(),
                api_key_env: "OPENAI_API_KEY".to_string(),
            },
        }
    }
}

/// Load or create configuration
pub fn load_or_create(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = if let Some(p) = path {
        p.to_path_buf()
    } else {
        AppConfig::default_path()?
    };

    if config_path.exists() {
        AppConfig::load(&config_path)
    } else {
        let config = AppConfig::default();
        config.save(&config_path)?;
        Ok(config)
    }
}
