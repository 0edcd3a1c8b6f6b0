use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use kimlik_core::PipelineConfig;
use kimlik_ocr::{LanguageSet, QualityGate, TesseractConfig};

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Tesseract binary, tessdata and language pack settings
    pub tesseract: TesseractConfig,
    /// Recognition languages, e.g. "tur+eng"
    pub languages: LanguageSet,
    pub quality: QualityGate,
}

impl AppConfig {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            quality: self.quality,
            languages: self.languages.clone(),
            ..Default::default()
        }
    }

    /// Tesseract settings with the language pack cache placed under the
    /// user cache dir when not configured
    pub fn tesseract_config(&self) -> TesseractConfig {
        let mut config = self.tesseract.clone();
        if config.cache_dir.is_none() {
            config.cache_dir = cache_dir().map(|dir| dir.to_string_lossy().into_owned());
        }
        config
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config dir unavailable")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("kimlik-scan").join("config.json"))
}

fn cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|base| base.join("kimlik-scan").join("tessdata"))
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_path()?)
}

/// Defaults when the file does not exist
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        log::debug!("[Config] {} not found, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_config_to(&config_path()?, config)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    log::info!("[Config] saved to {}", path.display());
    Ok(())
}
