use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Result, anyhow};

pub const DEFAULT_BIBLE_API_BASE_URL: &str = "https://bible-api.com";
pub const DEFAULT_SERPER_API_BASE_URL: &str = "https://google.serper.dev";
pub const DEFAULT_GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_LOCAL_LLM_URL: &str = "http://localhost:11434";

/// Settings for every external service the assistant talks to.
///
/// Values come from `~/.config/bible-study/config.json` when present;
/// environment variables always win.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base_url: String,
    pub serper_api_key: Option<String>,
    pub serper_api_base_url: String,
    pub bible_api_key: Option<String>,
    pub bible_api_base_url: String,
    pub bible_translation: String,
    pub local_llm_url: String,
    pub local_model_id: String,
    pub http_timeout_secs: u64,
    pub search_results: usize,
    pub validate_sources: bool,
    pub export_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: "gemini-1.5-flash".to_string(),
            gemini_api_base_url: DEFAULT_GEMINI_API_BASE_URL.to_string(),
            serper_api_key: None,
            serper_api_base_url: DEFAULT_SERPER_API_BASE_URL.to_string(),
            bible_api_key: None,
            bible_api_base_url: DEFAULT_BIBLE_API_BASE_URL.to_string(),
            bible_translation: "kjv".to_string(),
            local_llm_url: DEFAULT_LOCAL_LLM_URL.to_string(),
            local_model_id: "phi".to_string(),
            http_timeout_secs: 10,
            search_results: 5,
            validate_sources: false,
            export_dir: PathBuf::from("."),
        }
    }

    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(&config_path)?;
            serde_json::from_str(&config_content)
                .map_err(|e| anyhow!("Invalid config file {:?}: {}", config_path, e))?
        } else {
            Self::new()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        tracing::debug!(path = ?config_path, "configuration loaded");
        Ok(config)
    }

    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini_api_key = Some(v);
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini_model = v;
        }
        if let Some(v) = get("GEMINI_API_BASE_URL") {
            self.gemini_api_base_url = v;
        }
        if let Some(v) = get("SERPER_API_KEY") {
            self.serper_api_key = Some(v);
        }
        if let Some(v) = get("SERPER_API_BASE_URL") {
            self.serper_api_base_url = v;
        }
        if let Some(v) = get("BIBLE_API_KEY") {
            self.bible_api_key = Some(v);
        }
        if let Some(v) = get("BIBLE_API_BASE_URL") {
            self.bible_api_base_url = v;
        }
        if let Some(v) = get("BIBLE_TRANSLATION") {
            self.bible_translation = v;
        }
        if let Some(v) = get("LOCAL_LLM_URL") {
            self.local_llm_url = v;
        }
        if let Some(v) = get("LOCAL_MODEL_ID") {
            self.local_model_id = v;
        }
        if let Some(v) = get("HTTP_TIMEOUT_SECS") {
            self.http_timeout_secs = v
                .parse()
                .map_err(|_| anyhow!("HTTP_TIMEOUT_SECS must be a whole number, got {:?}", v))?;
        }
        if let Some(v) = get("SEARCH_RESULTS") {
            self.search_results = v
                .parse()
                .map_err(|_| anyhow!("SEARCH_RESULTS must be a whole number, got {:?}", v))?;
        }
        if let Some(v) = get("VALIDATE_SOURCES") {
            self.validate_sources = parse_bool(&v)
                .ok_or_else(|| anyhow!("VALIDATE_SOURCES must be true or false, got {:?}", v))?;
        }
        if let Some(v) = get("EXPORT_DIR") {
            self.export_dir = PathBuf::from(v);
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("bible-study").join("config.json"))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
