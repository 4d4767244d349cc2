use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::paths;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const CONFIG_FILE_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub http_proxy: String,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            data_dir: None,
            http_proxy: String::new(),
        }
    }
}

impl AppConfig {
    /// ~/.outline-studio/config.json, then ./config.toml, then environment.
    pub fn new() -> Self {
        let mut config = Self::load_from(&paths::config_json_path(), Path::new(CONFIG_FILE_PATH));
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// File layers only. The JSON file wins when both parse.
    pub fn load_from(json_path: &Path, toml_path: &Path) -> Self {
        if json_path.exists() {
            if let Ok(content) = std::fs::read_to_string(json_path) {
                match serde_json::from_str::<AppConfig>(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring {}: {}", json_path.display(), e),
                }
            }
        }

        if toml_path.exists() {
            if let Ok(content) = std::fs::read_to_string(toml_path) {
                match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => return config,
                    Err(e) => log::warn!("Ignoring {}: {}", toml_path.display(), e),
                }
            }
        }

        Self::default()
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("OUTLINE_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(key) = lookup("OUTLINE_API_KEY").filter(|v| !v.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("OUTLINE_MODEL").filter(|v| !v.trim().is_empty()) {
            self.model = model;
        }
        if let Some(dir) = lookup("OUTLINE_DATA_DIR").filter(|v| !v.trim().is_empty()) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(proxy) = lookup("HTTP_PROXY") {
            self.http_proxy = proxy;
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(paths::default_data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("a.json"), &dir.path().join("b.toml"));
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn json_file_wins_over_toml() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("config.json");
        let toml_path = dir.path().join("config.toml");
        std::fs::write(&json_path, r#"{"model": "o1-mini"}"#).unwrap();
        std::fs::write(&toml_path, "model = \"deepseek-chat\"\n").unwrap();

        let config = AppConfig::load_from(&json_path, &toml_path);
        assert_eq!(config.model, "o1-mini");
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn toml_used_when_json_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("config.json");
        let toml_path = dir.path().join("config.toml");
        std::fs::write(&json_path, "{not json").unwrap();
        std::fs::write(&toml_path, "model = \"deepseek-chat\"\napi_key = \"k\"\n").unwrap();

        let config = AppConfig::load_from(&json_path, &toml_path);
        assert_eq!(config.model, "deepseek-chat");
        assert_eq!(config.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn env_overrides_files_and_ignores_blank_values() {
        let env: HashMap<&str, &str> = [
            ("OUTLINE_API_URL", "http://localhost:9000/v1/chat/completions"),
            ("OUTLINE_MODEL", "  "),
            ("OUTLINE_DATA_DIR", "/tmp/outline"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api_url, "http://localhost:9000/v1/chat/completions");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.data_dir(), PathBuf::from("/tmp/outline"));
    }
}
