//! Configuration types for the vigil service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::item::{MonitoredItem, NotificationRule};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub items: Vec<ItemConfig>,
    #[serde(default)]
    pub notifiers: Vec<NotifierConfig>,
}

/// Engine-wide settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Whether saved snapshots include per-item history
    #[serde(default = "default_true")]
    pub include_history: bool,
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            include_history: true,
            state_file: default_state_file(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// One monitored resource as declared in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemConfig {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub notifications: Vec<NotificationRule>,
}

impl ItemConfig {
    /// Build a validated monitored item from this entry
    pub fn into_item(self) -> crate::Result<MonitoredItem> {
        MonitoredItem::new(
            self.url,
            self.title,
            self.interval_seconds,
            self.enabled,
            self.notifications,
        )
    }
}

/// Notifier configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotifierConfig {
    #[serde(rename = "pushover")]
    Pushover { api_token: String, user_key: String },
}

impl NotifierConfig {
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Pushover { .. } => "pushover",
        }
    }
}

fn default_history_size() -> usize {
    50
}

fn default_true() -> bool {
    true
}

fn default_state_file() -> PathBuf {
    PathBuf::from("vigil-state.json")
}

fn default_request_timeout() -> u64 {
    30
}

fn default_interval() -> u64 {
    60
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::VigilError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let json = r#"{
            "engine": {
                "history_size": 25,
                "include_history": false,
                "state_file": "/var/lib/vigil/state.json",
                "request_timeout_seconds": 10
            },
            "items": [
                {
                    "url": "https://example.com/status",
                    "title": "Example",
                    "interval_seconds": 120,
                    "enabled": true,
                    "notifications": [
                        {"type": "change"},
                        {"type": "error"},
                        {"type": "http_code", "code": 404}
                    ]
                }
            ],
            "notifiers": [
                {
                    "type": "pushover",
                    "api_token": "test-token",
                    "user_key": "test-user"
                }
            ]
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.engine.history_size, 25);
        assert!(!config.engine.include_history);
        assert_eq!(
            config.engine.state_file,
            PathBuf::from("/var/lib/vigil/state.json")
        );
        assert_eq!(config.engine.request_timeout_seconds, 10);

        assert_eq!(config.items.len(), 1);
        assert_eq!(config.items[0].url, "https://example.com/status");
        assert_eq!(config.items[0].interval_seconds, 120);
        assert_eq!(
            config.items[0].notifications,
            vec![
                NotificationRule::Change,
                NotificationRule::Error,
                NotificationRule::HttpCode { code: 404 },
            ]
        );

        assert_eq!(config.notifiers.len(), 1);
        assert_eq!(config.notifiers[0].type_name(), "pushover");
    }

    #[test]
    fn parse_minimal_config() {
        let json = r#"{}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert!(config.items.is_empty());
        assert!(config.notifiers.is_empty());
        assert_eq!(config.engine.history_size, 50);
        assert!(config.engine.include_history);
        assert_eq!(config.engine.state_file, PathBuf::from("vigil-state.json"));
        assert_eq!(config.engine.request_timeout_seconds, 30);
    }

    #[test]
    fn parse_item_defaults() {
        let json = r#"{
            "items": [{"url": "https://example.com"}]
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        let item = &config.items[0];
        assert_eq!(item.interval_seconds, 60);
        assert!(item.enabled);
        assert!(item.title.is_none());
        assert!(item.notifications.is_empty());
    }

    #[test]
    fn into_item_validates() {
        let good = ItemConfig {
            url: "https://example.com".to_string(),
            title: None,
            interval_seconds: 60,
            enabled: true,
            notifications: vec![],
        };
        assert!(good.into_item().is_ok());

        let bad_url = ItemConfig {
            url: "ftp://example.com".to_string(),
            title: None,
            interval_seconds: 60,
            enabled: true,
            notifications: vec![],
        };
        assert!(bad_url.into_item().is_err());

        let bad_interval = ItemConfig {
            url: "https://example.com".to_string(),
            title: None,
            interval_seconds: 0,
            enabled: true,
            notifications: vec![],
        };
        assert!(bad_interval.into_item().is_err());
    }

    #[test]
    fn load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/config.json"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"items": [{"url": "https://example.com"}]}"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.items.len(), 1);
    }

    #[test]
    fn load_config_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "not json").unwrap();

        let result = load_config(&config_path);
        assert!(result.is_err());
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.items.is_empty());
        assert!(config.notifiers.is_empty());
        assert_eq!(config.engine.history_size, 50);
    }
}
