use crate::notify::DeliveryStyle;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_LABEL: &str = "Alarm";

pub fn home_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".femtoalarm")
}

pub fn config_path() -> PathBuf {
    env::var_os("FEMTOALARM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| home_dir().join("config.json"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SystemNotifyConfig {
    pub command: String,
    pub args: Vec<String>,
    pub allowed: bool,
    pub timeout_secs: u64,
}

impl Default for SystemNotifyConfig {
    fn default() -> Self {
        Self {
            command: "notify-send".to_string(),
            args: vec!["-a".to_string(), "femtoalarm".to_string()],
            allowed: true,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub delivery_style: DeliveryStyle,
    pub tick_ms: u64,
    pub default_label: String,
    pub system: SystemNotifyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: home_dir().join("data"),
            delivery_style: DeliveryStyle::System,
            tick_ms: 1000,
            default_label: DEFAULT_LABEL.to_string(),
            system: SystemNotifyConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_from(&config_path())?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let cfg: AppConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow!("failed to parse config at {}: {e}", path.display()))?;
        Ok(cfg)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dir) = env_opt("FEMTOALARM_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(style) = env_opt("FEMTOALARM_DELIVERY_STYLE") {
            self.delivery_style = style.parse()?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn label_or_default(&self, label: &str) -> String {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            if self.default_label.trim().is_empty() {
                DEFAULT_LABEL.to_string()
            } else {
                self.default_label.clone()
            }
        } else {
            trimmed.to_string()
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "deliveryStyle": "alternate", "system": { "command": "osascript" } }"#,
        )
        .unwrap();

        let cfg = AppConfig::load_from(&path).unwrap();
        assert_eq!(cfg.delivery_style, DeliveryStyle::Alternate);
        assert_eq!(cfg.system.command, "osascript");
        assert_eq!(cfg.system.timeout_secs, 5);
        assert!(cfg.system.allowed);
        assert_eq!(cfg.tick_ms, 1000);
        assert_eq!(cfg.default_label, DEFAULT_LABEL);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.json");
        let cfg = AppConfig {
            tick_ms: 250,
            ..Default::default()
        };
        cfg.save_to(&path).unwrap();
        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.tick_ms, 250);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn empty_label_gets_default() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.label_or_default("  "), "Alarm");
        assert_eq!(cfg.label_or_default(" Gym "), "Gym");
    }
}
