//! Application configuration management

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing_subscriber::filter::LevelFilter;

use super::session::AutosavePolicy;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Notes root; defaults to `Notes` under the platform data directory
    pub notes_root: Option<PathBuf>,
    /// Recently opened roots, most recent first
    pub recent_roots: Vec<PathBuf>,
    /// Autosave timing
    pub autosave: AutosaveConfig,
    /// UI settings
    pub ui: UiConfig,
    /// Log level (`error`, `warn`, `info`, `debug`, `trace`)
    pub log_level: String,
}

/// Autosave timing in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Minimum interval between propagations of editor changes
    pub throttle_ms: u64,
    /// Quiet period after the last edit before saving
    pub idle_save_ms: u64,
}

/// UI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Theme (light/dark)
    pub theme: String,
    /// Sidebar width
    pub sidebar_width: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            notes_root: None,
            recent_roots: Vec::new(),
            autosave: AutosaveConfig::default(),
            ui: UiConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 500,
            idle_save_ms: 10_000,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            sidebar_width: 260.0,
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "notex", "Notex")
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        // Ensure config directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        tracing::info!("Saved config to: {}", path.display());
        Ok(())
    }

    /// Notes root to open
    pub fn notes_root(&self) -> PathBuf {
        self.notes_root.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|dirs| dirs.data_dir().join("Notes"))
                .unwrap_or_else(|| PathBuf::from("Notes"))
        })
    }

    /// Switch to a different notes root and remember it
    pub fn set_notes_root(&mut self, path: PathBuf) {
        self.recent_roots.retain(|p| p != &path);
        self.recent_roots.insert(0, path.clone());
        self.recent_roots.truncate(10);
        self.notes_root = Some(path);
    }

    pub fn autosave_policy(&self) -> AutosavePolicy {
        AutosavePolicy {
            throttle: Duration::from_millis(self.autosave.throttle_ms),
            idle_save: Duration::from_millis(self.autosave.idle_save_ms),
        }
    }

    /// Configured log level, `INFO` if unparseable
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::INFO)
    }
}
