use crate::core::dirs::get_config_directory;
use crate::core::error::SyncError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SHARE_BASE_ENV: &str = "RECIPE_SYNC_SHARE_BASE";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    pub recipe_stale_after_secs: i64,
    pub list_stale_after_secs: i64,
    /// Unused entries and cursors are dropped after this long.
    pub gc_after_secs: i64,
    pub page_size: usize,
    pub prefetch_distance: usize,
    pub share_base_url: Option<String>,
    pub actor: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            recipe_stale_after_secs: 5 * 60,
            list_stale_after_secs: 2 * 60,
            gc_after_secs: 10 * 60,
            page_size: 10,
            prefetch_distance: 3,
            share_base_url: None,
            actor: "anonymous".to_string(),
            created_at: None,
        }
    }
}

impl SyncConfig {
    /// Loads `config.json` from the config directory, writing defaults on first use.
    pub fn load_or_create() -> Result<Self, SyncError> {
        let config_file = get_config_directory()?.join("config.json");

        if config_file.exists() {
            Self::load_from(&config_file)
        } else {
            let config = Self {
                created_at: Some(chrono::Utc::now()),
                ..Self::default()
            };
            config.save_to(&config_file)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn recipe_stale_after(&self) -> Duration {
        Duration::seconds(self.recipe_stale_after_secs)
    }

    pub fn list_stale_after(&self) -> Duration {
        Duration::seconds(self.list_stale_after_secs)
    }

    pub fn gc_after(&self) -> Duration {
        Duration::seconds(self.gc_after_secs)
    }

    /// Base URL for share links: the environment wins over the config file.
    pub fn share_base(&self) -> String {
        std::env::var(SHARE_BASE_ENV)
            .ok()
            .filter(|base| !base.is_empty())
            .or_else(|| self.share_base_url.clone())
            .unwrap_or_else(|| "http://localhost:5173".to_string())
    }
}
