//! Centralized initialization for CLI commands.
//!
//! Every command needs the same three things: the configuration, the recipe
//! document and a [`SyncClient`] wired to both. [`CommandInit`] builds them once
//! so the individual commands only deal with their own flow.
//!
//! # Initialization Steps
//! 1. **Configuration**: an explicit `--config` path, or `config.json` in the
//!    platform config directory (created with defaults on first use)
//! 2. **Recipe document**: an explicit `--data` path, or `recipes.json` next to
//!    the configuration
//! 3. **Client**: one [`SyncClient`] per process

use crate::core::{
    client::SyncClient, config::SyncConfig, dirs::get_config_directory, error::Result,
    file_gateway::JsonFileGateway,
};
use std::path::PathBuf;

/// Command line overrides; `None` means "use the default".
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub data: Option<PathBuf>,
    pub config: Option<PathBuf>,
    /// Acts as someone other than the configured actor.
    pub actor: Option<String>,
}

/// Initialized context shared by all commands
pub struct CommandContext {
    pub client: SyncClient<JsonFileGateway>,
}

impl CommandContext {
    pub fn config(&self) -> &SyncConfig {
        self.client.config()
    }
}

pub struct CommandInit;

impl CommandInit {
    pub fn initialize(options: &SessionOptions) -> Result<CommandContext> {
        let mut config = Self::load_config(options)?;
        if let Some(actor) = &options.actor {
            config.actor = actor.clone();
        }

        let data_path = match &options.data {
            Some(path) => path.clone(),
            None => get_config_directory()?.join("recipes.json"),
        };
        log::debug!("Opening recipe document {}", data_path.display());
        let gateway = JsonFileGateway::open(&data_path, config.page_size, config.actor.clone())?;

        Ok(CommandContext {
            client: SyncClient::new(gateway, config),
        })
    }

    fn load_config(options: &SessionOptions) -> Result<SyncConfig> {
        match &options.config {
            Some(path) if path.exists() => SyncConfig::load_from(path),
            Some(path) => {
                log::debug!("No config at {}; using defaults", path.display());
                Ok(SyncConfig::default())
            }
            None => SyncConfig::load_or_create(),
        }
    }
}
