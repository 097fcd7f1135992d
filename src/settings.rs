//! Settings read through the `config` crate.
//!
//! Values come from built-in defaults, an optional `armortags.toml` and
//! `ARMORTAGS_*` environment variables, later sources winning.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{Result, TagError};

pub const DEFAULT_SETTINGS_FILE: &str = "armortags.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// The game's `Data` directory.
    pub data_dir: Option<PathBuf>,
    /// Relative to the data directory.
    pub taxonomy_dir: String,
    /// Relative to the data directory.
    pub clothing_dir: String,
    /// Relative to the taxonomy directory, receives new clothing types.
    pub default_taxonomy_file: String,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: None,
            taxonomy_dir: "F4SE/Plugins/scscd/taxonomy".to_string(),
            clothing_dir: "F4SE/Plugins/scscd/clothing".to_string(),
            default_taxonomy_file: "user/custom.csv".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Reads `file` (or `armortags.toml` when none is given) if it exists,
    /// then the environment.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = Settings::default();
        let file = file.unwrap_or_else(|| Path::new(DEFAULT_SETTINGS_FILE));
        let settings: Settings = Config::builder()
            .set_default("taxonomy_dir", defaults.taxonomy_dir)?
            .set_default("clothing_dir", defaults.clothing_dir)?
            .set_default("default_taxonomy_file", defaults.default_taxonomy_file)?
            .set_default("log_filter", defaults.log_filter)?
            .add_source(File::from(file).required(false))
            .add_source(Environment::with_prefix("ARMORTAGS"))
            .build()?
            .try_deserialize()?;
        debug!(?settings, "settings loaded");
        Ok(settings)
    }

    pub fn taxonomy_root(&self, data_root: &Path) -> PathBuf {
        join_relative(data_root, &self.taxonomy_dir)
    }
    pub fn clothing_root(&self, data_root: &Path) -> PathBuf {
        join_relative(data_root, &self.clothing_dir)
    }
}

fn join_relative(base: &Path, relative: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for part in relative.split(['/', '\\']).filter(|part| !part.is_empty()) {
        path.push(part);
    }
    path
}

/// Asked for the data directory when none is configured. `None` means the
/// user declined.
pub trait DataRootPrompt {
    fn ask(&mut self) -> Option<PathBuf>;
}

/// Never answers. For unattended runs.
pub struct NoPrompt;

impl DataRootPrompt for NoPrompt {
    fn ask(&mut self) -> Option<PathBuf> {
        None
    }
}

/// The configured data directory if it exists, otherwise whatever the prompt
/// offers. Without a usable directory the tool cannot run.
pub fn locate_data_root(settings: &Settings, prompt: &mut dyn DataRootPrompt) -> Result<PathBuf> {
    if let Some(configured) = settings.data_dir.as_ref().filter(|dir| dir.is_dir()) {
        return Ok(configured.clone());
    }
    match prompt.ask() {
        Some(chosen) if chosen.is_dir() => {
            info!(data_dir = %chosen.display(), "data directory chosen");
            Ok(chosen)
        }
        _ => Err(TagError::DataRootMissing),
    }
}
