use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Ok};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PROFILE_NAME: &str = "default";

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Profile {
    pub base_url: Option<String>,
    pub locale: Option<String>,
    pub token_path: Option<String>,
    pub timeout_secs: Option<u64>,
    pub page_size: Option<u32>,
    /// Overrides for generic error messages, keyed like `not_found`
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

impl Profile {
    pub fn from_path(profile: &Path) -> anyhow::Result<Option<Self>> {
        if !profile.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(profile).context("Failed to read profile file")?;

        let profile: Self = toml::from_str(&contents).context("Failed to deserialize profile")?;

        Ok(Some(profile))
    }

    pub fn save(&self, profile_path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string(self).context("Failed to serialize profile")?;

        if let Some(parent) = profile_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create profile directory")?;
        }

        std::fs::write(profile_path, content).context("Failed to write profile")?;

        Ok(())
    }
}

/// Get the XDG config directory, respecting XDG_CONFIG_HOME
pub fn get_config_dir() -> PathBuf {
    if let std::result::Result::Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        // XDG_CONFIG_HOME is the base directory, add "caravan" subdirectory
        PathBuf::from(xdg_config).join("caravan")
    } else {
        directories::ProjectDirs::from("com", "beardo", "caravan")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Get path to a named profile's config file
pub fn get_profile_config_path(profile_name: &str) -> PathBuf {
    get_config_dir()
        .join("profiles")
        .join(format!("{}.toml", profile_name))
}

/// Resolve the profile argument, which is either a profile name or a file path
pub fn get_profile_path(arg_profile: &Option<String>) -> PathBuf {
    match arg_profile {
        Some(arg) if looks_like_path(arg) => PathBuf::from(arg),
        Some(profile_name) => get_profile_config_path(profile_name),
        None => get_profile_config_path(DEFAULT_PROFILE_NAME),
    }
}

fn looks_like_path(arg: &str) -> bool {
    arg.ends_with(".toml") || arg.contains(std::path::MAIN_SEPARATOR) || arg.contains('/')
}
