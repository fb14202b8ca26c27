use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use caravan_core::{
    api::{DEFAULT_LOCALE, DEFAULT_TIMEOUT_SECS},
    select::DEFAULT_PAGE_SIZE,
    ClientConfig, MessageCatalog, RequestContext,
};
use serde::Serialize;
use tracing::debug;

use crate::{args::ConfigArgs, profile::Profile};

pub const DEFAULT_TOKEN_FILENAME: &str = "token";
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

#[derive(Debug, Serialize)]
pub struct AppConfig {
    pub profile_path: String,
    pub profile_exists: bool,
    pub base_url: String,
    pub locale: String,
    pub token_path: String,
    pub has_token: bool,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub messages: BTreeMap<String, String>,
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            profile_path: "./".to_string(),
            profile_exists: false,
            base_url: DEFAULT_BASE_URL.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            token_path: format!("./{}", DEFAULT_TOKEN_FILENAME),
            has_token: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: DEFAULT_PAGE_SIZE,
            messages: BTreeMap::new(),
            token: None,
        }
    }
}

impl AppConfig {
    /// Command-line and environment values win over the profile
    pub fn from_args(args: ConfigArgs, profile_path: &Path, profile: Option<&Profile>) -> Self {
        let defaults = AppConfig::default();

        let token_path = profile
            .and_then(|p| p.token_path.as_ref())
            .cloned()
            .or(build_token_path(profile_path))
            .unwrap_or(defaults.token_path);

        let token = args
            .token
            .filter(|t| !t.trim().is_empty())
            .or_else(|| read_token(Path::new(&token_path)));

        AppConfig {
            profile_exists: profile.is_some(),
            profile_path: profile_path
                .to_str()
                .map(|p| p.to_string())
                .unwrap_or(defaults.profile_path),
            base_url: args
                .base_url
                .or_else(|| profile.and_then(|p| p.base_url.clone()))
                .unwrap_or(defaults.base_url),
            locale: args
                .locale
                .or_else(|| profile.and_then(|p| p.locale.clone()))
                .unwrap_or(defaults.locale),
            token_path,
            has_token: token.is_some(),
            timeout_secs: profile
                .and_then(|p| p.timeout_secs)
                .unwrap_or(defaults.timeout_secs),
            page_size: profile
                .and_then(|p| p.page_size)
                .filter(|size| *size > 0)
                .unwrap_or(defaults.page_size),
            messages: profile.map(|p| p.messages.clone()).unwrap_or_default(),
            token,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let overrides: HashMap<String, String> = self
            .messages
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        ClientConfig {
            base_url: self.base_url.clone(),
            timeout_secs: self.timeout_secs,
            messages: MessageCatalog::with_overrides(overrides),
            ..ClientConfig::default()
        }
    }

    pub fn request_context(&self) -> RequestContext {
        RequestContext::new(&self.locale, self.token.clone())
    }

    /// Profile holding the resolved settings, as written by `init`
    pub fn to_profile(&self) -> Profile {
        Profile {
            base_url: Some(self.base_url.clone()),
            locale: Some(self.locale.clone()),
            token_path: Some(self.token_path.clone()),
            timeout_secs: Some(self.timeout_secs),
            page_size: Some(self.page_size),
            messages: self.messages.clone(),
        }
    }
}

fn build_token_path(profile_path: &Path) -> Option<String> {
    profile_path
        .parent()
        .map(|p| p.join(Path::new(DEFAULT_TOKEN_FILENAME)))
        .map(|p| p.to_string_lossy().into_owned())
}

fn read_token(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => Some(contents.trim().to_string()).filter(|t| !t.is_empty()),
        Err(e) => {
            debug!("No token read from {}: {}", path.display(), e);
            None
        }
    }
}
