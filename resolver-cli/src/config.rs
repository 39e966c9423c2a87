use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use platforms_resolver::{PlatformSecrets, ResolverConfig};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "vresolve";
const CONFIG_FILE: &str = "config.toml";

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(flatten)]
    pub secrets: PlatformSecrets,
    /// Where credential files live (default: next to the config file)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Reads `path` (or the default location). A missing file yields the
    /// defaults; environment overrides apply either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        let mut config = match &path {
            Some(path) if path.exists() => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Self::parse(&raw).with_context(|| format!("parsing {}", path.display()))?
            }
            _ => Self::default(),
        };
        if config.credentials_dir.is_none() {
            config.credentials_dir = path.as_deref().and_then(Path::parent).map(Path::to_path_buf);
        }
        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Overrides secrets from `TWITCH_*` / `GOOGLE_*` variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let twitch = &mut self.secrets.twitch;
        if let Some(value) = lookup("TWITCH_CLIENT_ID") {
            twitch.client_id = value;
        }
        if let Some(value) = lookup("TWITCH_CLIENT_SECRET") {
            twitch.client_secret = Some(value);
        }
        if let Some(value) = lookup("TWITCH_WEB_TOKEN") {
            twitch.web_access_token = Some(value);
        }

        let youtube = &mut self.secrets.youtube;
        if let Some(value) = lookup("GOOGLE_CLIENT_ID") {
            youtube.client_id = value;
        }
        if let Some(value) = lookup("GOOGLE_CLIENT_SECRET") {
            youtube.client_secret = Some(value);
        }
    }

    pub fn credentials_dir(&self) -> PathBuf {
        self.credentials_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Writes the defaults to `path` unless a file is already there.
    pub fn init(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, Self::default().show()?)?;
        Ok(true)
    }
}
