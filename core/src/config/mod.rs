use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::store::JsonStore;

const CLAUDE_DIR: &str = ".claude";
const CONFIG_DIR_ENV: &str = "CLAUDE_CONFIG_DIR";
const REGISTRY_URL_ENV: &str = "CLAUDE_PLUGINS_REGISTRY_URL";

pub const DEFAULT_MARKETPLACE: &str = "claude-plugin-marketplace";
pub const DEFAULT_REGISTRY_URL: &str = "https://api.claude-plugins.dev";
pub const DISCOVERY_URL: &str = "https://claude-plugins.dev";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub default_marketplace: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_marketplace: DEFAULT_MARKETPLACE.to_string(),
            registry_url: Some(DEFAULT_REGISTRY_URL.to_string()),
        }
    }
}

impl Config {
    /// `CLAUDE_PLUGINS_REGISTRY_URL` wins over the stored value.
    pub fn registry_url(&self) -> String {
        std::env::var(REGISTRY_URL_ENV)
            .ok()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| self.registry_url.clone())
            .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string())
    }

    fn is_valid(&self) -> bool {
        !self.default_marketplace.trim().is_empty()
    }
}

/// Fixed file layout under the host agent directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$CLAUDE_CONFIG_DIR`, else `~/.claude`.
    pub fn discover() -> Self {
        if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
            && !dir.trim().is_empty()
        {
            return Self::new(dir);
        }
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(home.join(CLAUDE_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn plugins_dir(&self) -> PathBuf {
        self.root.join("plugins")
    }

    pub fn config_file(&self) -> PathBuf {
        self.plugins_dir().join("config.json")
    }

    pub fn known_marketplaces_file(&self) -> PathBuf {
        self.plugins_dir().join("known_marketplaces.json")
    }

    pub fn marketplaces_dir(&self) -> PathBuf {
        self.plugins_dir().join("marketplaces")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.plugins_dir().join("cache")
    }

    pub fn settings_file(&self) -> PathBuf {
        self.root.join("settings.json")
    }

    pub async fn ensure_directories(&self) -> Result<()> {
        for dir in [self.plugins_dir(), self.marketplaces_dir(), self.cache_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::io(&dir, e))?;
        }
        Ok(())
    }
}

/// Loads `config.json` without touching disk, falling back to defaults.
pub async fn load(store: &JsonStore, paths: &Paths) -> Config {
    store
        .read::<Config>(&paths.config_file())
        .await
        .filter(Config::is_valid)
        .unwrap_or_default()
}

/// Loads `config.json`, rewriting it with defaults when it is missing,
/// unreadable, or lacks a default marketplace.
pub async fn load_or_init(store: &JsonStore, paths: &Paths) -> Result<Config> {
    let path = paths.config_file();

    match store.read::<Config>(&path).await {
        Some(config) if config.is_valid() => Ok(config),
        _ => {
            tracing::debug!(path = %path.display(), "writing default plugin config");
            let config = Config::default();
            store.write(&path, &config).await?;
            Ok(config)
        }
    }
}

pub async fn set_default_marketplace(store: &JsonStore, paths: &Paths, name: &str) -> Result<Config> {
    crate::error::ensure_safe_name(name)?;
    let mut config = load_or_init(store, paths).await?;
    config.default_marketplace = name.to_string();
    store.write(&paths.config_file(), &config).await?;
    Ok(config)
}

pub async fn set_registry_url(store: &JsonStore, paths: &Paths, url: &str) -> Result<Config> {
    let mut config = load_or_init(store, paths).await?;
    config.registry_url = Some(url.trim_end_matches('/').to_string());
    store.write(&paths.config_file(), &config).await?;
    Ok(config)
}
