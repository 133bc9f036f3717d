//! The host agent's `settings.json`: which plugins are enabled.
//!
//! `enabledPlugins` maps `"<plugin>@<marketplace>"` to a flag. A missing key
//! means never installed, `false` means disabled but retained. Every other
//! key in the file belongs to the host and is written back untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::Paths;
use crate::error::Result;
use crate::store::JsonStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub enabled_plugins: BTreeMap<String, bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginEntry {
    pub name: String,
    pub marketplace: String,
    pub enabled: bool,
}

pub fn plugin_key(plugin: &str, marketplace: &str) -> String {
    format!("{plugin}@{marketplace}")
}

fn split_key(key: &str) -> Option<(&str, &str)> {
    let (name, marketplace) = key.split_once('@')?;
    if name.is_empty() || marketplace.is_empty() {
        return None;
    }
    Some((name, marketplace))
}

#[derive(Clone)]
pub struct SettingsStore {
    store: JsonStore,
    paths: Paths,
}

impl SettingsStore {
    pub fn new(store: JsonStore, paths: Paths) -> Self {
        Self { store, paths }
    }

    /// Current settings. A missing file is created with defaults.
    pub async fn load(&self) -> Result<Settings> {
        let path = self.paths.settings_file();
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            let settings = Settings::default();
            self.store.write(&path, &settings).await?;
            return Ok(settings);
        }
        Ok(self.store.read(&path).await.unwrap_or_default())
    }

    async fn set(&self, plugin: &str, marketplace: &str, enabled: bool) -> Result<()> {
        let key = plugin_key(plugin, marketplace);
        self.store
            .update(&self.paths.settings_file(), |settings: &mut Settings| {
                settings.enabled_plugins.insert(key, enabled);
            })
            .await
    }

    pub async fn enable_plugin(&self, plugin: &str, marketplace: &str) -> Result<()> {
        self.set(plugin, marketplace, true).await?;
        tracing::info!(plugin, marketplace, "plugin enabled");
        Ok(())
    }

    pub async fn disable_plugin(&self, plugin: &str, marketplace: &str) -> Result<()> {
        self.set(plugin, marketplace, false).await?;
        tracing::info!(plugin, marketplace, "plugin disabled");
        Ok(())
    }

    /// Erases the key. Returns whether it was present.
    pub async fn remove_plugin(&self, plugin: &str, marketplace: &str) -> Result<bool> {
        let key = plugin_key(plugin, marketplace);
        self.store
            .update(&self.paths.settings_file(), |settings: &mut Settings| {
                settings.enabled_plugins.remove(&key).is_some()
            })
            .await
    }

    pub async fn is_enabled(&self, plugin: &str, marketplace: &str) -> Result<bool> {
        let settings = self.load().await?;
        Ok(settings.enabled_plugins.get(&plugin_key(plugin, marketplace)) == Some(&true))
    }

    /// Every well-formed key, enabled or not. Malformed keys are skipped.
    pub async fn list_plugins(&self) -> Result<Vec<PluginEntry>> {
        let settings = self.load().await?;
        Ok(settings
            .enabled_plugins
            .iter()
            .filter_map(|(key, enabled)| {
                let (name, marketplace) = split_key(key)?;
                Some(PluginEntry {
                    name: name.to_string(),
                    marketplace: marketplace.to_string(),
                    enabled: *enabled,
                })
            })
            .collect())
    }

    /// First entry for `plugin_name` in any marketplace.
    pub async fn find(&self, plugin_name: &str) -> Result<Option<PluginEntry>> {
        Ok(self
            .list_plugins()
            .await?
            .into_iter()
            .find(|entry| entry.name == plugin_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn settings(tmp: &TempDir) -> SettingsStore {
        SettingsStore::new(JsonStore::new(), Paths::new(tmp.path()))
    }

    #[tokio::test]
    async fn creates_missing_file() {
        let tmp = TempDir::new().unwrap();
        let store = settings(&tmp);
        assert_eq!(store.load().await.unwrap(), Settings::default());
        let raw = std::fs::read_to_string(tmp.path().join("settings.json")).unwrap();
        assert_eq!(raw, "{\n  \"enabledPlugins\": {}\n}");
    }

    #[tokio::test]
    async fn tri_state() {
        let tmp = TempDir::new().unwrap();
        let store = settings(&tmp);

        assert!(!store.is_enabled("fmt", "local").await.unwrap());
        assert!(store.find("fmt").await.unwrap().is_none());

        store.enable_plugin("fmt", "local").await.unwrap();
        store.enable_plugin("fmt", "local").await.unwrap();
        assert!(store.is_enabled("fmt", "local").await.unwrap());

        store.disable_plugin("fmt", "local").await.unwrap();
        let entry = store.find("fmt").await.unwrap().unwrap();
        assert_eq!(
            entry,
            PluginEntry {
                name: "fmt".into(),
                marketplace: "local".into(),
                enabled: false
            }
        );

        assert!(store.remove_plugin("fmt", "local").await.unwrap());
        assert!(!store.remove_plugin("fmt", "local").await.unwrap());
        assert!(store.find("fmt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn preserves_host_keys_and_skips_malformed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(
            &path,
            json!({
                "enabledPlugins": {"a@m": true, "@m": true, "b@": false, "nomarker": true},
                "alwaysThinkingEnabled": true,
                "hooks": {"Stop": []}
            })
            .to_string(),
        )
        .unwrap();

        let store = settings(&tmp);
        let entries = store.list_plugins().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "a");

        store.enable_plugin("c", "m").await.unwrap();
        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["alwaysThinkingEnabled"], json!(true));
        assert_eq!(raw["hooks"], json!({"Stop": []}));
        assert_eq!(raw["enabledPlugins"]["c@m"], json!(true));
        assert_eq!(raw["enabledPlugins"]["nomarker"], json!(true));
    }
}
