use std::path::PathBuf;

use super::{
    KnownMarketplace, KnownMarketplaces, Marketplace, Plugin, SourceKind, SourceLocation,
    manifest_path,
};
use crate::config::Paths;
use crate::error::{Error, Result, ensure_safe_name};
use crate::fetch::remove_dir_if_exists;
use crate::store::JsonStore;

/// CRUD over marketplace manifests and the known-marketplaces index.
///
/// Lookups fail closed: an unknown marketplace or unreadable manifest reads
/// as `None`/`false`, never as an error.
#[derive(Clone)]
pub struct MarketplaceRegistry {
    store: JsonStore,
    paths: Paths,
}

impl MarketplaceRegistry {
    pub fn new(store: JsonStore, paths: Paths) -> Self {
        Self { store, paths }
    }

    pub async fn known(&self) -> KnownMarketplaces {
        self.store
            .read(&self.paths.known_marketplaces_file())
            .await
            .unwrap_or_default()
    }

    pub async fn get(&self, name: &str) -> Option<KnownMarketplace> {
        self.known().await.remove(name)
    }

    pub async fn install_location(&self, name: &str) -> Option<PathBuf> {
        self.get(name).await.map(|m| m.install_location)
    }

    pub async fn manifest(&self, name: &str) -> Option<Marketplace> {
        let location = self.install_location(name).await?;
        self.store.read(&manifest_path(&location)).await
    }

    /// Whether `name` is a marketplace this tool created for loose plugins.
    pub async fn is_local(&self, name: &str) -> bool {
        self.get(name)
            .await
            .is_some_and(|m| m.source.kind() == Some(SourceKind::Directory))
    }

    /// Returns the install location of `name`, creating an empty local
    /// marketplace first if the index has no entry for it.
    pub async fn ensure_default_marketplace(&self, name: &str) -> Result<PathBuf> {
        ensure_safe_name(name)?;
        if let Some(location) = self.install_location(name).await {
            return Ok(location);
        }

        let location = self.paths.marketplaces_dir().join(name);
        let manifest = manifest_path(&location);
        let created = self.store.read::<Marketplace>(&manifest).await.is_none();
        if created {
            self.store.write(&manifest, &Marketplace::local(name)).await?;
        }

        let entry = KnownMarketplace::new(SourceLocation::directory(&location), location.clone());
        let committed = self
            .store
            .update(&self.paths.known_marketplaces_file(), |index: &mut KnownMarketplaces| {
                index
                    .entry(name.to_string())
                    .or_insert(entry)
                    .install_location
                    .clone()
            })
            .await;

        match committed {
            Ok(location) => {
                tracing::info!(marketplace = name, location = %location.display(), "local marketplace created");
                Ok(location)
            }
            Err(e) => {
                if created && let Err(cleanup) = remove_dir_if_exists(&location).await {
                    tracing::warn!(marketplace = name, error = %cleanup, "failed to remove marketplace after index write failed");
                }
                Err(Error::registration(name, e))
            }
        }
    }

    /// Records `name` as a git-sourced marketplace at `install_location`,
    /// replacing any previous entry.
    pub async fn register_marketplace(
        &self,
        name: &str,
        install_location: PathBuf,
        git_url: &str,
    ) -> Result<()> {
        ensure_safe_name(name)?;
        let entry = KnownMarketplace::new(SourceLocation::git(git_url), install_location);
        self.store
            .update(&self.paths.known_marketplaces_file(), |index: &mut KnownMarketplaces| {
                index.insert(name.to_string(), entry);
            })
            .await
            .map_err(|e| Error::registration(name, e))?;

        tracing::info!(marketplace = name, git_url, "marketplace registered");
        Ok(())
    }

    /// Inserts or replaces `plugin` by name. `false` when the marketplace
    /// manifest cannot be located.
    pub async fn add_plugin(&self, marketplace: &str, plugin: Plugin) -> Result<bool> {
        let Some(location) = self.install_location(marketplace).await else {
            return Ok(false);
        };
        let name = plugin.name.clone();

        let updated = self
            .store
            .update_existing(&manifest_path(&location), |manifest: &mut Marketplace| {
                manifest.upsert_plugin(plugin);
            })
            .await?;

        if updated.is_some() {
            tracing::debug!(marketplace, plugin = %name, "plugin added to manifest");
        }
        Ok(updated.is_some())
    }

    /// `true` whether or not the plugin was listed; `false` only when the
    /// manifest cannot be located.
    pub async fn remove_plugin(&self, marketplace: &str, plugin_name: &str) -> Result<bool> {
        let Some(location) = self.install_location(marketplace).await else {
            return Ok(false);
        };

        let removed = self
            .store
            .update_existing(&manifest_path(&location), |manifest: &mut Marketplace| {
                manifest.remove_plugin(plugin_name)
            })
            .await?;

        if removed == Some(true) {
            tracing::debug!(marketplace, plugin = plugin_name, "plugin removed from manifest");
        }
        Ok(removed.is_some())
    }

    /// Drops the index entry only. Files stay where they are.
    pub async fn unregister_marketplace(&self, name: &str) -> Result<bool> {
        let removed = self
            .store
            .update_existing(
                &self.paths.known_marketplaces_file(),
                |index: &mut KnownMarketplaces| index.remove(name).is_some(),
            )
            .await?;

        Ok(removed.unwrap_or(false))
    }
}
