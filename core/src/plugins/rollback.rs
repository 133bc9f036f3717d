use std::path::PathBuf;

use crate::fetch::remove_dir_if_exists;
use crate::marketplace::MarketplaceRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Compensation {
    RemoveDir(PathBuf),
    RemovePluginEntry { marketplace: String, plugin: String },
    UnregisterMarketplace(String),
}

/// Undo steps for the forward steps of an install that have completed.
#[derive(Debug, Default)]
pub(crate) struct Rollback {
    steps: Vec<Compensation>,
}

impl Rollback {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, step: Compensation) {
        self.steps.push(step);
    }

    #[cfg(test)]
    pub(crate) fn steps(&self) -> &[Compensation] {
        &self.steps
    }

    /// Replays compensations newest first. Failures are logged and skipped.
    pub(crate) async fn run(self, marketplaces: &MarketplaceRegistry) {
        for step in self.steps.into_iter().rev() {
            tracing::debug!(?step, "rolling back");
            let outcome = match &step {
                Compensation::RemoveDir(dir) => remove_dir_if_exists(dir).await.map(|_| ()),
                Compensation::RemovePluginEntry {
                    marketplace,
                    plugin,
                } => marketplaces.remove_plugin(marketplace, plugin).await.map(|_| ()),
                Compensation::UnregisterMarketplace(name) => {
                    marketplaces.unregister_marketplace(name).await.map(|_| ())
                }
            };
            if let Err(e) = outcome {
                tracing::warn!(?step, error = %e, "rollback step failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Paths;
    use crate::marketplace::{Plugin, PluginSource};
    use crate::store::JsonStore;
    use tempfile::TempDir;

    #[tokio::test]
    async fn replays_in_reverse() {
        let tmp = TempDir::new().unwrap();
        let marketplaces = MarketplaceRegistry::new(JsonStore::new(), Paths::new(tmp.path()));
        let location = marketplaces.ensure_default_marketplace("local").await.unwrap();

        let plugin_dir = location.join("fmt");
        std::fs::create_dir_all(&plugin_dir).unwrap();
        marketplaces
            .add_plugin("local", Plugin::new("fmt", PluginSource::Path("./fmt".into())))
            .await
            .unwrap();

        let mut rollback = Rollback::new();
        rollback.push(Compensation::RemoveDir(plugin_dir.clone()));
        rollback.push(Compensation::RemovePluginEntry {
            marketplace: "local".into(),
            plugin: "fmt".into(),
        });
        rollback.push(Compensation::RemoveDir(tmp.path().join("never-created")));
        assert_eq!(rollback.steps().len(), 3);

        rollback.run(&marketplaces).await;

        assert!(!plugin_dir.exists());
        assert!(marketplaces.manifest("local").await.unwrap().plugins.is_empty());
    }
}
