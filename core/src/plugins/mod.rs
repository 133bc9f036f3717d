//! Install, enable, disable and remove plugins.
//!
//! Install runs as a fixed sequence: resolve, fetch into a temp directory,
//! validate, move into place, register, enable. Every step after the move
//! pushes a compensation so a failure leaves disk and state as they were.

mod rollback;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rollback::{Compensation, Rollback};

use crate::config::{self, Paths};
use crate::error::{Error, Result, ensure_safe_name};
use crate::fetch::{RemoteFetcher, move_dir, remove_dir_if_exists};
use crate::marketplace::{
    ArtifactKind, MarketplaceRegistry, detect_artifact, extract_plugin_metadata,
    marketplace_name, validate_plugin_dir,
};
use crate::registry::HttpRegistry;
use crate::settings::{PluginEntry, SettingsStore};
use crate::store::JsonStore;
use crate::target::{InstallTarget, extract_plugin_name, parse_install_target};
use crate::traits::{Fetcher, RegistryApi, Reporter};

const TEMP_PREFIX: &str = ".temp-";

/// Directory name for an install: the repository for git-shaped
/// identifiers, so `/tree/<ref>` URLs are not named after the branch.
fn install_name(identifier: &str) -> String {
    match parse_install_target(identifier) {
        Ok(InstallTarget::GitRepo(repo)) => repo.repo,
        _ => extract_plugin_name(identifier),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Name the plugin is enabled under.
    pub plugin: String,
    pub marketplace: String,
    pub kind: ArtifactKind,
    pub location: PathBuf,
    pub source_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableOutcome {
    Enabled { marketplace: String },
    AlreadyEnabled { marketplace: String },
}

/// What `disable` or `remove` deleted from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// External marketplace: only the flag changed.
    None,
    PluginDir(PathBuf),
    /// The local marketplace had no plugins left.
    Marketplace(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisableReport {
    pub marketplace: String,
    pub cleanup: Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveReport {
    pub marketplace: String,
    pub cleanup: Cleanup,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceGroup {
    pub marketplace: String,
    pub plugins: Vec<PluginEntry>,
}

pub struct PluginManager {
    paths: Paths,
    store: JsonStore,
    marketplaces: MarketplaceRegistry,
    settings: SettingsStore,
    registry: Arc<dyn RegistryApi>,
    fetcher: Arc<dyn Fetcher>,
}

impl PluginManager {
    pub fn new(
        paths: Paths,
        store: JsonStore,
        registry: Arc<dyn RegistryApi>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            marketplaces: MarketplaceRegistry::new(store.clone(), paths.clone()),
            settings: SettingsStore::new(store.clone(), paths.clone()),
            paths,
            store,
            registry,
            fetcher,
        }
    }

    /// Manager wired to the configured registry and the network fetchers.
    pub async fn connect(paths: Paths) -> Result<Self> {
        let store = JsonStore::new();
        paths.ensure_directories().await?;
        let config = config::load_or_init(&store, &paths).await?;
        let registry = HttpRegistry::new(config.registry_url());
        Ok(Self::new(
            paths,
            store,
            Arc::new(registry),
            Arc::new(RemoteFetcher::new()),
        ))
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn store(&self) -> &JsonStore {
        &self.store
    }

    pub fn marketplaces(&self) -> &MarketplaceRegistry {
        &self.marketplaces
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn registry(&self) -> Arc<dyn RegistryApi> {
        Arc::clone(&self.registry)
    }

    pub fn fetcher(&self) -> Arc<dyn Fetcher> {
        Arc::clone(&self.fetcher)
    }

    /// Registry lookup first, then the clone URL of a git-shaped identifier.
    async fn resolve(&self, identifier: &str) -> Result<(String, Option<String>)> {
        if let Some(url) = self.registry.resolve_plugin_url(identifier).await {
            return Ok((url, None));
        }
        match parse_install_target(identifier) {
            Ok(InstallTarget::GitRepo(repo)) => {
                tracing::debug!(identifier, clone_url = %repo.clone_url, "registry miss, assuming GitHub");
                Ok((repo.clone_url, repo.git_ref))
            }
            _ => Err(Error::resolution(identifier)),
        }
    }

    pub async fn install(&self, identifier: &str, reporter: &dyn Reporter) -> Result<InstallReport> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(crate::target::ParseError::Empty.into());
        }
        let name = install_name(identifier);
        ensure_safe_name(&name)?;

        self.paths.ensure_directories().await?;
        let config = config::load_or_init(&self.store, &self.paths).await?;

        reporter.step("Resolving plugin URL...");
        let (url, git_ref) = self.resolve(identifier).await?;
        tracing::info!(identifier, url = %url, "resolved");

        let temp = self.paths.marketplaces_dir().join(format!("{TEMP_PREFIX}{name}"));
        remove_dir_if_exists(&temp).await?;

        let outcome = self
            .install_from_temp(&name, &url, git_ref.as_deref(), &temp, &config.default_marketplace, reporter)
            .await;

        if let Err(e) = remove_dir_if_exists(&temp).await {
            tracing::warn!(temp = %temp.display(), error = %e, "failed to remove temp directory");
        }
        outcome
    }

    async fn install_from_temp(
        &self,
        name: &str,
        url: &str,
        git_ref: Option<&str>,
        temp: &Path,
        default_marketplace: &str,
        reporter: &dyn Reporter,
    ) -> Result<InstallReport> {
        reporter.step("Cloning repository...");
        self.fetcher.clone_repo(url, git_ref, temp).await?;

        reporter.step("Validating plugin structure...");
        validate_plugin_dir(temp).await?;
        let kind = detect_artifact(temp).await?;

        let mut rollback = Rollback::new();
        let installed = match kind {
            ArtifactKind::Marketplace => {
                self.install_marketplace(name, url, temp, &mut rollback, reporter)
                    .await
            }
            ArtifactKind::Plugin => {
                self.install_plugin(name, temp, default_marketplace, &mut rollback, reporter)
                    .await
            }
        };

        match installed {
            Ok((plugin, marketplace, location)) => Ok(InstallReport {
                plugin,
                marketplace,
                kind,
                location,
                source_url: url.to_string(),
            }),
            Err(e) => {
                tracing::warn!(plugin = name, error = %e, "install failed, rolling back");
                rollback.run(&self.marketplaces).await;
                Err(e)
            }
        }
    }

    async fn install_marketplace(
        &self,
        name: &str,
        url: &str,
        temp: &Path,
        rollback: &mut Rollback,
        reporter: &dyn Reporter,
    ) -> Result<(String, String, PathBuf)> {
        let marketplace = marketplace_name(temp, name).await?;
        let location = self.paths.marketplaces_dir().join(&marketplace);

        reporter.step(&format!("Installing marketplace {marketplace}..."));
        move_dir(temp, &location).await?;
        rollback.push(Compensation::RemoveDir(location.clone()));

        self.marketplaces
            .register_marketplace(&marketplace, location.clone(), url)
            .await?;
        rollback.push(Compensation::UnregisterMarketplace(marketplace.clone()));

        let plugin = self
            .marketplaces
            .manifest(&marketplace)
            .await
            .and_then(|manifest| match manifest.plugins.as_slice() {
                _ if manifest.plugin(name).is_some() => Some(name.to_string()),
                [only] => Some(only.name.clone()),
                _ => None,
            })
            .unwrap_or_else(|| name.to_string());

        self.settings
            .enable_plugin(&plugin, &marketplace)
            .await
            .map_err(|e| Error::registration(&plugin, e))?;

        Ok((plugin, marketplace, location))
    }

    async fn install_plugin(
        &self,
        name: &str,
        temp: &Path,
        marketplace: &str,
        rollback: &mut Rollback,
        reporter: &dyn Reporter,
    ) -> Result<(String, String, PathBuf)> {
        let registered = self.marketplaces.get(marketplace).await.is_some();
        let dir_existed = tokio::fs::try_exists(self.paths.marketplaces_dir().join(marketplace))
            .await
            .unwrap_or(true);
        let marketplace_dir = self.marketplaces.ensure_default_marketplace(marketplace).await?;
        if !registered {
            if !dir_existed {
                rollback.push(Compensation::RemoveDir(marketplace_dir.clone()));
            }
            rollback.push(Compensation::UnregisterMarketplace(marketplace.to_string()));
        }
        let location = marketplace_dir.join(name);

        reporter.step(&format!("Installing plugin {name}..."));
        move_dir(temp, &location).await?;
        rollback.push(Compensation::RemoveDir(location.clone()));

        let plugin = extract_plugin_metadata(&location, name).await?;
        let declared = plugin.name.clone();
        ensure_safe_name(&declared)?;

        let added = self
            .marketplaces
            .add_plugin(marketplace, plugin)
            .await
            .map_err(|e| Error::registration(&declared, e))?;
        if !added {
            return Err(Error::registration(
                &declared,
                format!("manifest for marketplace \"{marketplace}\" not found"),
            ));
        }
        rollback.push(Compensation::RemovePluginEntry {
            marketplace: marketplace.to_string(),
            plugin: declared.clone(),
        });

        self.settings
            .enable_plugin(&declared, marketplace)
            .await
            .map_err(|e| Error::registration(&declared, e))?;

        Ok((declared, marketplace.to_string(), location))
    }

    pub async fn enable(&self, plugin: &str) -> Result<EnableOutcome> {
        let entry = self.find(plugin).await?;
        if entry.enabled {
            return Ok(EnableOutcome::AlreadyEnabled {
                marketplace: entry.marketplace,
            });
        }
        self.settings.enable_plugin(plugin, &entry.marketplace).await?;
        Ok(EnableOutcome::Enabled {
            marketplace: entry.marketplace,
        })
    }

    pub async fn disable(&self, plugin: &str, reporter: &dyn Reporter) -> Result<DisableReport> {
        let entry = self.find(plugin).await?;
        let marketplace = entry.marketplace;
        self.settings.disable_plugin(plugin, &marketplace).await?;

        if !self.marketplaces.is_local(&marketplace).await {
            return Ok(DisableReport {
                marketplace,
                cleanup: Cleanup::None,
            });
        }
        let Some(location) = self.marketplaces.install_location(&marketplace).await else {
            return Ok(DisableReport {
                marketplace,
                cleanup: Cleanup::None,
            });
        };

        let siblings_enabled = self
            .settings
            .list_plugins()
            .await?
            .iter()
            .any(|e| e.marketplace == marketplace && e.name != plugin && e.enabled);

        let cleanup = if siblings_enabled {
            let dir = self.plugin_dir(&marketplace, &location, plugin).await;
            reporter.step(&format!("Removing {}...", dir.display()));
            remove_dir_if_exists(&dir).await?;
            Cleanup::PluginDir(dir)
        } else {
            self.drop_marketplace(&marketplace, location, reporter).await?
        };

        Ok(DisableReport {
            marketplace,
            cleanup,
        })
    }

    async fn drop_marketplace(
        &self,
        marketplace: &str,
        location: PathBuf,
        reporter: &dyn Reporter,
    ) -> Result<Cleanup> {
        reporter.step(&format!("Removing empty marketplace {marketplace}..."));
        remove_dir_if_exists(&location).await?;
        self.marketplaces.unregister_marketplace(marketplace).await?;
        tracing::info!(marketplace, "local marketplace removed");
        Ok(Cleanup::Marketplace(location))
    }

    pub async fn remove(&self, plugin: &str, reporter: &dyn Reporter) -> Result<RemoveReport> {
        ensure_safe_name(plugin)?;
        let marketplace = match self.settings.find(plugin).await? {
            Some(entry) => entry.marketplace,
            None => config::load_or_init(&self.store, &self.paths).await?.default_marketplace,
        };

        let in_settings = self
            .settings
            .list_plugins()
            .await?
            .iter()
            .any(|e| e.name == plugin && e.marketplace == marketplace);
        let listed = self
            .marketplaces
            .manifest(&marketplace)
            .await
            .is_some_and(|manifest| manifest.plugin(plugin).is_some());
        if !in_settings && !listed {
            return Err(Error::NotInstalled(plugin.to_string()));
        }

        reporter.step(&format!("Removing {plugin}..."));
        let location = self.marketplaces.install_location(&marketplace).await;
        let dir = match &location {
            Some(location) => Some(self.plugin_dir(&marketplace, location, plugin).await),
            None => None,
        };

        self.settings.remove_plugin(plugin, &marketplace).await?;
        self.marketplaces.remove_plugin(&marketplace, plugin).await?;
        remove_dir_if_exists(&self.paths.cache_dir().join(plugin)).await?;

        let mut cleanup = Cleanup::None;
        if self.marketplaces.is_local(&marketplace).await
            && let (Some(location), Some(dir)) = (location, dir)
        {
            let siblings_enabled = self
                .settings
                .list_plugins()
                .await?
                .iter()
                .any(|e| e.marketplace == marketplace && e.enabled);
            let siblings_listed = self
                .marketplaces
                .manifest(&marketplace)
                .await
                .is_some_and(|manifest| !manifest.plugins.is_empty());

            if !siblings_enabled && !siblings_listed {
                cleanup = self.drop_marketplace(&marketplace, location, reporter).await?;
            } else if remove_dir_if_exists(&dir).await? {
                cleanup = Cleanup::PluginDir(dir);
            }
        }

        tracing::info!(plugin, marketplace = %marketplace, "plugin removed");
        Ok(RemoveReport {
            marketplace,
            cleanup,
        })
    }

    /// Installed plugins grouped by marketplace, both sorted by name.
    pub async fn list(&self) -> Result<Vec<MarketplaceGroup>> {
        let mut groups: BTreeMap<String, Vec<PluginEntry>> = BTreeMap::new();
        for entry in self.settings.list_plugins().await? {
            groups.entry(entry.marketplace.clone()).or_default().push(entry);
        }
        Ok(groups
            .into_iter()
            .map(|(marketplace, mut plugins)| {
                plugins.sort_by(|a, b| a.name.cmp(&b.name));
                MarketplaceGroup {
                    marketplace,
                    plugins,
                }
            })
            .collect())
    }

    async fn find(&self, plugin: &str) -> Result<PluginEntry> {
        self.settings
            .find(plugin)
            .await?
            .ok_or_else(|| Error::NotInstalled(plugin.to_string()))
    }

    /// The manifest's directory source when it lies inside the marketplace,
    /// else `<location>/<plugin>`.
    async fn plugin_dir(&self, marketplace: &str, location: &Path, plugin: &str) -> PathBuf {
        self.marketplaces
            .manifest(marketplace)
            .await
            .and_then(|manifest| manifest.plugin(plugin)?.source.directory())
            .filter(|dir| dir.starts_with(location) && dir != location)
            .unwrap_or_else(|| location.join(plugin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::copy_dir_recursive;
    use crate::marketplace::{MARKETPLACE_FILE, PLUGIN_FILE, PLUGIN_META_DIR, manifest_path};
    use crate::target::SkillIdentifier;
    use crate::traits::{ResolvedSkill, SearchParams, SearchResponse, SkillInfo};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;

    const DEFAULT: &str = "claude-plugin-marketplace";

    #[derive(Default)]
    struct FakeRegistry {
        urls: HashMap<String, String>,
    }

    #[async_trait]
    impl RegistryApi for FakeRegistry {
        async fn resolve_plugin_url(&self, identifier: &str) -> Option<String> {
            self.urls.get(identifier).cloned()
        }

        async fn resolve_skill(&self, _identifier: &SkillIdentifier) -> Option<SkillInfo> {
            None
        }

        async fn resolve_target(&self, _target: &str) -> Option<Vec<ResolvedSkill>> {
            None
        }

        async fn search_skills(&self, _params: &SearchParams) -> Result<SearchResponse> {
            Ok(SearchResponse::default())
        }

        async fn track_installation(&self, _identifier: &SkillIdentifier) {}
    }

    /// Serves clones by copying fixture directories.
    #[derive(Default)]
    struct FakeFetcher {
        repos: HashMap<String, PathBuf>,
        cloned: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn clone_repo(&self, url: &str, git_ref: Option<&str>, dest: &Path) -> Result<()> {
            self.cloned
                .lock()
                .unwrap()
                .push((url.to_string(), git_ref.map(str::to_string)));
            match self.repos.get(url) {
                Some(fixture) => copy_dir_recursive(fixture, dest).await,
                None => Err(Error::fetch(url, "repository not found")),
            }
        }

        async fn download_skill(&self, source_url: &str, _dest: &Path) -> Result<()> {
            Err(Error::fetch(source_url, "not supported"))
        }
    }

    struct Harness {
        _tmp: TempDir,
        fixtures: PathBuf,
        root: PathBuf,
        urls: HashMap<String, String>,
        repos: HashMap<String, PathBuf>,
    }

    impl Harness {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let fixtures = tmp.path().join("fixtures");
            let root = tmp.path().join("claude");
            Self {
                _tmp: tmp,
                fixtures,
                root,
                urls: HashMap::new(),
                repos: HashMap::new(),
            }
        }

        fn repo(&mut self, url: &str, name: &str, file: &str, meta: Value) -> PathBuf {
            let dir = self.fixtures.join(name);
            std::fs::create_dir_all(dir.join(PLUGIN_META_DIR)).unwrap();
            std::fs::write(dir.join(PLUGIN_META_DIR).join(file), meta.to_string()).unwrap();
            std::fs::write(dir.join("README.md"), "# fixture").unwrap();
            self.repos.insert(url.to_string(), dir.clone());
            dir
        }

        fn plugin_repo(&mut self, url: &str, name: &str) {
            self.repo(
                url,
                name,
                PLUGIN_FILE,
                json!({"name": name, "description": format!("{name} plugin"), "version": "0.3.0"}),
            );
        }

        fn registry_entry(&mut self, identifier: &str, url: &str) {
            self.urls.insert(identifier.to_string(), url.to_string());
        }

        fn manager(&self) -> PluginManager {
            PluginManager::new(
                Paths::new(&self.root),
                JsonStore::new(),
                Arc::new(FakeRegistry {
                    urls: self.urls.clone(),
                }),
                Arc::new(FakeFetcher {
                    repos: self.repos.clone(),
                    cloned: Mutex::default(),
                }),
            )
        }

        fn marketplaces_dir(&self) -> PathBuf {
            self.root.join("plugins/marketplaces")
        }

        fn enabled(&self) -> Value {
            let raw = std::fs::read_to_string(self.root.join("settings.json")).unwrap();
            serde_json::from_str::<Value>(&raw).unwrap()["enabledPlugins"].clone()
        }
    }

    #[tokio::test]
    async fn installs_plugin_into_local_marketplace() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/formatter.git", "formatter");
        h.registry_entry("@acme/formatter", "https://github.com/acme/formatter.git");
        let manager = h.manager();

        let report = manager.install("@acme/formatter", &()).await.unwrap();
        assert_eq!(report.plugin, "formatter");
        assert_eq!(report.marketplace, DEFAULT);
        assert_eq!(report.kind, ArtifactKind::Plugin);

        let location = h.marketplaces_dir().join(DEFAULT).join("formatter");
        assert_eq!(report.location, location);
        assert!(location.join("README.md").is_file());
        assert!(!h.marketplaces_dir().join(".temp-formatter").exists());

        let manifest = manager.marketplaces().manifest(DEFAULT).await.unwrap();
        let plugin = manifest.plugin("formatter").unwrap();
        assert_eq!(plugin.version.as_deref(), Some("0.3.0"));
        assert_eq!(plugin.source.directory(), Some(location));

        assert_eq!(h.enabled()["formatter@claude-plugin-marketplace"], json!(true));
    }

    #[tokio::test]
    async fn falls_back_to_github_on_registry_miss() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/tools.git", "tools");
        let manager = h.manager();

        let report = manager.install("acme/tools", &()).await.unwrap();
        assert_eq!(report.source_url, "https://github.com/acme/tools.git");
        assert_eq!(h.enabled()["tools@claude-plugin-marketplace"], json!(true));
    }

    #[tokio::test]
    async fn github_tree_ref_is_passed_to_clone() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/tools.git", "tools");
        let fetcher = Arc::new(FakeFetcher {
            repos: h.repos.clone(),
            cloned: Mutex::default(),
        });
        let manager = PluginManager::new(
            Paths::new(&h.root),
            JsonStore::new(),
            Arc::new(FakeRegistry::default()),
            fetcher.clone(),
        );

        let report = manager
            .install("https://github.com/acme/tools/tree/dev", &())
            .await
            .unwrap();
        assert!(report.location.ends_with("claude-plugin-marketplace/tools"));
        let cloned = fetcher.cloned.lock().unwrap().clone();
        assert_eq!(
            cloned,
            vec![("https://github.com/acme/tools.git".to_string(), Some("dev".to_string()))]
        );
    }

    #[tokio::test]
    async fn unresolvable_identifier_has_no_side_effects() {
        let h = Harness::new();
        let manager = h.manager();

        let err = manager.install("@acme/some/thing", &()).await.unwrap_err();
        assert!(err.is_resolution());
        assert!(!h.marketplaces_dir().join(DEFAULT).exists());
        assert_eq!(
            std::fs::read_dir(h.marketplaces_dir()).unwrap().count(),
            0
        );
    }

    #[tokio::test]
    async fn failed_clone_leaves_no_temp_dir() {
        let h = Harness::new();
        let manager = h.manager();

        let err = manager.install("acme/missing", &()).await.unwrap_err();
        assert!(matches!(err, Error::Fetch { .. }));
        assert!(!h.marketplaces_dir().join(".temp-missing").exists());
    }

    #[tokio::test]
    async fn invalid_structure_is_rejected_and_cleaned() {
        let mut h = Harness::new();
        let dir = h.fixtures.join("bare");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("README.md"), "no metadata").unwrap();
        h.repos.insert("https://github.com/acme/bare.git".into(), dir);
        let manager = h.manager();

        let err = manager.install("acme/bare", &()).await.unwrap_err();
        assert!(err.to_string().contains("Missing .claude-plugin directory"));
        assert!(!h.marketplaces_dir().join(".temp-bare").exists());
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn installs_marketplace_under_declared_name() {
        let mut h = Harness::new();
        h.repo(
            "https://github.com/every/plugins.git",
            "plugins",
            MARKETPLACE_FILE,
            json!({
                "name": "every-marketplace",
                "owner": {"name": "Every"},
                "plugins": [{"name": "compounding-engineering", "source": "./plugins/ce"}]
            }),
        );
        let manager = h.manager();

        let report = manager.install("every/plugins", &()).await.unwrap();
        assert_eq!(report.kind, ArtifactKind::Marketplace);
        assert_eq!(report.marketplace, "every-marketplace");
        assert_eq!(report.plugin, "compounding-engineering");

        let location = h.marketplaces_dir().join("every-marketplace");
        assert!(manifest_path(&location).is_file());
        let entry = manager.marketplaces().get("every-marketplace").await.unwrap();
        assert_eq!(entry.source.describe(), "git: https://github.com/every/plugins.git");
        assert!(!manager.marketplaces().is_local("every-marketplace").await);

        assert_eq!(
            h.enabled()["compounding-engineering@every-marketplace"],
            json!(true)
        );
    }

    #[tokio::test]
    async fn registration_failure_rolls_back_moved_files() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/formatter.git", "formatter");
        let manager = h.manager();

        // Index entry whose manifest is missing: add_plugin cannot locate it.
        let location = h.marketplaces_dir().join(DEFAULT);
        manager
            .marketplaces()
            .register_marketplace(DEFAULT, location.clone(), "https://example.com/x.git")
            .await
            .unwrap();

        let err = manager.install("acme/formatter", &()).await.unwrap_err();
        assert!(matches!(err, Error::Registration { .. }));
        assert!(!location.join("formatter").exists());
        assert!(!h.marketplaces_dir().join(".temp-formatter").exists());
        assert!(manager.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reinstall_replaces_plugin_directory() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/formatter.git", "formatter");
        let manager = h.manager();
        manager.install("acme/formatter", &()).await.unwrap();

        let stale = h.marketplaces_dir().join(DEFAULT).join("formatter/stale.txt");
        std::fs::write(&stale, "old").unwrap();
        manager.install("acme/formatter", &()).await.unwrap();

        assert!(!stale.exists());
        let manifest = manager.marketplaces().manifest(DEFAULT).await.unwrap();
        assert_eq!(manifest.plugins.len(), 1);
    }

    #[tokio::test]
    async fn enable_reports_state() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/formatter.git", "formatter");
        let manager = h.manager();

        assert!(matches!(
            manager.enable("formatter").await,
            Err(Error::NotInstalled(_))
        ));

        manager.install("acme/formatter", &()).await.unwrap();
        assert_eq!(
            manager.enable("formatter").await.unwrap(),
            EnableOutcome::AlreadyEnabled {
                marketplace: DEFAULT.into()
            }
        );

        manager.settings().disable_plugin("formatter", DEFAULT).await.unwrap();
        assert_eq!(
            manager.enable("formatter").await.unwrap(),
            EnableOutcome::Enabled {
                marketplace: DEFAULT.into()
            }
        );
        assert_eq!(h.enabled()["formatter@claude-plugin-marketplace"], json!(true));
    }

    #[tokio::test]
    async fn disable_unknown_plugin_is_not_installed() {
        let h = Harness::new();
        assert!(matches!(
            h.manager().disable("ghost", &()).await,
            Err(Error::NotInstalled(_))
        ));
    }

    #[tokio::test]
    async fn disabling_last_local_plugin_removes_marketplace() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/a.git", "a");
        h.plugin_repo("https://github.com/acme/b.git", "b");
        let manager = h.manager();
        manager.install("acme/a", &()).await.unwrap();
        manager.install("acme/b", &()).await.unwrap();
        let location = h.marketplaces_dir().join(DEFAULT);

        let report = manager.disable("a", &()).await.unwrap();
        assert_eq!(report.cleanup, Cleanup::PluginDir(location.join("a")));
        assert!(!location.join("a").exists());
        assert!(location.join("b").exists());
        assert!(manager.marketplaces().get(DEFAULT).await.is_some());
        // Orphaned manifest entry stays until an explicit remove.
        let manifest = manager.marketplaces().manifest(DEFAULT).await.unwrap();
        assert!(manifest.plugin("a").is_some());

        let report = manager.disable("b", &()).await.unwrap();
        assert_eq!(report.cleanup, Cleanup::Marketplace(location.clone()));
        assert!(!location.exists());
        assert!(manager.marketplaces().get(DEFAULT).await.is_none());
        assert_eq!(h.enabled()["b@claude-plugin-marketplace"], json!(false));
    }

    #[tokio::test]
    async fn disabling_external_plugin_only_flips_flag() {
        let mut h = Harness::new();
        h.repo(
            "https://github.com/every/plugins.git",
            "plugins",
            MARKETPLACE_FILE,
            json!({"name": "every", "plugins": [{"name": "ce", "source": "./ce"}]}),
        );
        let manager = h.manager();
        manager.install("every/plugins", &()).await.unwrap();

        let report = manager.disable("ce", &()).await.unwrap();
        assert_eq!(report.cleanup, Cleanup::None);
        assert!(h.marketplaces_dir().join("every").is_dir());
        assert!(manager.marketplaces().get("every").await.is_some());
        assert_eq!(h.enabled()["ce@every"], json!(false));
    }

    #[tokio::test]
    async fn remove_erases_every_trace() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/a.git", "a");
        h.plugin_repo("https://github.com/acme/b.git", "b");
        let manager = h.manager();
        manager.install("acme/a", &()).await.unwrap();
        manager.install("acme/b", &()).await.unwrap();
        let cache = h.root.join("plugins/cache/a");
        std::fs::create_dir_all(&cache).unwrap();

        let report = manager.remove("a", &()).await.unwrap();
        let location = h.marketplaces_dir().join(DEFAULT);
        assert_eq!(report.cleanup, Cleanup::PluginDir(location.join("a")));
        assert!(!cache.exists());
        assert!(h.enabled().get("a@claude-plugin-marketplace").is_none());
        let manifest = manager.marketplaces().manifest(DEFAULT).await.unwrap();
        assert!(manifest.plugin("a").is_none());
        assert!(manifest.plugin("b").is_some());

        assert!(matches!(
            manager.remove("a", &()).await,
            Err(Error::NotInstalled(_))
        ));
    }

    #[tokio::test]
    async fn removing_last_local_plugin_removes_marketplace() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/a.git", "a");
        let manager = h.manager();
        manager.install("acme/a", &()).await.unwrap();
        let location = h.marketplaces_dir().join(DEFAULT);

        let report = manager.remove("a", &()).await.unwrap();
        assert_eq!(report.cleanup, Cleanup::Marketplace(location.clone()));
        assert!(!location.exists());
        assert!(manager.marketplaces().get(DEFAULT).await.is_none());
        assert!(h.enabled().get("a@claude-plugin-marketplace").is_none());
    }

    #[tokio::test]
    async fn remove_keeps_marketplace_with_listed_siblings() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/a.git", "a");
        h.plugin_repo("https://github.com/acme/b.git", "b");
        let manager = h.manager();
        manager.install("acme/a", &()).await.unwrap();
        manager.install("acme/b", &()).await.unwrap();
        manager.settings().disable_plugin("b", DEFAULT).await.unwrap();

        let report = manager.remove("a", &()).await.unwrap();
        let location = h.marketplaces_dir().join(DEFAULT);
        assert_eq!(report.cleanup, Cleanup::PluginDir(location.join("a")));
        assert!(location.join("b").is_dir());
        assert!(manager.marketplaces().get(DEFAULT).await.is_some());
    }

    #[tokio::test]
    async fn enable_failure_rolls_back_manifest_entry() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/a.git", "a");
        h.plugin_repo("https://github.com/acme/b.git", "b");
        let manager = h.manager();
        manager.install("acme/a", &()).await.unwrap();

        // A directory where settings.json should be makes the enable write fail.
        let settings = h.root.join("settings.json");
        std::fs::remove_file(&settings).unwrap();
        std::fs::create_dir(&settings).unwrap();

        let err = manager.install("acme/b", &()).await.unwrap_err();
        assert!(matches!(err, Error::Registration { ref name, .. } if name == "b"));

        let location = h.marketplaces_dir().join(DEFAULT);
        assert!(!location.join("b").exists());
        assert!(location.join("a").is_dir());
        let manifest = manager.marketplaces().manifest(DEFAULT).await.unwrap();
        assert!(manifest.plugin("b").is_none());
        assert!(manifest.plugin("a").is_some());
        assert!(manager.marketplaces().get(DEFAULT).await.is_some());
    }

    #[tokio::test]
    async fn failed_first_install_unregisters_new_marketplace() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/a.git", "a");
        let manager = h.manager();
        std::fs::create_dir_all(h.root.join("settings.json")).unwrap();

        let err = manager.install("acme/a", &()).await.unwrap_err();
        assert!(matches!(err, Error::Registration { .. }));
        assert!(!h.marketplaces_dir().join(DEFAULT).exists());
        assert!(manager.marketplaces().get(DEFAULT).await.is_none());
    }

    #[tokio::test]
    async fn hidden_install_names_are_rejected() {
        let mut h = Harness::new();
        h.plugin_repo("https://github.com/acme/formatter.git", "formatter");
        h.plugin_repo("https://github.com/acme/.claude-plugin.git", "evil");
        let manager = h.manager();
        manager.install("acme/formatter", &()).await.unwrap();

        for identifier in ["acme/.claude-plugin", "acme/.temp-formatter", "acme/."] {
            let err = manager.install(identifier, &()).await.unwrap_err();
            assert!(matches!(err, Error::UnsafeName(_)), "{identifier}: {err}");
        }

        let location = h.marketplaces_dir().join(DEFAULT);
        assert!(manifest_path(&location).is_file());
        let manifest = manager.marketplaces().manifest(DEFAULT).await.unwrap();
        assert!(manifest.plugin("formatter").is_some());
        assert!(manifest.plugin("evil").is_none());
        assert!(location.join("formatter").is_dir());
    }

    #[tokio::test]
    async fn remove_rejects_unsafe_names() {
        let h = Harness::new();
        assert!(matches!(
            h.manager().remove("../settings", &()).await,
            Err(Error::UnsafeName(_))
        ));
    }

    #[tokio::test]
    async fn list_groups_by_marketplace() {
        let h = Harness::new();
        let manager = h.manager();
        let settings = manager.settings();
        settings.enable_plugin("zeta", "local").await.unwrap();
        settings.enable_plugin("alpha", "local").await.unwrap();
        settings.disable_plugin("ce", "every").await.unwrap();

        let groups = manager.list().await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].marketplace, "every");
        assert!(!groups[0].plugins[0].enabled);
        let names: Vec<_> = groups[1].plugins.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }
}
