//! Installs skills for a client.
//!
//! Each skill lands in `<client dir>/<skill name>`, replacing any previous
//! copy, and must carry a non-empty `SKILL.md` to be kept.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use super::clients::{Client, Scope, SkillRoots};
use super::manifest::SKILL_FILE;
use crate::config::{self, Paths};
use crate::error::{Error, Result, ensure_safe_name};
use crate::fetch::{RemoteFetcher, copy_dir_recursive, has_skill_md, remove_dir_if_exists};
use crate::registry::HttpRegistry;
use crate::store::JsonStore;
use crate::target::{InstallTarget, RepoSpec, SkillIdentifier, parse_install_target};
use crate::traits::{Fetcher, RegistryApi, Reporter};

/// How deep a downloaded repository is searched for skill directories.
const MAX_SCAN_DEPTH: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledSkillReport {
    pub name: String,
    pub path: PathBuf,
    pub source_url: String,
    /// A previous copy was replaced.
    pub updated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillInstallReport {
    pub client: &'static str,
    pub requested_scope: Scope,
    pub scope: Scope,
    pub dir: PathBuf,
    pub skills: Vec<InstalledSkillReport>,
}

impl SkillInstallReport {
    /// The client had no global directory.
    pub fn fell_back_to_local(&self) -> bool {
        self.requested_scope != self.scope
    }
}

pub struct SkillInstaller {
    registry: Arc<dyn RegistryApi>,
    fetcher: Arc<dyn Fetcher>,
    roots: SkillRoots,
}

impl SkillInstaller {
    pub fn new(registry: Arc<dyn RegistryApi>, fetcher: Arc<dyn Fetcher>, roots: SkillRoots) -> Self {
        Self {
            registry,
            fetcher,
            roots,
        }
    }

    /// Installer wired to the configured registry. The plugin config is
    /// read if present, never created.
    pub async fn connect(paths: &Paths, roots: SkillRoots) -> Self {
        let config = config::load(&JsonStore::new(), paths).await;
        Self::new(
            Arc::new(HttpRegistry::new(config.registry_url())),
            Arc::new(RemoteFetcher::new()),
            roots,
        )
    }

    pub fn registry(&self) -> &dyn RegistryApi {
        self.registry.as_ref()
    }

    pub fn roots(&self) -> &SkillRoots {
        &self.roots
    }

    pub async fn install(
        &self,
        identifier: &str,
        client: &'static Client,
        scope: Scope,
        reporter: &dyn Reporter,
    ) -> Result<SkillInstallReport> {
        let target = parse_install_target(identifier)?;

        let effective = client.effective_scope(scope);
        if effective != scope {
            reporter.note(&format!(
                "{} has no global skills directory, installing locally",
                client.name
            ));
        }
        let dir = client.dir(effective, &self.roots);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::io(&dir, e))?;

        let skills = match target {
            InstallTarget::RegistrySkill(id) => {
                vec![self.install_registry_skill(identifier, &id, &dir, reporter).await?]
            }
            InstallTarget::GitSkillPath { repo, subdir } => {
                let name = subdir.rsplit('/').next().unwrap_or(&subdir).to_string();
                let source_url = repo.web_url(Some(&subdir));
                vec![self.install_one(&name, &source_url, &dir, reporter).await?]
            }
            InstallTarget::GitRepo(repo) => self.install_repo(&repo, &dir, reporter).await?,
        };

        Ok(SkillInstallReport {
            client: client.id,
            requested_scope: scope,
            scope: effective,
            dir,
            skills,
        })
    }

    async fn install_registry_skill(
        &self,
        identifier: &str,
        id: &SkillIdentifier,
        dir: &Path,
        reporter: &dyn Reporter,
    ) -> Result<InstalledSkillReport> {
        reporter.step("Resolving skill from registry...");
        let info = self
            .registry
            .resolve_skill(id)
            .await
            .ok_or_else(|| Error::resolution(identifier))?;
        tracing::info!(skill = %id.namespace(), source_url = %info.source_url, "resolved");

        let installed = self.install_one(&id.skill_name, &info.source_url, dir, reporter).await?;
        self.registry.track_installation(id).await;
        Ok(installed)
    }

    /// Every skill the registry lists under the repository, or every
    /// `SKILL.md` directory in its archive when the registry has none.
    async fn install_repo(
        &self,
        repo: &RepoSpec,
        dir: &Path,
        reporter: &dyn Reporter,
    ) -> Result<Vec<InstalledSkillReport>> {
        reporter.step(&format!("Looking up skills in {}...", repo.slug()));
        let Some(resolved) = self.registry.resolve_target(&repo.slug()).await else {
            return self.install_from_archive(repo, dir, reporter).await;
        };

        let mut installed = Vec::with_capacity(resolved.len());
        for skill in resolved {
            installed.push(self.install_one(&skill.name, &skill.source_url, dir, reporter).await?);
            if let Some(id) = SkillIdentifier::parse(&skill.namespace) {
                self.registry.track_installation(&id).await;
            }
        }
        Ok(installed)
    }

    async fn install_from_archive(
        &self,
        repo: &RepoSpec,
        dir: &Path,
        reporter: &dyn Reporter,
    ) -> Result<Vec<InstalledSkillReport>> {
        let source_url = repo.web_url(None);
        let scratch = tempfile::tempdir().map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let checkout = scratch.path().join(&repo.repo);

        reporter.step(&format!("Downloading {}...", repo.slug()));
        self.fetcher.download_skill(&source_url, &checkout).await?;

        let found = find_skill_dirs(&checkout, &repo.repo).await?;
        if found.is_empty() {
            return Err(Error::validation(
                "skill",
                format!("no {SKILL_FILE} found in {}", repo.slug()),
            ));
        }

        let mut installed = Vec::with_capacity(found.len());
        for (name, src) in found {
            ensure_safe_name(&name)?;
            let relative = src.strip_prefix(&checkout).unwrap_or(&src);
            let skill_url = match relative.to_str() {
                Some("") | None => source_url.clone(),
                Some(rel) => repo.web_url(Some(rel)),
            };

            let dest = dir.join(&name);
            let updated = tokio::fs::try_exists(&dest).await.unwrap_or(false);
            reporter.step(&format!("Installing {name}..."));
            remove_dir_if_exists(&dest).await?;
            copy_dir_recursive(&src, &dest).await?;
            self.ensure_valid(&dest).await?;

            installed.push(InstalledSkillReport {
                name,
                path: dest,
                source_url: skill_url,
                updated,
            });
        }
        Ok(installed)
    }

    async fn install_one(
        &self,
        name: &str,
        source_url: &str,
        dir: &Path,
        reporter: &dyn Reporter,
    ) -> Result<InstalledSkillReport> {
        ensure_safe_name(name)?;
        let dest = dir.join(name);
        let updated = tokio::fs::try_exists(&dest).await.unwrap_or(false);
        if updated {
            reporter.note(&format!(
                "Existing installation found at {}, it will be overwritten",
                dest.display()
            ));
        }

        reporter.step(&format!("Installing {name}..."));
        self.fetcher.download_skill(source_url, &dest).await?;
        self.ensure_valid(&dest).await?;

        tracing::info!(skill = name, path = %dest.display(), updated, "skill installed");
        Ok(InstalledSkillReport {
            name: name.to_string(),
            path: dest,
            source_url: source_url.to_string(),
            updated,
        })
    }

    async fn ensure_valid(&self, dest: &Path) -> Result<()> {
        if has_skill_md(dest).await {
            return Ok(());
        }
        remove_dir_if_exists(dest).await?;
        Err(Error::validation("skill", "missing or empty SKILL.md"))
    }
}

/// Directories holding a `SKILL.md`, named after themselves. The root is
/// named `root_name`.
async fn find_skill_dirs(root: &Path, root_name: &str) -> Result<Vec<(String, PathBuf)>> {
    let root = root.to_path_buf();
    let root_name = root_name.to_string();
    tokio::task::spawn_blocking(move || {
        let mut found: Vec<(String, PathBuf)> = Vec::new();
        let walker = WalkDir::new(&root)
            .max_depth(MAX_SCAN_DEPTH)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker.flatten() {
            if !entry.file_type().is_dir() || !entry.path().join(SKILL_FILE).is_file() {
                continue;
            }
            let name = if entry.depth() == 0 {
                root_name.clone()
            } else {
                entry.file_name().to_string_lossy().into_owned()
            };
            if found.iter().any(|(existing, _)| *existing == name) {
                tracing::warn!(skill = %name, path = %entry.path().display(), "duplicate skill name, skipping");
                continue;
            }
            found.push((name, entry.into_path()));
        }
        found
    })
    .await
    .map_err(|e| Error::io(Path::new("."), std::io::Error::other(e)))
}
