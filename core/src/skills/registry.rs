use std::fs;
use std::path::{Path, PathBuf};

use super::clients::{Client, Scope, SkillRoots};
use super::{Skill, load_skill};
use crate::error::{Error, Result, is_unsafe_name};

/// A skill directory found under a client's skills directory.
#[derive(Debug, Clone)]
pub struct InstalledSkill {
    /// Directory name, which is what installs and updates key on.
    pub dir_name: String,
    pub client: &'static Client,
    pub scope: Scope,
    pub path: PathBuf,
    /// `None` when `SKILL.md` is missing or unreadable.
    pub skill: Option<Skill>,
}

/// Installed skills for `clients`, local directories before global ones.
pub fn scan_installed(clients: &[&'static Client], roots: &SkillRoots) -> Result<Vec<InstalledSkill>> {
    let mut installed = Vec::new();
    for client in clients {
        for (scope, dir) in client.dirs(roots) {
            installed.extend(scan_dir(&dir, client, scope)?);
        }
    }
    Ok(installed)
}

fn scan_dir(dir: &Path, client: &'static Client, scope: Scope) -> Result<Vec<InstalledSkill>> {
    if !dir.exists() {
        tracing::debug!("Skills directory does not exist: {}", dir.display());
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut found = Vec::new();
    let mut skipped = 0;

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();

        if !path.is_dir() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            skipped += 1;
            continue;
        };

        if is_unsafe_name(name) {
            tracing::warn!("Skipping unsafe skill name: {}", name);
            skipped += 1;
            continue;
        }

        let skill = match load_skill(&path) {
            Ok(skill) => Some(skill),
            Err(e) => {
                tracing::warn!("Failed to load skill '{}': {}", name, e);
                None
            }
        };

        found.push(InstalledSkill {
            dir_name: name.to_string(),
            client,
            scope,
            path,
            skill,
        });
    }

    found.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
    tracing::debug!(
        client = client.id,
        %scope,
        found = found.len(),
        skipped,
        path = %dir.display(),
        "Skills scanned"
    );

    Ok(found)
}
