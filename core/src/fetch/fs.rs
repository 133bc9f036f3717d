use std::io::ErrorKind;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Removes `path` recursively. Returns whether anything was there.
pub async fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Moves `src` to `dest`, replacing whatever is at `dest`. Falls back to
/// copy + delete when the rename crosses filesystems.
pub async fn move_dir(src: &Path, dest: &Path) -> Result<()> {
    remove_dir_if_exists(dest).await?;
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }

    match tokio::fs::rename(src, dest).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::debug!(
                src = %src.display(),
                dest = %dest.display(),
                error = %e,
                "rename failed, copying instead"
            );
            copy_dir_recursive(src, dest).await?;
            remove_dir_if_exists(src).await?;
            Ok(())
        }
    }
}

/// Copies a directory tree. Symlinks are skipped.
pub async fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || copy_tree(&src, &dest))
        .await
        .map_err(|e| Error::io(Path::new("."), std::io::Error::other(e)))?
}

fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;

    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            Error::io(path, std::io::Error::other(e))
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| Error::io(&target, e))?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target).map_err(|e| Error::io(&target, e))?;
        }
    }
    Ok(())
}

/// Whether `dir` holds a non-empty `SKILL.md`.
pub async fn has_skill_md(dir: &Path) -> bool {
    match tokio::fs::read_to_string(dir.join("SKILL.md")).await {
        Ok(content) => !content.trim().is_empty(),
        Err(_) => false,
    }
}
