use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use super::KeyedMutex;
use crate::error::{Error, Result};

/// JSON files on disk, with every access to one path serialized through a
/// shared [`KeyedMutex`].
///
/// Reads never fail: a missing, blank or unparseable file reads as `None`.
/// Writes go to a sibling temp file which is renamed over the target.
#[derive(Clone, Default)]
pub struct JsonStore {
    locks: KeyedMutex,
}

enum Loaded<T> {
    Missing,
    Blank,
    Corrupt(String),
    Value(T),
}

impl<T> Loaded<T> {
    fn into_option(self) -> Option<T> {
        match self {
            Loaded::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl JsonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_locks(locks: KeyedMutex) -> Self {
        Self { locks }
    }

    pub async fn read<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let _guard = self.locks.lock(path).await;
        match load(path).await {
            Ok(loaded) => loaded.into_option(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read JSON file");
                None
            }
        }
    }

    pub async fn write<T: Serialize + ?Sized>(&self, path: &Path, data: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(data)?;
        let _guard = self.locks.lock(path).await;
        write_atomic(path, content.as_bytes()).await
    }

    /// Read-modify-write under one lock hold. A missing or unreadable file
    /// starts from `T::default()`.
    pub async fn update<T, R, F>(&self, path: &Path, f: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.locks.lock(path).await;
        let loaded = load(path).await.map_err(|e| Error::io(path, e))?;

        if let Loaded::Corrupt(raw) = &loaded {
            preserve_corrupt(path, raw).await;
        }

        let mut value = loaded.into_option().unwrap_or_default();
        let out = f(&mut value);
        let content = serde_json::to_string_pretty(&value)?;
        write_atomic(path, content.as_bytes()).await?;
        Ok(out)
    }

    /// Like [`JsonStore::update`] but leaves the file alone and returns `None`
    /// when there is nothing readable to modify.
    pub async fn update_existing<T, R, F>(&self, path: &Path, f: F) -> Result<Option<R>>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.locks.lock(path).await;
        let Some(mut value) = load(path).await.ok().and_then(Loaded::into_option) else {
            return Ok(None);
        };

        let out = f(&mut value);
        let content = serde_json::to_string_pretty(&value)?;
        write_atomic(path, content.as_bytes()).await?;
        Ok(Some(out))
    }
}

async fn load<T: DeserializeOwned>(path: &Path) -> std::io::Result<Loaded<T>> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Loaded::Missing),
        Err(e) => return Err(e),
    };

    if content.trim().is_empty() {
        return Ok(Loaded::Blank);
    }

    match serde_json::from_str(&content) {
        Ok(value) => Ok(Loaded::Value(value)),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse JSON, treating as empty");
            Ok(Loaded::Corrupt(content))
        }
    }
}

async fn preserve_corrupt(path: &Path, raw: &str) {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".corrupt");
    match tokio::fs::write(&backup, raw).await {
        Ok(()) => tracing::warn!(
            path = %path.display(),
            backup = ?backup,
            "unparseable JSON will be overwritten; previous contents saved"
        ),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to back up unparseable JSON"),
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state.json".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4().simple()));

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| Error::io(&tmp, e))?;
    file.write_all(content).await.map_err(|e| Error::io(&tmp, e))?;
    file.sync_all().await.map_err(|e| Error::io(&tmp, e))?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(Error::io(path, e));
    }

    Ok(())
}
