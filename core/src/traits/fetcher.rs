use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// Moves remote content onto the local filesystem.
///
/// Both operations leave `dest` absent when they fail.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Shallow clone of `url` at `git_ref` (default branch when `None`).
    async fn clone_repo(&self, url: &str, git_ref: Option<&str>, dest: &Path) -> Result<()>;

    /// Downloads the directory a GitHub URL points at (the whole repo when it
    /// names no subdirectory) into `dest`, replacing anything there.
    async fn download_skill(&self, source_url: &str, dest: &Path) -> Result<()>;
}
