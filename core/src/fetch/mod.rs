//! Network fetch primitives: shallow git clones and GitHub tarball downloads.

pub mod fs;
pub mod git;
pub mod tarball;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::registry::RetryPolicy;
use crate::target::github::GITHUB_API;
use crate::target::normalize_github_path;
use crate::traits::Fetcher;

pub use fs::{copy_dir_recursive, has_skill_md, move_dir, remove_dir_if_exists};

pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// [`Fetcher`] backed by the `git` binary and the GitHub tarball API.
pub struct RemoteFetcher {
    client: reqwest::Client,
    api_base: String,
    retry: RetryPolicy,
    clone_timeout: Duration,
}

impl Default for RemoteFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("claude-plugins/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_base: GITHUB_API.to_string(),
            retry: RetryPolicy::default(),
            clone_timeout: git::CLONE_TIMEOUT,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_clone_timeout(mut self, timeout: Duration) -> Self {
        self.clone_timeout = timeout;
        self
    }
}

#[async_trait]
impl Fetcher for RemoteFetcher {
    async fn clone_repo(&self, url: &str, git_ref: Option<&str>, dest: &Path) -> Result<()> {
        git::clone(url, git_ref, dest, self.clone_timeout).await
    }

    async fn download_skill(&self, source_url: &str, dest: &Path) -> Result<()> {
        let gh = normalize_github_path(source_url);
        if gh.owner().is_empty() || gh.repo().is_empty() {
            return Err(Error::fetch(source_url, "not a GitHub repository URL"));
        }

        let url = format!("{}{}", self.api_base, gh.tarball_path());
        tracing::debug!(source_url, template = %gh.template(), url = %url, "downloading skill");

        let response = self
            .retry
            .run("tarball download", || {
                self.client
                    .get(&url)
                    .header("Accept", "application/vnd.github+json")
                    .send()
            })
            .await
            .map_err(|e| Error::fetch(source_url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::fetch(
                source_url,
                format!("HTTP {} from {url}", response.status()),
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::fetch(source_url, e.to_string()))?;

        remove_dir_if_exists(dest).await?;
        let subdir = gh.subdir().map(PathBuf::from);
        let target = dest.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || {
            tarball::extract_subdir(&bytes, subdir.as_deref(), &target)
        })
        .await
        .map_err(|e| Error::fetch(source_url, e.to_string()))?;

        match extracted {
            Ok(0) => {
                let _ = remove_dir_if_exists(dest).await;
                Err(Error::fetch(
                    source_url,
                    format!("no files found at {}", gh.path),
                ))
            }
            Ok(files) => {
                tracing::info!(source_url, files, dest = %dest.display(), "skill downloaded");
                Ok(())
            }
            Err(e) => {
                let _ = remove_dir_if_exists(dest).await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = GzEncoder::new(Vec::new(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn fetcher(server: &MockServer) -> RemoteFetcher {
        RemoteFetcher::new()
            .with_api_base(server.uri())
            .with_retry(RetryPolicy::none())
    }

    #[tokio::test]
    async fn downloads_subdirectory_from_default_branch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/anthropics/skills/tarball"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(tarball(&[
                ("anthropics-skills-1/pdf/SKILL.md", "# PDF"),
                ("anthropics-skills-1/docx/SKILL.md", "# DOCX"),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("pdf");
        fetcher(&server)
            .download_skill("https://github.com/anthropics/skills/tree/main/pdf", &dest)
            .await
            .unwrap();

        assert!(dest.join("SKILL.md").is_file());
        assert!(!tmp.path().join("docx").exists());
    }

    #[tokio::test]
    async fn master_branch_is_requested_explicitly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/tarball/master"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(tarball(&[("o-r-1/s/SKILL.md", "# S")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        fetcher(&server)
            .download_skill("https://github.com/o/r/tree/master/s", &tmp.path().join("s"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_extraction_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/o/r/tarball"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(tarball(&[("o-r-1/README.md", "hi")])),
            )
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("missing");
        let result = fetcher(&server)
            .download_skill("https://github.com/o/r/tree/main/missing", &dest)
            .await;

        assert!(matches!(result, Err(Error::Fetch { .. })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn http_error_is_a_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let result = fetcher(&server)
            .download_skill("o/r", &tmp.path().join("r"))
            .await;
        assert!(matches!(result, Err(Error::Fetch { .. })));
    }
}
