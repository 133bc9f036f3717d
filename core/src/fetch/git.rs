use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::fs::remove_dir_if_exists;
use crate::error::{Error, Result};

pub const CLONE_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) fn clone_args<'a>(url: &'a str, git_ref: Option<&'a str>, dest: &'a str) -> Vec<&'a str> {
    let mut args = vec!["clone", "--depth", "1"];
    if let Some(git_ref) = git_ref {
        args.extend(["--branch", git_ref]);
    }
    args.extend([url, dest]);
    args
}

/// Shallow clone into `dest`. A failed or timed out clone leaves no `dest`.
pub async fn clone(url: &str, git_ref: Option<&str>, dest: &Path, timeout: Duration) -> Result<()> {
    remove_dir_if_exists(dest).await?;
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::io(parent, e))?;
    }

    let dest_str = dest.to_string_lossy();
    let args = clone_args(url, git_ref, &dest_str);
    tracing::debug!(url, git_ref = ?git_ref, dest = %dest.display(), "cloning repository");

    let child = Command::new("git")
        .args(&args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::fetch(url, format!("failed to run git: {e}")))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            let _ = remove_dir_if_exists(dest).await;
            return Err(Error::fetch(url, e.to_string()));
        }
        Err(_) => {
            let _ = remove_dir_if_exists(dest).await;
            return Err(Error::fetch(
                url,
                format!("git clone timed out after {}s", timeout.as_secs()),
            ));
        }
    };

    if !output.status.success() {
        let _ = remove_dir_if_exists(dest).await;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(Error::fetch(url, stderr));
    }

    tracing::info!(url, dest = %dest.display(), "repository cloned");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn args_with_and_without_ref() {
        assert_eq!(
            clone_args("https://github.com/o/r.git", None, "/tmp/x"),
            vec!["clone", "--depth", "1", "https://github.com/o/r.git", "/tmp/x"]
        );
        assert_eq!(
            clone_args("https://github.com/o/r.git", Some("dev"), "/tmp/x"),
            vec!["clone", "--depth", "1", "--branch", "dev", "https://github.com/o/r.git", "/tmp/x"]
        );
    }

    #[tokio::test]
    async fn failed_clone_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("clone");
        let missing = tmp.path().join("no-such-repo");

        let result = clone(
            &missing.to_string_lossy(),
            None,
            &dest,
            Duration::from_secs(30),
        )
        .await;

        assert!(matches!(result, Err(Error::Fetch { .. })));
        assert!(!dest.exists());
    }
}
