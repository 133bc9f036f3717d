use super::strip_prefix_ignore_case;

pub const GITHUB_API: &str = "https://api.github.com";

/// A GitHub source reduced to `owner/repo[/subdir]` plus the branch taken
/// from a `/tree/<branch>/` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubPath {
    pub path: String,
    pub branch: Option<String>,
}

pub fn normalize_github_path(url: &str) -> GithubPath {
    let url = url.trim();
    let without_protocol = strip_prefix_ignore_case(url, "https://")
        .or_else(|| strip_prefix_ignore_case(url, "http://"))
        .unwrap_or(url);
    let after_host = match strip_prefix_ignore_case(without_protocol, "github.com") {
        Some(rest) => rest.strip_prefix('/').unwrap_or(rest),
        None => without_protocol,
    };

    let parts: Vec<&str> = after_host.splitn(5, '/').collect();
    let (mut cleaned, branch) = match parts.as_slice() {
        [owner, repo, tree, branch, rest @ ..]
            if !owner.is_empty()
                && !repo.is_empty()
                && !branch.is_empty()
                && tree.eq_ignore_ascii_case("tree") =>
        {
            let cleaned = match rest.first() {
                Some(rest) if !rest.is_empty() => format!("{owner}/{repo}/{rest}"),
                _ => format!("{owner}/{repo}"),
            };
            (cleaned, Some(branch.to_string()))
        }
        _ => (after_host.to_string(), None),
    };

    let suffix = "/skill.md";
    if cleaned.len() >= suffix.len()
        && cleaned.is_char_boundary(cleaned.len() - suffix.len())
        && cleaned[cleaned.len() - suffix.len()..].eq_ignore_ascii_case(suffix)
    {
        cleaned.truncate(cleaned.len() - suffix.len());
    }
    let path = cleaned.trim_end_matches('/').to_string();

    GithubPath { path, branch }
}

impl GithubPath {
    pub fn owner(&self) -> &str {
        self.path.split('/').next().unwrap_or_default()
    }

    pub fn repo(&self) -> &str {
        self.path.split('/').nth(1).unwrap_or_default()
    }

    pub fn subdir(&self) -> Option<&str> {
        self.path.splitn(3, '/').nth(2).filter(|s| !s.is_empty())
    }

    /// Only `master` is ever passed on to the download. Every other branch
    /// resolves to the repository's default branch.
    pub fn download_ref(&self) -> Option<&str> {
        self.branch.as_deref().filter(|b| *b == "master")
    }

    /// `/repos/{owner}/{repo}/tarball[/master]`, relative to the API root.
    pub fn tarball_path(&self) -> String {
        let base = format!("/repos/{}/{}/tarball", self.owner(), self.repo());
        match self.download_ref() {
            Some(git_ref) => format!("{base}/{git_ref}"),
            None => base,
        }
    }

    pub fn tarball_url(&self) -> String {
        format!("{GITHUB_API}{}", self.tarball_path())
    }

    /// Short `gh:` form used in log lines.
    pub fn template(&self) -> String {
        match self.download_ref() {
            Some(git_ref) => format!("gh:{}#{git_ref}", self.path),
            None => format!("gh:{}", self.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_url_with_subdir() {
        let gh = normalize_github_path(
            "https://github.com/anthropics/skills/tree/main/document-skills/pdf",
        );
        assert_eq!(gh.path, "anthropics/skills/document-skills/pdf");
        assert_eq!(gh.branch.as_deref(), Some("main"));
        assert_eq!(gh.owner(), "anthropics");
        assert_eq!(gh.repo(), "skills");
        assert_eq!(gh.subdir(), Some("document-skills/pdf"));
    }

    #[test]
    fn strips_skill_md_and_trailing_slashes() {
        let gh = normalize_github_path("https://github.com/o/r/tree/main/skills/x/SKILL.md");
        assert_eq!(gh.path, "o/r/skills/x");

        let gh = normalize_github_path("github.com/o/r/skills/x///");
        assert_eq!(gh.path, "o/r/skills/x");
        assert_eq!(gh.branch, None);

        let gh = normalize_github_path("https://github.com/o/r/tree/main/SKILL.md");
        assert_eq!(gh.path, "o/r");
        assert_eq!(gh.subdir(), None);
    }

    #[test]
    fn tree_without_rest() {
        let gh = normalize_github_path("https://github.com/o/r/tree/dev/");
        assert_eq!(gh.path, "o/r");
        assert_eq!(gh.branch.as_deref(), Some("dev"));
    }

    #[test]
    fn plain_repo_path() {
        let gh = normalize_github_path("o/r");
        assert_eq!(gh.path, "o/r");
        assert_eq!(gh.tarball_url(), "https://api.github.com/repos/o/r/tarball");
        assert_eq!(gh.template(), "gh:o/r");
    }

    #[test]
    fn only_master_is_forwarded() {
        let master = normalize_github_path("https://github.com/o/r/tree/master/s");
        assert_eq!(master.download_ref(), Some("master"));
        assert_eq!(master.tarball_url(), "https://api.github.com/repos/o/r/tarball/master");
        assert_eq!(master.template(), "gh:o/r/s#master");

        let main = normalize_github_path("https://github.com/o/r/tree/main/s");
        assert_eq!(main.download_ref(), None);
        assert_eq!(main.tarball_url(), "https://api.github.com/repos/o/r/tarball");

        let dev = normalize_github_path("https://github.com/o/r/tree/dev/s");
        assert_eq!(dev.download_ref(), None);
    }
}
