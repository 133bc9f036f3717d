//! Classifies free-form install input.
//!
//! Precedence: a three-segment `@owner/repo/skill` (without URL markers) is a
//! registry skill; otherwise SSH URLs, GitHub HTTPS URLs and `owner/repo`
//! shorthand are Git targets. Everything else is a [`ParseError`].
//!
//! `/tree/<ref>/...` takes exactly one segment as the ref, so a branch named
//! `feature/x` is read as ref `feature` with `x` prepended to the subdirectory.

pub mod github;

pub use github::{GithubPath, normalize_github_path};

const SUPPORTED_FORMATS: &str = "Supported formats:
  @owner/repo/skill-name                                       Registry skill
  owner/repo                                                   GitHub repo (shorthand)
  github.com/owner/repo                                        GitHub repo URL
  https://github.com/owner/repo/tree/main/skills/skill-name    Direct path
  git@github.com:owner/repo.git                                SSH URL";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty install target\n\n{}", SUPPORTED_FORMATS)]
    Empty,
    #[error("Invalid input: {0}\n\n{formats}", formats = SUPPORTED_FORMATS)]
    Unsupported(String),
    #[error("Could not parse Git URL: {0}\n\n{formats}", formats = SUPPORTED_FORMATS)]
    InvalidGitUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillIdentifier {
    pub owner: String,
    pub repo: String,
    pub skill_name: String,
}

impl SkillIdentifier {
    pub fn namespace(&self) -> String {
        format!("@{}/{}/{}", self.owner, self.repo, self.skill_name)
    }

    /// Accepts `@owner/repo/skill` or `owner/repo/skill`.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.strip_prefix('@').unwrap_or(input);
        let parts: Vec<&str> = normalized.split('/').collect();
        match parts.as_slice() {
            [owner, repo, skill]
                if !owner.is_empty() && !repo.is_empty() && !skill.is_empty() =>
            {
                Some(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    skill_name: skill.to_string(),
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitProvider {
    GitHub,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSpec {
    pub original: String,
    pub clone_url: String,
    pub provider: GitProvider,
    pub owner: String,
    pub repo: String,
    pub git_ref: Option<String>,
}

impl RepoSpec {
    fn github(original: &str, owner: &str, repo: &str) -> Self {
        Self {
            original: original.to_string(),
            clone_url: format!("https://github.com/{owner}/{repo}.git"),
            provider: GitProvider::GitHub,
            owner: owner.to_string(),
            repo: repo.to_string(),
            git_ref: None,
        }
    }

    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Browser URL for the repo, or for `subdir` inside it.
    pub fn web_url(&self, subdir: Option<&str>) -> String {
        let base = format!("https://github.com/{}/{}", self.owner, self.repo);
        match (self.git_ref.as_deref(), subdir) {
            (Some(git_ref), Some(subdir)) => format!("{base}/tree/{git_ref}/{subdir}"),
            (Some(git_ref), None) => format!("{base}/tree/{git_ref}"),
            (None, Some(subdir)) => format!("{base}/tree/HEAD/{subdir}"),
            (None, None) => base,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallTarget {
    RegistrySkill(SkillIdentifier),
    GitRepo(RepoSpec),
    GitSkillPath { repo: RepoSpec, subdir: String },
}

pub fn parse_install_target(input: &str) -> Result<InstallTarget, ParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ParseError::Empty);
    }

    if is_registry_identifier(input) {
        if let Some(identifier) = SkillIdentifier::parse(input) {
            return Ok(InstallTarget::RegistrySkill(identifier));
        }
        return Err(ParseError::Unsupported(input.to_string()));
    }

    if !looks_like_git_url(input) {
        return Err(ParseError::Unsupported(input.to_string()));
    }

    if let Some(repo) = parse_ssh_url(input) {
        return Ok(InstallTarget::GitRepo(repo));
    }

    if let Some((repo, subdir)) = parse_github_url(input) {
        return Ok(match subdir {
            Some(subdir) => InstallTarget::GitSkillPath { repo, subdir },
            None => InstallTarget::GitRepo(repo),
        });
    }

    if let Some(repo) = parse_shorthand(input) {
        return Ok(InstallTarget::GitRepo(repo));
    }

    Err(ParseError::InvalidGitUrl(input.to_string()))
}

/// Last path segment, without a `.git` suffix.
pub fn extract_plugin_name(identifier: &str) -> String {
    let trimmed = identifier.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next().unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last).to_string()
}

fn is_registry_identifier(input: &str) -> bool {
    let body = input.strip_prefix('@').unwrap_or(input);
    let segments: Vec<&str> = body.split('/').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return false;
    }

    let lower = input.to_ascii_lowercase();
    !(lower.contains("github.com") || lower.contains(".git") || lower.contains("://"))
}

fn looks_like_git_url(input: &str) -> bool {
    input.starts_with("http://")
        || input.starts_with("https://")
        || input.starts_with("git@")
        || starts_with_ignore_case(input, "github.com/")
        || is_shorthand(input)
}

fn is_shorthand(input: &str) -> bool {
    let valid = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    };
    match input.split_once('/') {
        Some((owner, repo)) => valid(owner) && valid(repo),
        None => false,
    }
}

fn parse_ssh_url(input: &str) -> Option<RepoSpec> {
    let rest = strip_prefix_ignore_case(input, "git@github.com:")?;
    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.contains('/') {
        return None;
    }
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return None;
    }

    let mut spec = RepoSpec::github(input, owner, repo);
    spec.clone_url = if input.ends_with(".git") {
        input.to_string()
    } else {
        format!("{input}.git")
    };
    Some(spec)
}

fn parse_github_url(input: &str) -> Option<(RepoSpec, Option<String>)> {
    let without_protocol = strip_prefix_ignore_case(input, "https://")
        .or_else(|| strip_prefix_ignore_case(input, "http://"))
        .unwrap_or(input);
    let after_host = strip_prefix_ignore_case(without_protocol, "github.com/")?;

    let segments: Vec<&str> = after_host.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() < 2 {
        return None;
    }

    let owner = segments[0];
    let repo = segments[1].strip_suffix(".git").unwrap_or(segments[1]);
    if repo.is_empty() {
        return None;
    }
    let mut spec = RepoSpec::github(input, owner, repo);

    if segments.get(2) == Some(&"tree")
        && let Some(git_ref) = segments.get(3)
    {
        spec.git_ref = Some(git_ref.to_string());

        let mut path: Vec<&str> = segments[4..].to_vec();
        if path
            .last()
            .is_some_and(|last| last.eq_ignore_ascii_case("SKILL.md"))
        {
            path.pop();
        }
        if !path.is_empty() {
            return Some((spec, Some(path.join("/"))));
        }
    }

    Some((spec, None))
}

fn parse_shorthand(input: &str) -> Option<RepoSpec> {
    if !is_shorthand(input) {
        return None;
    }
    let (owner, repo) = input.split_once('/')?;
    Some(RepoSpec::github(input, owner, repo))
}

pub(crate) fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    if starts_with_ignore_case(input, prefix) {
        Some(&input[prefix.len()..])
    } else {
        None
    }
}

fn starts_with_ignore_case(input: &str, prefix: &str) -> bool {
    input.len() >= prefix.len()
        && input.is_char_boundary(prefix.len())
        && input[..prefix.len()].eq_ignore_ascii_case(prefix)
}
