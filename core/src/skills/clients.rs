use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DEFAULT_CLIENT: &str = "claude-code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Under the user's home directory, shared by every project.
    Global,
    /// Under the current project.
    Local,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Local => write!(f, "local"),
        }
    }
}

/// An agent or editor that loads skills from its own directories.
#[derive(Debug, PartialEq, Eq)]
pub struct Client {
    pub id: &'static str,
    pub name: &'static str,
    local_dir: &'static [&'static str],
    global_dir: Option<&'static [&'static str]>,
}

pub const CLIENTS: &[Client] = &[
    Client {
        id: "claude-code",
        name: "Claude Code",
        local_dir: &[".claude", "skills"],
        global_dir: Some(&[".claude", "skills"]),
    },
    Client {
        id: "codex",
        name: "Codex",
        local_dir: &[".codex", "skills"],
        global_dir: Some(&[".codex", "skills"]),
    },
    Client {
        id: "cursor",
        name: "Cursor",
        local_dir: &[".cursor", "skills"],
        global_dir: None,
    },
    Client {
        id: "github",
        name: "GitHub",
        local_dir: &[".github", "skills"],
        global_dir: None,
    },
    Client {
        id: "letta",
        name: "Letta",
        local_dir: &[".skills"],
        global_dir: None,
    },
    Client {
        id: "vscode",
        name: "VS Code",
        local_dir: &[".github", "skills"],
        global_dir: None,
    },
    Client {
        id: "amp",
        name: "AMP",
        local_dir: &[".agents", "skills"],
        global_dir: Some(&[".config", "agents", "skills"]),
    },
    Client {
        id: "goose",
        name: "Goose",
        local_dir: &[".agents", "skills"],
        global_dir: Some(&[".config", "goose", "skills"]),
    },
    Client {
        id: "opencode",
        name: "OpenCode",
        local_dir: &[".opencode", "skill"],
        global_dir: Some(&[".opencode", "skill"]),
    },
    Client {
        id: "gemini",
        name: "Gemini CLI",
        local_dir: &[".gemini", "skills"],
        global_dir: Some(&[".gemini", "skills"]),
    },
    Client {
        id: "windsurf",
        name: "Windsurf",
        local_dir: &[".windsurf", "skills"],
        global_dir: Some(&[".codeium", "windsurf", "skills"]),
    },
    Client {
        id: "antigravity",
        name: "Antigravity",
        local_dir: &[".agent", "skills"],
        global_dir: Some(&[".gemini", "antigravity", "skills"]),
    },
    Client {
        id: "trae",
        name: "Trae",
        local_dir: &[".trae", "skills"],
        global_dir: None,
    },
    Client {
        id: "qoder",
        name: "Qoder",
        local_dir: &[".qoder", "skills"],
        global_dir: None,
    },
    Client {
        id: "codebuddy",
        name: "CodeBuddy",
        local_dir: &[".codebuddy", "skills"],
        global_dir: None,
    },
];

pub fn client_ids() -> Vec<&'static str> {
    CLIENTS.iter().map(|c| c.id).collect()
}

pub fn client(id: &str) -> Result<&'static Client> {
    CLIENTS
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| Error::UnknownClient {
            client: id.to_string(),
            available: client_ids().join(", "),
        })
}

/// The two directories client paths are relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillRoots {
    pub home: PathBuf,
    pub project: PathBuf,
}

impl SkillRoots {
    pub fn new(home: impl Into<PathBuf>, project: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            project: project.into(),
        }
    }

    /// Home directory and the current working directory.
    pub fn discover() -> Result<Self> {
        let project = std::env::current_dir().map_err(|e| Error::io(".", e))?;
        let home = dirs::home_dir().unwrap_or_else(|| project.clone());
        Ok(Self { home, project })
    }
}

fn join_all(base: &Path, segments: &[&str]) -> PathBuf {
    segments.iter().fold(base.to_path_buf(), |path, s| path.join(s))
}

impl Client {
    pub fn supports_global(&self) -> bool {
        self.global_dir.is_some()
    }

    /// `Global` on a client without a global directory becomes `Local`.
    pub fn effective_scope(&self, requested: Scope) -> Scope {
        match requested {
            Scope::Global if !self.supports_global() => Scope::Local,
            scope => scope,
        }
    }

    /// Skills directory for `scope`, after applying [`Client::effective_scope`].
    pub fn dir(&self, scope: Scope, roots: &SkillRoots) -> PathBuf {
        match (self.effective_scope(scope), self.global_dir) {
            (Scope::Global, Some(segments)) => join_all(&roots.home, segments),
            _ => join_all(&roots.project, self.local_dir),
        }
    }

    /// Every directory this client may hold skills in.
    pub fn dirs(&self, roots: &SkillRoots) -> Vec<(Scope, PathBuf)> {
        let mut dirs = vec![(Scope::Local, self.dir(Scope::Local, roots))];
        if self.supports_global() {
            dirs.push((Scope::Global, self.dir(Scope::Global, roots)));
        }
        dirs
    }
}
