use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const SKILL_FILE: &str = "SKILL.md";

#[derive(Debug, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub version: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub location: PathBuf,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

pub fn load_skill(skill_dir: &Path) -> Result<Skill> {
    let md_path = skill_dir.join(SKILL_FILE);

    if md_path.is_file() {
        load_skill_md(&md_path, skill_dir)
    } else {
        Err(Error::validation(
            "skill",
            format!("no {SKILL_FILE} found in {}", skill_dir.display()),
        ))
    }
}

/// Splits `---` delimited YAML front matter from the body.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let rest = content.strip_prefix("---")?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn load_skill_md(path: &Path, skill_dir: &Path) -> Result<Skill> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let dir_name = skill_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();

    let (front, body) = match split_front_matter(&content) {
        Some((yaml, body)) => match serde_yaml::from_str::<FrontMatter>(yaml) {
            Ok(front) => (Some(front), body),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "ignoring malformed front matter");
                (None, body)
            }
        },
        None => (None, content.as_str()),
    };

    let heading = body
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with('#'))
        .map(|l| l.trim_start_matches('#').trim().to_string())
        .filter(|h| !h.is_empty());

    let paragraph = body
        .lines()
        .map(str::trim)
        .find(|l| !(l.starts_with('#') || l.is_empty()))
        .map(str::to_string);

    let front = front.unwrap_or(FrontMatter {
        name: None,
        description: None,
        version: default_version(),
        author: None,
        tags: Vec::new(),
    });

    Ok(Skill {
        name: front.name.or(heading).unwrap_or(dir_name),
        description: front
            .description
            .or(paragraph)
            .unwrap_or_else(|| "No description".to_string()),
        version: front.version,
        author: front.author,
        tags: front.tags,
        location: skill_dir.to_path_buf(),
    })
}
