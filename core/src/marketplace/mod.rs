//! Marketplaces: named collections of plugin metadata, plus the index that
//! records where each one lives on disk.
//!
//! ```text
//! plugins/known_marketplaces.json          name -> { source, installLocation, lastUpdated }
//! <installLocation>/.claude-plugin/marketplace.json
//!                                          { name, owner, metadata, plugins: [...] }
//! ```
//!
//! The manifest says *what* a marketplace contains, the index says *where*
//! it is. Marketplace files are always written before the index entry that
//! points at them, so an index entry never refers to a manifest that was not
//! fully written.

pub mod metadata;
pub mod registry;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use metadata::{
    ArtifactKind, detect_artifact, extract_plugin_metadata, marketplace_name, validate_plugin_dir,
};
pub use registry::MarketplaceRegistry;

pub const PLUGIN_META_DIR: &str = ".claude-plugin";
pub const MARKETPLACE_FILE: &str = "marketplace.json";
pub const PLUGIN_FILE: &str = "plugin.json";

pub fn manifest_path(install_location: &Path) -> PathBuf {
    install_location.join(PLUGIN_META_DIR).join(MARKETPLACE_FILE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Directory,
    Git,
    Github,
    Url,
}

/// `{ "source": "directory" | "git" | "github" | "url", ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceLocation {
    pub fn directory(path: &Path) -> Self {
        Self {
            source: SourceKind::Directory,
            path: Some(path.to_string_lossy().into_owned()),
            url: None,
            repo: None,
            extra: Map::new(),
        }
    }

    pub fn git(url: impl Into<String>) -> Self {
        Self {
            source: SourceKind::Git,
            path: None,
            url: Some(url.into()),
            repo: None,
            extra: Map::new(),
        }
    }

    /// Path, URL or repo, whichever the kind uses.
    pub fn locator(&self) -> Option<&str> {
        match self.source {
            SourceKind::Directory => self.path.as_deref(),
            SourceKind::Git | SourceKind::Url => self.url.as_deref(),
            SourceKind::Github => self.repo.as_deref(),
        }
    }
}

/// Where a plugin's files come from. Third-party manifests use relative
/// path strings and sources this tool does not understand; both survive a
/// rewrite untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginSource {
    Path(String),
    Located(SourceLocation),
    Other(Value),
}

impl Default for PluginSource {
    fn default() -> Self {
        PluginSource::Other(Value::Null)
    }
}

impl PluginSource {
    fn is_missing(&self) -> bool {
        matches!(self, PluginSource::Other(Value::Null))
    }

    /// The absolute directory of a `directory` source.
    pub fn directory(&self) -> Option<PathBuf> {
        match self {
            PluginSource::Located(loc) if loc.source == SourceKind::Directory => {
                loc.path.as_ref().map(PathBuf::from)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Author {
    Name(String),
    Detailed(AuthorInfo),
}

impl Author {
    pub fn named(name: impl Into<String>) -> Self {
        Author::Detailed(AuthorInfo {
            name: name.into(),
            ..AuthorInfo::default()
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Author::Name(name) => name,
            Author::Detailed(info) => &info.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plugin {
    pub name: String,
    #[serde(default, skip_serializing_if = "PluginSource::is_missing")]
    pub source: PluginSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp_servers: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Plugin {
    pub fn new(name: impl Into<String>, source: PluginSource) -> Self {
        Self {
            name: name.into(),
            source,
            description: None,
            version: None,
            author: None,
            homepage: None,
            repository: None,
            license: None,
            keywords: None,
            category: None,
            strict: None,
            commands: None,
            agents: None,
            mcp_servers: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marketplace {
    pub name: String,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub metadata: MarketplaceMetadata,
    #[serde(default)]
    pub plugins: Vec<Plugin>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Marketplace {
    /// Empty manifest for a marketplace this tool owns.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: Owner {
                name: "Local".to_string(),
                url: Some(String::new()),
                extra: Map::new(),
            },
            metadata: MarketplaceMetadata {
                description: "Local marketplace".to_string(),
                version: "1.0.0".to_string(),
                extra: Map::new(),
            },
            plugins: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn plugin(&self, name: &str) -> Option<&Plugin> {
        self.plugins.iter().find(|p| p.name == name)
    }

    /// Replaces any plugin with the same name.
    pub fn upsert_plugin(&mut self, plugin: Plugin) {
        self.plugins.retain(|p| p.name != plugin.name);
        self.plugins.push(plugin);
    }

    pub fn remove_plugin(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name != name);
        self.plugins.len() != before
    }
}

/// An entry of the known-marketplaces index. Sources this tool does not
/// model are kept verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarketplaceSource {
    Known(SourceLocation),
    Other(Value),
}

impl MarketplaceSource {
    pub fn kind(&self) -> Option<SourceKind> {
        match self {
            MarketplaceSource::Known(loc) => Some(loc.source),
            MarketplaceSource::Other(_) => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            MarketplaceSource::Known(loc) => {
                let kind = match loc.source {
                    SourceKind::Directory => "directory",
                    SourceKind::Git => "git",
                    SourceKind::Github => "github",
                    SourceKind::Url => "url",
                };
                match loc.locator() {
                    Some(locator) => format!("{kind}: {locator}"),
                    None => kind.to_string(),
                }
            }
            MarketplaceSource::Other(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnownMarketplace {
    pub source: MarketplaceSource,
    pub install_location: PathBuf,
    #[serde(default)]
    pub last_updated: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl KnownMarketplace {
    pub fn new(source: SourceLocation, install_location: PathBuf) -> Self {
        Self {
            source: MarketplaceSource::Known(source),
            install_location,
            last_updated: now_iso(),
            extra: Map::new(),
        }
    }
}

pub type KnownMarketplaces = BTreeMap<String, KnownMarketplace>;

fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
