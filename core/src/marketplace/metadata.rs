use std::path::Path;

use serde_json::{Map, Value};

use super::{Author, MARKETPLACE_FILE, PLUGIN_FILE, PLUGIN_META_DIR, Plugin, PluginSource, SourceLocation};
use crate::error::{Error, Result};

const DEFAULT_VERSION: &str = "1.0.0";
const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// `marketplace.json` lists a `plugins` array.
    Marketplace,
    Plugin,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Marketplace => write!(f, "marketplace"),
            Self::Plugin => write!(f, "plugin"),
        }
    }
}

/// A plugin checkout needs `.claude-plugin/` holding `marketplace.json` or
/// `plugin.json`.
pub async fn validate_plugin_dir(dir: &Path) -> Result<()> {
    if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
        return Err(Error::validation("plugin", "Plugin directory does not exist"));
    }

    let meta_dir = dir.join(PLUGIN_META_DIR);
    if !meta_dir.is_dir() {
        return Err(Error::validation("plugin", "Missing .claude-plugin directory"));
    }

    if !meta_dir.join(MARKETPLACE_FILE).is_file() && !meta_dir.join(PLUGIN_FILE).is_file() {
        return Err(Error::validation(
            "plugin",
            "Missing metadata file (marketplace.json or plugin.json)",
        ));
    }
    Ok(())
}

async fn read_meta_file(dir: &Path, file: &str) -> Result<Option<Value>> {
    let path = dir.join(PLUGIN_META_DIR).join(file);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::io(&path, e)),
    };

    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| Error::validation(file, e.to_string()))
}

pub async fn detect_artifact(dir: &Path) -> Result<ArtifactKind> {
    let Some(value) = read_meta_file(dir, MARKETPLACE_FILE).await? else {
        return Ok(ArtifactKind::Plugin);
    };

    match value.get("plugins") {
        None => Ok(ArtifactKind::Plugin),
        Some(Value::Array(_)) => Ok(ArtifactKind::Marketplace),
        Some(_) => Err(Error::validation(MARKETPLACE_FILE, "\"plugins\" must be an array")),
    }
}

/// The `name` a marketplace declares for itself, else `fallback`.
pub async fn marketplace_name(dir: &Path, fallback: &str) -> Result<String> {
    let declared = match read_meta_file(dir, MARKETPLACE_FILE).await? {
        Some(value) => match value.get("name") {
            None | Some(Value::Null) => None,
            Some(Value::String(name)) if !name.trim().is_empty() => Some(name.clone()),
            Some(_) => {
                return Err(Error::validation(
                    MARKETPLACE_FILE,
                    "\"name\" must be a non-empty string",
                ));
            }
        },
        None => None,
    };

    let name = declared.unwrap_or_else(|| fallback.to_string());
    crate::error::ensure_safe_name(&name)?;
    Ok(name)
}

/// Builds the manifest entry for a plugin installed at `dir`. The entry's
/// source always points at `dir`.
pub async fn extract_plugin_metadata(dir: &Path, plugin_name: &str) -> Result<Plugin> {
    let source = PluginSource::Located(SourceLocation::directory(dir));

    if let Some(value) = read_meta_file(dir, MARKETPLACE_FILE).await? {
        let entry = match value.get("plugins") {
            Some(Value::Array(plugins)) => plugins
                .iter()
                .find(|p| p.get("name").and_then(Value::as_str) == Some(plugin_name))
                .or_else(|| plugins.first())
                .cloned(),
            Some(_) => {
                return Err(Error::validation(MARKETPLACE_FILE, "\"plugins\" must be an array"));
            }
            None => Some(value),
        };
        if let Some(entry) = entry {
            return plugin_from_value(entry, plugin_name, source, MARKETPLACE_FILE);
        }
    } else if let Some(value) = read_meta_file(dir, PLUGIN_FILE).await? {
        return plugin_from_value(value, plugin_name, source, PLUGIN_FILE);
    }

    tracing::warn!(plugin = plugin_name, "no metadata found, using minimal defaults");
    let mut plugin = Plugin::new(plugin_name, source);
    plugin.description = Some(format!("Plugin: {plugin_name} (no metadata available)"));
    plugin.version = Some(DEFAULT_VERSION.to_string());
    plugin.author = Some(Author::named(UNKNOWN_AUTHOR));
    Ok(plugin)
}

fn plugin_from_value(value: Value, fallback_name: &str, source: PluginSource, file: &str) -> Result<Plugin> {
    let Value::Object(mut fields) = value else {
        return Err(Error::validation(file, "plugin entry must be an object"));
    };

    match fields.get("name") {
        None | Some(Value::Null) => {
            fields.insert("name".into(), Value::String(fallback_name.to_string()));
        }
        Some(Value::String(name)) if !name.trim().is_empty() => {}
        Some(_) => return Err(Error::validation(file, "\"name\" must be a non-empty string")),
    }
    fields.remove("source");

    let mut plugin: Plugin = serde_json::from_value(Value::Object(strip_nulls(fields)))
        .map_err(|e| Error::validation(file, e.to_string()))?;

    plugin.source = source;
    plugin.description.get_or_insert_with(String::new);
    plugin.version.get_or_insert_with(|| DEFAULT_VERSION.to_string());
    plugin.author.get_or_insert_with(|| Author::named(UNKNOWN_AUTHOR));
    Ok(plugin)
}

fn strip_nulls(fields: Map<String, Value>) -> Map<String, Value> {
    fields.into_iter().filter(|(_, v)| !v.is_null()).collect()
}
