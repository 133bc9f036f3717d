use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::target::SkillIdentifier;

/// Registry record for a single skill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SkillInfo {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    pub source_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub author: String,
}

/// One skill found while expanding an owner or repository target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSkill {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub rel_dir: String,
    pub source_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Downloads,
    Stars,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParams {
    pub query: String,
    pub limit: u32,
    pub offset: u32,
    /// `None` keeps the registry's relevance order.
    pub order_by: Option<SortField>,
    pub descending: bool,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 10,
            offset: 0,
            order_by: None,
            descending: true,
        }
    }

    pub fn page(mut self, limit: u32, offset: u32) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn sorted_by(mut self, field: SortField) -> Self {
        self.order_by = Some(field);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    #[serde(default)]
    pub repo_owner: String,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default)]
    pub directory_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultSkill {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub source_url: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub installs: u64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub metadata: SearchMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    #[serde(default)]
    pub skills: Vec<SearchResultSkill>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

impl SearchResponse {
    /// An empty page ends paging whatever `total` claims.
    pub fn has_more(&self) -> bool {
        !self.skills.is_empty() && u64::from(self.offset) + (self.skills.len() as u64) < self.total
    }
}

/// The remote registry.
///
/// Resolution calls fail soft: `None` means "not in the registry", whatever
/// the reason. Search failures are real errors. Tracking never fails.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn resolve_plugin_url(&self, identifier: &str) -> Option<String>;

    async fn resolve_skill(&self, identifier: &SkillIdentifier) -> Option<SkillInfo>;

    /// Expands `owner`, `owner/repo` or a GitHub URL into the skills the
    /// registry knows under it.
    async fn resolve_target(&self, target: &str) -> Option<Vec<ResolvedSkill>>;

    async fn search_skills(&self, params: &SearchParams) -> Result<SearchResponse>;

    async fn track_installation(&self, identifier: &SkillIdentifier);
}
