use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::RetryPolicy;
use crate::error::{Error, Result};
use crate::target::SkillIdentifier;
use crate::traits::{RegistryApi, ResolvedSkill, SearchParams, SearchResponse, SkillInfo};

const USER_AGENT: &str = concat!("claude-plugins/", env!("CARGO_PKG_VERSION"));
const TRACKING_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvePluginResponse {
    git_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct ResolveTargetRequest<'a> {
    target: &'a str,
    limit: u32,
    offset: u32,
}

#[derive(Debug, Deserialize)]
struct ResolveTargetResponse {
    status: String,
    #[serde(default)]
    skills: Vec<ResolvedSkill>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSkillInfo {
    name: Option<String>,
    namespace: Option<String>,
    source_url: Option<String>,
    description: Option<String>,
    version: Option<String>,
    author: Option<String>,
}

/// Registry client over HTTP.
pub struct HttpRegistry {
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl HttpRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Option<T> {
        let response = match self.retry.run("registry get", || self.client.get(url).send()).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(url, error = %e, "registry request failed");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(url, status = %response.status(), "registry returned non-success");
            return None;
        }

        match response.json::<T>().await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::debug!(url, error = %e, "registry returned unreadable body");
                None
            }
        }
    }
}

#[async_trait]
impl RegistryApi for HttpRegistry {
    async fn resolve_plugin_url(&self, identifier: &str) -> Option<String> {
        let url = self.url(&format!("/api/resolve/{identifier}"));
        let body: ResolvePluginResponse = self.get_json(&url).await?;
        body.git_url.filter(|u| !u.trim().is_empty())
    }

    async fn resolve_skill(&self, identifier: &SkillIdentifier) -> Option<SkillInfo> {
        let url = self.url(&format!(
            "/api/skills/{}/{}/{}",
            identifier.owner, identifier.repo, identifier.skill_name
        ));
        let raw: RawSkillInfo = self.get_json(&url).await?;

        let Some(source_url) = raw.source_url.filter(|u| !u.trim().is_empty()) else {
            tracing::debug!(url = %url, "registry skill has no sourceUrl");
            return None;
        };

        Some(SkillInfo {
            name: raw.name.unwrap_or_else(|| identifier.skill_name.clone()),
            namespace: raw.namespace.unwrap_or_else(|| identifier.namespace()),
            source_url,
            description: raw.description.unwrap_or_default(),
            version: raw.version,
            author: raw.author.unwrap_or_default(),
        })
    }

    async fn resolve_target(&self, target: &str) -> Option<Vec<ResolvedSkill>> {
        let url = self.url("/api/v2/skills/resolve");
        let body = ResolveTargetRequest {
            target,
            limit: 100,
            offset: 0,
        };

        let response = match self
            .retry
            .run("registry resolve", || self.client.post(&url).json(&body).send())
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(target, error = %e, "resolve request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::debug!(target, status = %response.status(), "resolve returned non-success");
            return None;
        }

        let parsed: ResolveTargetResponse = response.json().await.ok()?;
        if parsed.status != "success" {
            tracing::debug!(target, error = ?parsed.error, "registry could not resolve target");
            return None;
        }
        if parsed.skills.is_empty() {
            return None;
        }
        Some(parsed.skills)
    }

    async fn search_skills(&self, params: &SearchParams) -> Result<SearchResponse> {
        let url = self.url("/api/skills/search");
        let mut query: Vec<(&str, String)> = vec![
            ("q", params.query.clone()),
            ("limit", params.limit.to_string()),
            ("offset", params.offset.to_string()),
        ];
        if let Some(field) = params.order_by {
            let field = serde_json::to_value(field)?;
            query.push(("orderBy", field.as_str().unwrap_or_default().to_string()));
            query.push(("order", if params.descending { "desc" } else { "asc" }.to_string()));
        }

        let response = self
            .retry
            .run("registry search", || self.client.get(&url).query(&query).send())
            .await?;

        if !response.status().is_success() {
            return Err(Error::fetch(
                url,
                format!("search failed: {}", response.status()),
            ));
        }
        Ok(response.json().await?)
    }

    async fn track_installation(&self, identifier: &SkillIdentifier) {
        let url = self.url(&format!(
            "/api/skills/{}/{}/{}/install",
            identifier.owner, identifier.repo, identifier.skill_name
        ));
        let request = self.client.post(&url).send();

        match tokio::time::timeout(TRACKING_TIMEOUT, request).await {
            Ok(Ok(response)) => {
                tracing::debug!(url = %url, status = %response.status(), "install tracked");
            }
            Ok(Err(e)) => tracing::debug!(url = %url, error = %e, "install tracking failed"),
            Err(_) => tracing::debug!(url = %url, "install tracking timed out"),
        }
    }
}
