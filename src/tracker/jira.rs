//! Jira REST API client
//!
//! Finds the tickets whose page-address field mentions a page slug and
//! applies a configured workflow transition to each of them.

use crate::config::JiraSettings;
use crate::error::{ServiceError, ServiceResult};
use crate::tracker::IssueTracker;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

#[derive(Clone)]
pub struct JiraClient {
    base_url: String,
    user: String,
    api_token: String,
    /// Issue field holding the page address, e.g. `customfield_10400`
    page_field: String,
    transition_id: String,
    client: reqwest::Client,
}

impl JiraClient {
    const SERVICE: &'static str = "Jira";

    pub fn new(settings: &JiraSettings, page_field: &str) -> ServiceResult<Self> {
        if settings.base_url.trim().is_empty() {
            return Err(ServiceError::Config("Jira base URL cannot be empty".to_string()));
        }
        if settings.transition_id.trim().is_empty() {
            return Err(ServiceError::Config(
                "Jira transition id cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            user: settings.user.clone(),
            api_token: settings.api_token.clone(),
            page_field: page_field.to_string(),
            transition_id: settings.transition_id.clone(),
            client,
        })
    }

    /// JQL selecting the project's tickets that reference `slug`
    fn search_jql(&self, slug: &str, project: &str) -> String {
        let field = match self.page_field.strip_prefix("customfield_") {
            Some(number) => format!("cf[{}]", number),
            None => format!("\"{}\"", self.page_field),
        };
        format!(
            "project = \"{}\" AND {} ~ \"{}\"",
            escape_jql(project),
            field,
            escape_jql(slug)
        )
    }

    async fn check(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ServiceError::Api {
            service: Self::SERVICE,
            status: status.as_u16(),
            message,
        })
    }

    async fn search(&self, jql: &str) -> ServiceResult<Vec<String>> {
        let response = self
            .client
            .post(format!("{}/rest/api/2/search", self.base_url))
            .basic_auth(&self.user, Some(&self.api_token))
            .json(&json!({ "jql": jql, "fields": ["key"] }))
            .send()
            .await?;
        let json: serde_json::Value = Self::check(response).await?.json().await.map_err(|e| {
            ServiceError::InvalidResponse(format!("Failed to parse search response: {}", e))
        })?;

        let issues = json["issues"].as_array().ok_or_else(|| {
            ServiceError::InvalidResponse("Invalid search response: missing 'issues'".to_string())
        })?;
        Ok(issues
            .iter()
            .filter_map(|issue| issue["key"].as_str().map(str::to_string))
            .collect())
    }
}

fn escape_jql(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .field("api_token", &"***")
            .field("page_field", &self.page_field)
            .field("transition_id", &self.transition_id)
            .finish()
    }
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn transition_ticket(&self, slug: &str, project: &str) -> ServiceResult<Vec<String>> {
        let keys = self.search(&self.search_jql(slug, project)).await?;
        if keys.is_empty() {
            warn!("No ticket of project {} references page {}", project, slug);
        }

        for key in &keys {
            let response = self
                .client
                .post(format!("{}/rest/api/2/issue/{}/transitions", self.base_url, key))
                .basic_auth(&self.user, Some(&self.api_token))
                .json(&json!({ "transition": { "id": self.transition_id } }))
                .send()
                .await?;
            Self::check(response).await?;
            info!("Transitioned {} for page {}", key, slug);
        }
        Ok(keys)
    }

    fn provider_name(&self) -> &str {
        Self::SERVICE
    }
}
