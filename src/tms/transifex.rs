//! Transifex API provider for the translation round-trip
//!
//! Uses the resource endpoints of the Transifex API v2. Each page is one
//! resource of type `HTML`, uploaded as its interchange document.
//!
//! # Authentication
//!
//! The provider loads the API token from the `TRANSIFEX_API_TOKEN`
//! environment variable and authenticates as user `api`.
//!
//! # Example
//!
//! ```ignore
//! use page_sync::tms::{TranslationService, TransifexClient};
//!
//! let client = TransifexClient::from_env()?;
//! let html = client.pull_translation("website", "abouthtml", "de").await?;
//! ```

use crate::error::{ServiceError, ServiceResult};
use crate::tms::service::TranslationService;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

/// Transifex API v2 client
#[derive(Clone)]
pub struct TransifexClient {
    /// API token, sent as the basic-auth password of user `api`
    api_token: String,
    /// HTTP client for async requests
    client: reqwest::Client,
    /// Base URL of the API, without trailing slash
    base_url: String,
}

impl TransifexClient {
    const DEFAULT_BASE_URL: &'static str = "https://www.transifex.com/api/2";
    const SERVICE: &'static str = "Transifex";

    /// Create a new client with an explicit API token
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - New client instance
    /// * `Err(ServiceError)` - If the token is empty or the HTTP client cannot be built
    pub fn new(api_token: String) -> ServiceResult<Self> {
        if api_token.trim().is_empty() {
            return Err(ServiceError::Config("API token cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_token,
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create a client from the `TRANSIFEX_API_TOKEN` environment variable,
    /// honouring `TRANSIFEX_BASE_URL` when set
    pub fn from_env() -> ServiceResult<Self> {
        let api_token = std::env::var("TRANSIFEX_API_TOKEN").map_err(|_| {
            ServiceError::Config("TRANSIFEX_API_TOKEN environment variable not set".to_string())
        })?;

        let client = Self::new(api_token)?;
        Ok(match std::env::var("TRANSIFEX_BASE_URL") {
            Ok(base_url) => client.with_base_url(&base_url),
            Err(_) => client,
        })
    }

    /// Point the client at another API root (self-hosted instances, tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn resource_url(&self, project: &str, resource: &str) -> String {
        format!("{}/project/{}/resource/{}", self.base_url, project, resource)
    }

    /// Turn a non-success response into a `ServiceError::Api`
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

    async fn create_resource(
        &self,
        project: &str,
        resource: &str,
        name: &str,
        content: &str,
    ) -> ServiceResult<()> {
        let url = format!("{}/project/{}/resources/", self.base_url, project);
        let body = json!({
            "slug": resource,
            "name": name,
            "i18n_type": "HTML",
            "content": content,
        });
        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_token))
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        info!("Created resource {}/{}", project, resource);
        Ok(())
    }
}

impl std::fmt::Debug for TransifexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransifexClient")
            .field("api_token", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl TranslationService for TransifexClient {
    async fn push_resource(
        &self,
        project: &str,
        resource: &str,
        name: &str,
        content: &str,
    ) -> ServiceResult<()> {
        let url = format!("{}/content/", self.resource_url(project, resource));
        let response = self
            .client
            .put(&url)
            .basic_auth("api", Some(&self.api_token))
            .json(&json!({ "content": content }))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Resource {}/{} does not exist yet", project, resource);
            return self.create_resource(project, resource, name, content).await;
        }
        Self::check(response).await?;
        info!("Updated resource {}/{}", project, resource);
        Ok(())
    }

    async fn pull_translation(
        &self,
        project: &str,
        resource: &str,
        language: &str,
    ) -> ServiceResult<String> {
        let url = format!(
            "{}/translation/{}/",
            self.resource_url(project, resource),
            language
        );
        let response = self
            .client
            .get(&url)
            .basic_auth("api", Some(&self.api_token))
            .send()
            .await?;
        let response = Self::check(response).await?;

        let json: serde_json::Value = response.json().await.map_err(|e| {
            ServiceError::InvalidResponse(format!("Failed to parse API response: {}", e))
        })?;

        json["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ServiceError::InvalidResponse(
                    "Invalid API response: missing 'content' field".to_string(),
                )
            })
    }

    fn provider_name(&self) -> &str {
        Self::SERVICE
    }
}
