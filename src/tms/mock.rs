//! Mock translation service for testing
//!
//! Keeps pushed documents in memory and "translates" them on pull according
//! to a [`MockMode`], so the push/pull/re-inject pipeline can run without
//! network access.
//!
//! # Example
//!
//! ```ignore
//! use page_sync::tms::{MockMode, MockTranslationService, TranslationService};
//!
//! #[tokio::test]
//! async fn test_round_trip() {
//!     let service = MockTranslationService::new(MockMode::Echo);
//!     service.push_resource("website", "abouthtml", "About", "<html/>").await.unwrap();
//!     let html = service.pull_translation("website", "abouthtml", "de").await.unwrap();
//!     assert_eq!(html, "<html/>");
//! }
//! ```

use crate::error::{ServiceError, ServiceResult};
use crate::tms::service::TranslationService;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Return the pushed document unchanged
    Echo,

    /// Replace text fragments per target language:
    /// (source fragment, target language) → translated fragment
    Mappings(HashMap<(String, String), String>),

    /// Simulate service errors
    Error(String),
}

/// In-memory translation service
#[derive(Debug)]
pub struct MockTranslationService {
    mode: MockMode,
    /// Pushed documents keyed by (project, resource)
    resources: Mutex<HashMap<(String, String), String>>,
    /// Optional simulated network delay (in milliseconds)
    delay_ms: u64,
}

impl MockTranslationService {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            resources: Mutex::new(HashMap::new()),
            delay_ms: 0,
        }
    }

    /// Create a mock with simulated network delay
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new(mode)
        }
    }

    /// Document currently stored for a resource
    pub fn resource(&self, project: &str, resource: &str) -> Option<String> {
        self.resources
            .lock()
            .ok()?
            .get(&(project.to_string(), resource.to_string()))
            .cloned()
    }

    async fn apply_delay(&self) {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn store(&self) -> ServiceResult<std::sync::MutexGuard<'_, HashMap<(String, String), String>>> {
        self.resources
            .lock()
            .map_err(|_| ServiceError::Other("mock resource store poisoned".to_string()))
    }
}

#[async_trait]
impl TranslationService for MockTranslationService {
    async fn push_resource(
        &self,
        project: &str,
        resource: &str,
        _name: &str,
        content: &str,
    ) -> ServiceResult<()> {
        self.apply_delay().await;
        if let MockMode::Error(msg) = &self.mode {
            return Err(ServiceError::Other(msg.clone()));
        }
        self.store()?.insert(
            (project.to_string(), resource.to_string()),
            content.to_string(),
        );
        Ok(())
    }

    async fn pull_translation(
        &self,
        project: &str,
        resource: &str,
        language: &str,
    ) -> ServiceResult<String> {
        self.apply_delay().await;
        let source = self
            .store()?
            .get(&(project.to_string(), resource.to_string()))
            .cloned()
            .ok_or_else(|| ServiceError::Api {
                service: "Mock Translation Service",
                status: 404,
                message: format!("resource {}/{} not found", project, resource),
            })?;

        match &self.mode {
            MockMode::Echo => Ok(source),
            MockMode::Mappings(map) => Ok(map
                .iter()
                .filter(|((_, target), _)| target == language)
                .fold(source, |doc, ((fragment, _), translated)| {
                    doc.replace(fragment.as_str(), translated)
                })),
            MockMode::Error(msg) => Err(ServiceError::Other(msg.clone())),
        }
    }

    fn provider_name(&self) -> &str {
        "Mock Translation Service"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_pushed_document() {
        let service = MockTranslationService::new(MockMode::Echo);
        service
            .push_resource("website", "abouthtml", "About", "<html>Hi</html>")
            .await
            .unwrap();
        let html = service
            .pull_translation("website", "abouthtml", "de")
            .await
            .unwrap();
        assert_eq!(html, "<html>Hi</html>");
        assert_eq!(
            service.resource("website", "abouthtml").as_deref(),
            Some("<html>Hi</html>")
        );
    }

    #[tokio::test]
    async fn test_mappings_per_language() {
        let mut map = HashMap::new();
        map.insert(("Hello".to_string(), "de".to_string()), "Hallo".to_string());
        map.insert(("Hello".to_string(), "fr".to_string()), "Bonjour".to_string());

        let service = MockTranslationService::new(MockMode::Mappings(map));
        service
            .push_resource("website", "homehtml", "Home", "<div>Hello</div>")
            .await
            .unwrap();

        assert_eq!(
            service.pull_translation("website", "homehtml", "de").await.unwrap(),
            "<div>Hallo</div>"
        );
        assert_eq!(
            service.pull_translation("website", "homehtml", "fr").await.unwrap(),
            "<div>Bonjour</div>"
        );
        assert_eq!(
            service.pull_translation("website", "homehtml", "it").await.unwrap(),
            "<div>Hello</div>"
        );
    }

    #[tokio::test]
    async fn test_pull_unknown_resource() {
        let service = MockTranslationService::new(MockMode::Echo);
        let result = service.pull_translation("website", "missinghtml", "de").await;
        assert!(matches!(result, Err(ServiceError::Api { status: 404, .. })));
    }

    #[tokio::test]
    async fn test_error_mode() {
        let service = MockTranslationService::new(MockMode::Error("down".to_string()));
        let result = service.push_resource("website", "homehtml", "Home", "").await;
        assert_eq!(result, Err(ServiceError::Other("down".to_string())));
    }

    #[tokio::test]
    async fn test_delay_adds_latency() {
        let service = MockTranslationService::with_delay(MockMode::Echo, 50);
        let start = std::time::Instant::now();
        service
            .push_resource("website", "homehtml", "Home", "")
            .await
            .unwrap();
        assert!(start.elapsed().as_millis() >= 50);
    }

    #[test]
    fn test_provider_name() {
        let service = MockTranslationService::new(MockMode::Echo);
        assert_eq!(service.provider_name(), "Mock Translation Service");
    }
}
