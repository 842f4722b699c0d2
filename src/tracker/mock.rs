//! In-memory issue tracker that records every transition request

use crate::error::{ServiceError, ServiceResult};
use crate::tracker::IssueTracker;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MockTracker {
    /// (slug, project) of every call, in order
    calls: Mutex<Vec<(String, String)>>,
    /// When set, every call fails with this message
    failure: Option<String>,
}

impl MockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    async fn transition_ticket(&self, slug: &str, project: &str) -> ServiceResult<Vec<String>> {
        self.calls
            .lock()
            .map_err(|_| ServiceError::Other("mock tracker poisoned".to_string()))?
            .push((slug.to_string(), project.to_string()));

        match &self.failure {
            Some(message) => Err(ServiceError::Other(message.clone())),
            None => Ok(vec![format!("{}-{}", project.to_uppercase(), slug)]),
        }
    }

    fn provider_name(&self) -> &str {
        "Mock Tracker"
    }
}
