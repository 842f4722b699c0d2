//! Issue tracker integration
//!
//! Once a translation comes back, the ticket tracking the page is moved on
//! to its next workflow state. `IssueTracker` abstracts the tracker; Jira is
//! the HTTP implementation and `MockTracker` records calls for tests.

pub mod jira;
pub mod mock;

use crate::error::ServiceResult;
use async_trait::async_trait;

pub use jira::JiraClient;
pub use mock::MockTracker;

#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Advance every ticket of `project` whose page address mentions `slug`.
    /// Returns the keys of the transitioned tickets.
    async fn transition_ticket(&self, slug: &str, project: &str) -> ServiceResult<Vec<String>>;

    /// Name used in logs
    fn provider_name(&self) -> &str;
}
