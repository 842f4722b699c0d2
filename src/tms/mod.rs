/// Translation management service integration
///
/// Pages travel to and from the translation service as interchange
/// documents, one resource per page. This module provides:
///
/// 1. **`TranslationService` trait** - provider abstraction for pushing source
///    documents and pulling translated ones
/// 2. **Transifex client** - HTTP implementation against the Transifex API
/// 3. **Mock service** - in-memory implementation for tests and offline runs
/// 4. **Language shim** - maps site language codes onto the service's codes
///
/// # Example
///
/// ```ignore
/// use page_sync::tms::{TranslationService, TransifexClient};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = TransifexClient::from_env()?;
///     service.push_resource("website", "abouthtml", "About", "<html>...</html>").await?;
///     let french = service.pull_translation("website", "abouthtml", "fr").await?;
///     println!("{}", french);
///     Ok(())
/// }
/// ```
pub mod mock;
pub mod service;
pub mod transifex;

pub use mock::{MockMode, MockTranslationService};
pub use service::{LanguageShim, TranslationService, resource_slug, slug_from_resource};
pub use transifex::TransifexClient;
