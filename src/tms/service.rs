//! Translation service trait and language-code mapping

use crate::error::ServiceResult;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Generic trait for translation management services
///
/// A page is stored on the service as one resource holding its English
/// interchange document; translators work on it and the service hands back
/// one translated document per language.
#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Create or update the source document of a resource
    ///
    /// # Arguments
    ///
    /// * `project` - Project slug on the service
    /// * `resource` - Resource slug, see [`resource_slug`]
    /// * `name` - Human readable resource name
    /// * `content` - Rendered interchange document
    async fn push_resource(
        &self,
        project: &str,
        resource: &str,
        name: &str,
        content: &str,
    ) -> ServiceResult<()>;

    /// Fetch the translated document of a resource
    ///
    /// `language` must already be a service language code, see
    /// [`LanguageShim::to_service`].
    async fn pull_translation(
        &self,
        project: &str,
        resource: &str,
        language: &str,
    ) -> ServiceResult<String>;

    /// Name used in logs
    fn provider_name(&self) -> &str;
}

/// Resource slug a page is stored under
///
/// ```ignore
/// assert_eq!(resource_slug("about"), "abouthtml");
/// ```
pub fn resource_slug(page_slug: &str) -> String {
    format!("{}html", page_slug)
}

/// Page slug named by a resource, as reported by the service's callbacks
///
/// The service reports resources in its own casing, so the result is
/// lower-cased and every `html` is removed.
pub fn slug_from_resource(resource: &str) -> String {
    resource.to_lowercase().replace("html", "")
}

/// Maps site language codes onto translation service codes and back.
///
/// Codes without an entry map to themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageShim(BTreeMap<String, String>);

impl LanguageShim {
    pub fn new(mapping: BTreeMap<String, String>) -> Self {
        Self(mapping)
    }

    pub fn to_service(&self, site_code: &str) -> String {
        self.0
            .get(site_code)
            .cloned()
            .unwrap_or_else(|| site_code.to_string())
    }

    pub fn to_site(&self, service_code: &str) -> String {
        self.0
            .iter()
            .find(|(_, service)| service.as_str() == service_code)
            .map(|(site, _)| site.clone())
            .unwrap_or_else(|| service_code.to_string())
    }
}
