//! Page duplicator
//!
//! Copies one page onto another across the configured languages: titles
//! first, then every placeholder's plugin content, then an optional publish.
//! Title and publish failures are per language and never abort the run;
//! they come back in the [`DuplicationReport`]. A failure while copying
//! content aborts the whole duplication.

use crate::content::{ContentTree, PageId, PlaceholderId, PluginId, SOURCE_LANGUAGE, Title};
use crate::error::{ContentError, ContentResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Publishes one language of a page
pub trait Publisher: Send + Sync {
    fn publish(
        &self,
        tree: &mut ContentTree,
        page: PageId,
        language: &str,
        user: Option<&str>,
    ) -> ContentResult<()>;
}

/// Publishes into the tree's own public copies
#[derive(Debug, Clone, Copy, Default)]
pub struct TreePublisher;

impl Publisher for TreePublisher {
    fn publish(
        &self,
        tree: &mut ContentTree,
        page: PageId,
        language: &str,
        user: Option<&str>,
    ) -> ContentResult<()> {
        let public = tree.publish(page, language)?;
        info!(
            "Published page {} ({}) as {} by {}",
            page.0,
            language,
            public.0,
            user.unwrap_or("system")
        );
        Ok(())
    }
}

/// Result of one per-language step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageOutcome {
    pub language: String,
    pub result: ContentResult<()>,
}

impl LanguageOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateOptions {
    pub publish: bool,
    pub user: Option<String>,
    /// Restrict the run to these languages; `None` means every configured one
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicationReport {
    pub titles: Vec<LanguageOutcome>,
    pub published: Vec<LanguageOutcome>,
    pub copied_plugins: usize,
}

impl DuplicationReport {
    pub fn failures(&self) -> impl Iterator<Item = &LanguageOutcome> {
        self.titles
            .iter()
            .chain(self.published.iter())
            .filter(|outcome| !outcome.is_ok())
    }
}

#[derive(Clone)]
pub struct PageDuplicator {
    languages: Vec<String>,
    publisher: Arc<dyn Publisher>,
}

impl std::fmt::Debug for PageDuplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageDuplicator")
            .field("languages", &self.languages)
            .finish()
    }
}

impl PageDuplicator {
    pub fn new(languages: Vec<String>) -> Self {
        Self {
            languages,
            publisher: Arc::new(TreePublisher),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Copy `source` onto `destination`.
    ///
    /// Titles are read from the source's public copy (or the source itself
    /// if it was never published) and written to the destination's draft.
    /// Source titles take the English title and slug, destination titles the
    /// English slug; meta titles are copied per language. Content is taken
    /// from the source page as given.
    pub fn duplicate(
        &self,
        tree: &mut ContentTree,
        source: PageId,
        destination: PageId,
        options: &DuplicateOptions,
    ) -> ContentResult<DuplicationReport> {
        let languages: Vec<String> = match &options.languages {
            Some(subset) => self
                .languages
                .iter()
                .filter(|code| subset.contains(code))
                .cloned()
                .collect(),
            None => self.languages.clone(),
        };

        let source_placeholders = tree.placeholders(source)?.to_vec();
        let public_source = tree.public_object(source)?.unwrap_or(source);
        let destination = tree.draft_object(destination)?;

        let mut destination_slots: HashMap<String, PlaceholderId> = HashMap::new();
        for id in tree.placeholders(destination)? {
            destination_slots.insert(tree.placeholder(*id)?.slot.clone(), *id);
        }

        let mut report = DuplicationReport::default();
        let en_title = tree.title(public_source, SOURCE_LANGUAGE).cloned();

        for language in &languages {
            let result = sync_title(tree, public_source, destination, language, en_title.as_ref());
            if let Err(e) = &result {
                warn!("Error updating title of page {} ({}): {}", destination.0, language, e);
            }
            report.titles.push(LanguageOutcome {
                language: language.clone(),
                result,
            });
        }

        for placeholder in source_placeholders {
            let slot = tree.placeholder(placeholder)?.slot.clone();
            let target = match destination_slots.get(&slot) {
                Some(target) => *target,
                None => {
                    let target = tree.add_placeholder(destination, &slot)?;
                    destination_slots.insert(slot, target);
                    target
                }
            };

            for language in &languages {
                tree.clear(target, Some(language));
                let plugins: Vec<PluginId> = tree
                    .plugins(placeholder, language)
                    .iter()
                    .map(|p| p.id)
                    .collect();
                report.copied_plugins += tree.copy_plugins_to(&plugins, target, language)?.len();
            }
        }

        if options.publish {
            for language in &languages {
                let result =
                    self.publisher
                        .publish(tree, destination, language, options.user.as_deref());
                if let Err(e) = &result {
                    warn!("Could not publish page {} ({}): {}", destination.0, language, e);
                }
                report.published.push(LanguageOutcome {
                    language: language.clone(),
                    result,
                });
            }
        }

        info!(
            "Duplicated page {} onto {}: {} plugins, {} languages",
            source.0,
            destination.0,
            report.copied_plugins,
            languages.len()
        );
        Ok(report)
    }
}

fn sync_title(
    tree: &mut ContentTree,
    source: PageId,
    destination: PageId,
    language: &str,
    en_title: Option<&Title>,
) -> ContentResult<()> {
    if let Some(en) = en_title {
        if tree.title(source, language).is_some() {
            tree.update_title(source, language, |title| {
                title.title = en.title.clone();
                title.slug = en.slug.clone();
            })?;
        }
    }

    let title = tree
        .title(source, language)
        .or(en_title)
        .cloned()
        .ok_or_else(|| ContentError::MissingTitle {
            page: source.0,
            language: language.to_string(),
        })?;

    if tree.title(destination, language).is_none() {
        tree.create_title(destination, language, &title.title, &title.slug)?;
    }

    // Meta title follows the language, the slug follows English
    let slug = en_title.map_or_else(|| title.slug.clone(), |en| en.slug.clone());
    tree.update_title(destination, language, |destination_title| {
        destination_title.page_title = title.page_title.clone();
        destination_title.slug = slug;
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PluginTypes, TextFieldKind};

    fn languages() -> Vec<String> {
        vec!["en".to_string(), "de".to_string(), "fr".to_string()]
    }

    fn tree_with_pages() -> (ContentTree, PageId, PageId) {
        let mut types = PluginTypes::new();
        types
            .register("TextPlugin", Some(TextFieldKind::Body))
            .register("LinkPlugin", Some(TextFieldKind::Name));
        let mut tree = ContentTree::with_plugin_types(types);

        let source = tree.add_page(None, "en", "About", "about").unwrap();
        tree.create_title(source, "de", "Über uns", "ueber-uns").unwrap();
        tree.update_title(source, "en", |t| t.page_title = "About us".to_string())
            .unwrap();
        let content = tree.add_placeholder(source, "content").unwrap();
        let text = tree.add_plugin(content, "en", None, "TextPlugin", "Hello").unwrap();
        tree.add_plugin(content, "en", Some(text), "LinkPlugin", "More").unwrap();
        tree.add_plugin(content, "de", None, "TextPlugin", "Hallo").unwrap();

        let destination = tree.add_page(None, "en", "Old", "old").unwrap();
        tree.add_placeholder(destination, "content").unwrap();
        (tree, source, destination)
    }

    struct FailingPublisher(&'static str);

    impl Publisher for FailingPublisher {
        fn publish(
            &self,
            tree: &mut ContentTree,
            page: PageId,
            language: &str,
            _user: Option<&str>,
        ) -> ContentResult<()> {
            if language == self.0 {
                return Err(ContentError::PublishFailed {
                    language: language.to_string(),
                    reason: "simulated".to_string(),
                });
            }
            tree.publish(page, language).map(|_| ())
        }
    }

    #[test]
    fn test_duplicate_normalizes_titles() {
        let (mut tree, source, destination) = tree_with_pages();
        tree.update_title(source, "de", |t| t.page_title = "Wer wir sind".to_string())
            .unwrap();
        let report = PageDuplicator::new(languages())
            .duplicate(&mut tree, source, destination, &DuplicateOptions::default())
            .unwrap();

        // Source has no public copy, so the draft's own titles are normalized
        assert_eq!(tree.title(source, "de").unwrap().title, "About");
        assert_eq!(tree.title(source, "de").unwrap().slug, "about");

        let de = tree.title(destination, "de").unwrap();
        assert_eq!(de.title, "About");
        assert_eq!(de.slug, "about");
        // Meta title comes from the same language
        assert_eq!(de.page_title, "Wer wir sind");
        assert_eq!(tree.title(source, "de").unwrap().page_title, "Wer wir sind");

        // Existing destination titles keep their text but take the English slug
        let en = tree.title(destination, "en").unwrap();
        assert_eq!(en.title, "Old");
        assert_eq!(en.slug, "about");
        assert_eq!(en.page_title, "About us");

        // fr falls back to the English title
        let fr = tree.title(destination, "fr").unwrap();
        assert_eq!(fr.title, "About");
        assert_eq!(fr.page_title, "About us");
        assert!(report.titles.iter().all(LanguageOutcome::is_ok));
    }

    #[test]
    fn test_duplicate_title_failure_does_not_abort() {
        let mut tree = ContentTree::new();
        let source = tree.add_page(None, "de", "Nur Deutsch", "nur-deutsch").unwrap();
        let destination = tree.add_page(None, "de", "Ziel", "ziel").unwrap();

        let report = PageDuplicator::new(languages())
            .duplicate(&mut tree, source, destination, &DuplicateOptions::default())
            .unwrap();

        let failed: Vec<&str> = report.failures().map(|o| o.language.as_str()).collect();
        assert_eq!(failed, vec!["en", "fr"]);
        assert!(report.titles[1].is_ok());
    }

    #[test]
    fn test_duplicate_copies_content_per_language() {
        let (mut tree, source, destination) = tree_with_pages();
        let content = tree.placeholder_by_slot(destination, "content").unwrap();
        tree.add_plugin(content, "en", None, "TextPlugin", "Old text").unwrap();

        let report = PageDuplicator::new(languages())
            .duplicate(&mut tree, source, destination, &DuplicateOptions::default())
            .unwrap();

        assert_eq!(report.copied_plugins, 3);
        let en: Vec<&str> = tree.plugins(content, "en").iter().map(|p| p.text_value()).collect();
        assert_eq!(en, vec!["Hello", "More"]);
        assert_eq!(tree.plugins(content, "de")[0].text_value(), "Hallo");
        assert!(tree.plugins(content, "fr").is_empty());
    }

    #[test]
    fn test_duplicate_creates_missing_slots() {
        let (mut tree, source, destination) = tree_with_pages();
        let sidebar = tree.add_placeholder(source, "sidebar").unwrap();
        tree.add_plugin(sidebar, "en", None, "TextPlugin", "Aside").unwrap();

        PageDuplicator::new(languages())
            .duplicate(&mut tree, source, destination, &DuplicateOptions::default())
            .unwrap();

        assert_eq!(
            tree.slots(destination).unwrap(),
            vec!["content".to_string(), "sidebar".to_string()]
        );
    }

    #[test]
    fn test_duplicate_language_subset() {
        let (mut tree, source, destination) = tree_with_pages();
        let options = DuplicateOptions {
            languages: Some(vec!["en".to_string()]),
            ..Default::default()
        };
        let report = PageDuplicator::new(languages())
            .duplicate(&mut tree, source, destination, &options)
            .unwrap();

        assert_eq!(report.titles.len(), 1);
        let content = tree.placeholder_by_slot(destination, "content").unwrap();
        assert!(tree.plugins(content, "de").is_empty());
        assert!(tree.title(destination, "de").is_none());
    }

    #[test]
    fn test_duplicate_publish_is_best_effort() {
        let (mut tree, source, destination) = tree_with_pages();
        let options = DuplicateOptions {
            publish: true,
            user: Some("editor".to_string()),
            languages: None,
        };
        let report = PageDuplicator::new(languages())
            .with_publisher(Arc::new(FailingPublisher("de")))
            .duplicate(&mut tree, source, destination, &options)
            .unwrap();

        let published: Vec<(&str, bool)> = report
            .published
            .iter()
            .map(|o| (o.language.as_str(), o.is_ok()))
            .collect();
        assert_eq!(published, vec![("en", true), ("de", false), ("fr", true)]);

        let public = tree.public_object(destination).unwrap().unwrap();
        assert!(tree.title(public, "fr").is_some());
        assert!(tree.title(public, "de").is_none());
    }

    #[test]
    fn test_duplicate_reads_titles_from_public_copy() {
        let (mut tree, source, destination) = tree_with_pages();
        tree.publish(source, "en").unwrap();
        tree.update_title(source, "en", |t| t.title = "About (draft)".to_string())
            .unwrap();

        PageDuplicator::new(languages())
            .duplicate(&mut tree, source, destination, &DuplicateOptions::default())
            .unwrap();

        assert_eq!(tree.title(destination, "fr").unwrap().title, "About");
    }
}
