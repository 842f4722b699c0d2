//! End-to-end tests for the duplication and translation round-trip
//!
//! Everything runs on an in-memory tree with the mock translation service
//! and tracker, so no network access is needed.
//!
//! ```bash
//! cargo test --lib integration_tests
//! ```

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    const LANGUAGES: [&str; 3] = ["en", "de", "fr"];

    fn languages() -> Vec<String> {
        LANGUAGES.iter().map(|l| l.to_string()).collect()
    }

    fn plugin_types() -> PluginTypes {
        let mut types = PluginTypes::new();
        types
            .register("TextPlugin", Some(TextFieldKind::Body))
            .register_fields("LinkPlugin", &["url", "name"])
            .register_fields("TeaserPlugin", &["title", "image"])
            .register("PicturePlugin", None);
        types
    }

    /// Staging and production roots with a rich "about" page in staging and
    /// an empty "about" page in production
    fn site() -> (ContentTree, PageId, PageId) {
        let mut tree = ContentTree::with_plugin_types(plugin_types());
        let staging = tree.add_page(None, "en", "Staging", "staging").unwrap();
        let production = tree.add_page(None, "en", "Production", "production").unwrap();

        let about = tree.add_page(Some(staging), "en", "About", "about").unwrap();
        tree.update_title(about, "en", |t| t.page_title = "About us".to_string())
            .unwrap();
        tree.create_title(about, "de", "Über uns", "ueber-uns").unwrap();

        let content = tree.add_placeholder(about, "content").unwrap();
        let intro = tree
            .add_plugin(content, "en", None, "TextPlugin", "<p>Welcome to the café</p>")
            .unwrap();
        tree.add_plugin(content, "en", Some(intro), "LinkPlugin", "Read more")
            .unwrap();
        tree.add_plugin(content, "en", Some(intro), "PicturePlugin", "")
            .unwrap();
        tree.add_plugin(content, "en", None, "TeaserPlugin", "Our team")
            .unwrap();
        tree.add_plugin(content, "de", None, "TextPlugin", "<p>Willkommen</p>")
            .unwrap();

        let sidebar = tree.add_placeholder(about, "sidebar").unwrap();
        // Matching is page-wide, so keep (position, type) unique across slots
        tree.add_plugin(sidebar, "en", None, "TeaserPlugin", "Contact&#160;us")
            .unwrap();

        let target = tree
            .add_page(Some(production), "en", "About", "about")
            .unwrap();
        (tree, about, target)
    }

    /// (type, position, parent position) of each plugin, in tree order
    fn shape(
        tree: &ContentTree,
        page: PageId,
        language: &str,
    ) -> Vec<(String, Vec<(String, u32, Option<u32>)>)> {
        let mut slots = tree.slots(page).unwrap();
        slots.sort();
        slots
            .into_iter()
            .map(|slot| {
                let placeholder = tree.placeholder_by_slot(page, &slot).unwrap();
                let plugins = tree.plugins(placeholder, language);
                let entries = plugins
                    .iter()
                    .map(|p| {
                        let parent = p.parent.map(|id| tree.plugin(id).unwrap().position);
                        (p.plugin_type.clone(), p.position, parent)
                    })
                    .collect();
                (slot, entries)
            })
            .collect()
    }

    fn text_by_key(
        tree: &ContentTree,
        page: PageId,
        language: &str,
    ) -> HashMap<(u32, String), String> {
        PluginWalker::new(tree, page, language)
            .units()
            .map(|unit| ((unit.position, unit.plugin_type), unit.text))
            .collect()
    }

    // ============================================================================
    // TEST 1: Export then re-import English reproduces the original text
    // ============================================================================

    #[test]
    fn test_round_trip_into_english() {
        let (mut tree, about, _) = site();
        let before = text_by_key(&tree, about, "en");

        let html = InterchangeDocument::from_page(&tree, about).unwrap().render();
        let parsed = parse_document(&html).unwrap();
        assert_eq!(parsed.title.as_deref(), Some("About us"));

        let report = translate_page(&mut tree, about, "en", &parsed.records).unwrap();
        assert!(!report.applied.is_empty());

        let after = text_by_key(&tree, about, "en");
        for (key, text) in &before {
            // Non-breaking spaces are normalized on export
            let expected = text.replace("&#160;", " ");
            assert_eq!(after.get(key), Some(&expected), "text of {:?}", key);
        }
    }

    // ============================================================================
    // TEST 2: Duplication preserves slots and per-language structure
    // ============================================================================

    #[test]
    fn test_duplication_preserves_structure() {
        let (mut tree, about, target) = site();
        PageDuplicator::new(languages())
            .duplicate(&mut tree, about, target, &DuplicateOptions::default())
            .unwrap();

        let mut source_slots = tree.slots(about).unwrap();
        let mut target_slots = tree.slots(target).unwrap();
        source_slots.sort();
        target_slots.sort();
        assert_eq!(source_slots, target_slots);

        for language in LANGUAGES {
            assert_eq!(
                shape(&tree, about, language),
                shape(&tree, target, language),
                "structure of {}",
                language
            );
        }
    }

    // ============================================================================
    // TEST 3: Duplicating twice equals duplicating once
    // ============================================================================

    #[test]
    fn test_duplication_is_idempotent() {
        let (mut tree, about, target) = site();
        let duplicator = PageDuplicator::new(languages());
        let options = DuplicateOptions::default();

        duplicator.duplicate(&mut tree, about, target, &options).unwrap();
        let once: Vec<_> = LANGUAGES
            .iter()
            .map(|l| (shape(&tree, target, l), text_by_key(&tree, target, l)))
            .collect();

        duplicator.duplicate(&mut tree, about, target, &options).unwrap();
        let twice: Vec<_> = LANGUAGES
            .iter()
            .map(|l| (shape(&tree, target, l), text_by_key(&tree, target, l)))
            .collect();

        assert_eq!(once, twice);
    }

    // ============================================================================
    // TEST 4: Non-ASCII text travels as character references
    // ============================================================================

    #[test]
    fn test_escaping_in_exported_document() {
        let (tree, about, _) = site();
        let html = InterchangeDocument::from_page(&tree, about).unwrap().render();

        assert!(html.contains("<p>Welcome to the caf&#233;</p>"));
        assert!(html.contains(">Contact us</div>"));
        assert!(!html.contains("&#160;"));
        assert!(html.is_ascii());

        let parsed = parse_document(&html).unwrap();
        assert!(
            parsed
                .records
                .iter()
                .any(|r| r.translated == "<p>Welcome to the café</p>")
        );
    }

    // ============================================================================
    // TEST 5: One failing language does not block publishing the others
    // ============================================================================

    struct RejectingPublisher(&'static str);

    impl Publisher for RejectingPublisher {
        fn publish(
            &self,
            tree: &mut ContentTree,
            page: PageId,
            language: &str,
            user: Option<&str>,
        ) -> ContentResult<()> {
            if language == self.0 {
                return Err(ContentError::PublishFailed {
                    language: language.to_string(),
                    reason: "simulated outage".to_string(),
                });
            }
            TreePublisher.publish(tree, page, language, user)
        }
    }

    #[test]
    fn test_publish_is_best_effort() {
        let (mut tree, about, target) = site();
        let report = PageDuplicator::new(languages())
            .with_publisher(Arc::new(RejectingPublisher("fr")))
            .duplicate(
                &mut tree,
                about,
                target,
                &DuplicateOptions {
                    publish: true,
                    user: Some("editor".to_string()),
                    languages: None,
                },
            )
            .unwrap();

        let published: Vec<(&str, bool)> = report
            .published
            .iter()
            .map(|o| (o.language.as_str(), o.is_ok()))
            .collect();
        assert_eq!(published, vec![("en", true), ("de", true), ("fr", false)]);

        let page = tree.page(target).unwrap();
        assert!(page.published_languages.contains("en"));
        assert!(page.published_languages.contains("de"));
        assert!(!page.published_languages.contains("fr"));
    }

    // ============================================================================
    // TEST 6: German falls back to English until its translation arrives
    // ============================================================================

    #[test]
    fn test_german_fallback_then_translation() {
        let mut tree = ContentTree::with_plugin_types(plugin_types());
        let source = tree.add_page(None, "en", "Home", "home").unwrap();
        let content = tree.add_placeholder(source, "content").unwrap();
        tree.add_plugin(content, "en", None, "TextPlugin", "Hello").unwrap();
        let destination = tree.add_page(None, "en", "Home", "home-copy").unwrap();

        PageDuplicator::new(languages())
            .duplicate(&mut tree, source, destination, &DuplicateOptions::default())
            .unwrap();

        // Structural copy of English into German, no translations yet
        translate_page(&mut tree, destination, "de", &[]).unwrap();
        let target = tree.placeholder_by_slot(destination, "content").unwrap();
        let german = tree.plugins(target, "de");
        assert_eq!(german.len(), 1);
        assert_eq!(german[0].position, 0);
        assert_eq!(german[0].plugin_type, "TextPlugin");
        assert_eq!(german[0].text_value(), "Hello");

        let records = [TranslationRecord::new(0, "TextPlugin", "Hallo")];
        translate_page(&mut tree, destination, "de", &records).unwrap();
        assert_eq!(tree.plugins(target, "de")[0].text_value(), "Hallo");
        assert_eq!(tree.plugins(target, "en")[0].text_value(), "Hello");
    }

    // ============================================================================
    // TEST 7: Webhook to published translation, through the job queue
    // ============================================================================

    #[tokio::test]
    async fn test_validation_to_translated_production() {
        let (tree, _, _) = site();
        let mut mappings = HashMap::new();
        mappings.insert(
            ("Read more".to_string(), "fr".to_string()),
            "Lire la suite".to_string(),
        );
        mappings.insert(
            ("About us".to_string(), "fr".to_string()),
            "Qui sommes-nous".to_string(),
        );
        let translations = Arc::new(MockTranslationService::new(MockMode::Mappings(mappings)));
        let tracker = Arc::new(MockTracker::new());
        let config = SyncConfig {
            languages: LANGUAGES.iter().map(|l| Language::new(l, l)).collect(),
            import_jitter_secs: (0, 0),
            ..SyncConfig::default()
        };
        let context = SyncContext::new(config, tree, translations.clone(), tracker.clone());
        let dispatcher = Dispatcher::new(Arc::new(context));

        let issue = serde_json::json!({
            "issue": { "fields": { "page_address": "/en/staging/about/" } }
        });
        let scheduled = dispatcher
            .validate_page(issue.to_string().as_bytes())
            .await
            .unwrap();
        for result in scheduled.join().await {
            result.unwrap();
        }

        let callback = TranslationCallback {
            resource: "abouthtml".to_string(),
            language: "fr".to_string(),
            project: "website".to_string(),
        };
        for result in dispatcher.receive_translation(&callback).join().await {
            result.unwrap();
        }

        let scheduled = dispatcher
            .complete_page(issue.to_string().as_bytes())
            .await
            .unwrap();
        for result in scheduled.join().await {
            result.unwrap();
        }

        let tree = dispatcher.context().tree.lock().await;
        let production = resolve_page(&tree, "production", "about").unwrap();
        let public = tree.public_object(production).unwrap().unwrap();
        let texts: Vec<String> = PluginWalker::new(&tree, public, "fr")
            .units()
            .map(|unit| unit.text)
            .collect();
        assert!(texts.contains(&"Lire la suite".to_string()));

        // The imported meta title survives promotion in its own language
        assert_eq!(tree.title(public, "fr").unwrap().page_title, "Qui sommes-nous");
        assert_eq!(tree.title(production, "fr").unwrap().page_title, "Qui sommes-nous");
        assert_eq!(tree.title(public, "en").unwrap().page_title, "About us");
        assert_eq!(tracker.calls().len(), 1);
    }
}
