//! Background jobs
//!
//! Every multi-step operation triggered from the outside (promotion,
//! translation push and pull, ticket transitions) runs as a [`Job`] on a
//! tokio task, optionally after a start delay. Jobs share one
//! [`SyncContext`]; the content tree sits behind an async mutex, so two
//! jobs never interleave their clear/copy steps on the same tree.

use crate::config::SyncConfig;
use crate::content::{ContentTree, PageId, SOURCE_LANGUAGE};
use crate::duplicator::{
    DuplicateOptions, DuplicationReport, PageDuplicator, Publisher, TreePublisher,
};
use crate::error::{ContentError, DispatchError, DispatchResult};
use crate::interchange::{InterchangeDocument, parse_document};
use crate::reinjector::translate_page;
use crate::tms::{LanguageShim, TranslationService, resource_slug};
use crate::tracker::IssueTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Duplicate a staging page onto its production twin
    PromotePage {
        slug: String,
        publish: bool,
        user: Option<String>,
        languages: Option<Vec<String>>,
    },
    /// Upload the English interchange document of a staging page
    PushToTranslation { slug: String },
    /// Download and re-inject one language. `language` is a service code.
    PullTranslation {
        slug: String,
        language: String,
        project: String,
    },
    TransitionTicket { slug: String, project: String },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::PromotePage { .. } => "promote-page",
            Job::PushToTranslation { .. } => "push-to-translation",
            Job::PullTranslation { .. } => "pull-translation",
            Job::TransitionTicket { .. } => "transition-ticket",
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Job::PromotePage { slug, .. }
            | Job::PushToTranslation { slug }
            | Job::PullTranslation { slug, .. }
            | Job::TransitionTicket { slug, .. } => slug,
        }
    }
}

/// Everything a job needs to run
pub struct SyncContext {
    pub config: SyncConfig,
    pub tree: Mutex<ContentTree>,
    pub translations: Arc<dyn TranslationService>,
    pub tracker: Arc<dyn IssueTracker>,
    pub publisher: Arc<dyn Publisher>,
}

impl SyncContext {
    pub fn new(
        config: SyncConfig,
        tree: ContentTree,
        translations: Arc<dyn TranslationService>,
        tracker: Arc<dyn IssueTracker>,
    ) -> Self {
        Self {
            config,
            tree: Mutex::new(tree),
            translations,
            tracker,
            publisher: Arc::new(TreePublisher),
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn shim(&self) -> LanguageShim {
        LanguageShim::new(self.config.language_shim.clone())
    }

    pub fn duplicator(&self) -> PageDuplicator {
        PageDuplicator::new(self.config.language_codes())
            .with_publisher(Arc::clone(&self.publisher))
    }

    /// Write the tree to the configured snapshot, if any
    pub fn save_snapshot(&self, tree: &ContentTree) -> DispatchResult<()> {
        if let Some(path) = &self.config.snapshot_path {
            tree.save_json(path)?;
            debug!("Saved snapshot to {}", path.display());
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("config", &self.config)
            .field("translations", &self.translations.provider_name())
            .field("tracker", &self.tracker.provider_name())
            .finish()
    }
}

/// Draft page with English slug `slug` below the top-level page `root`
pub fn resolve_page(tree: &ContentTree, root: &str, slug: &str) -> DispatchResult<PageId> {
    let root_page = tree
        .find_root(root)
        .ok_or_else(|| DispatchError::NotFound(root.to_string()))?;
    tree.find_descendant(root_page, SOURCE_LANGUAGE, slug)
        .ok_or_else(|| DispatchError::NotFound(format!("{}/{}", root, slug)))
}

/// Duplicate the staging page `slug` onto production, creating the
/// production page (and any missing ancestors) under the same slugs first.
pub fn promote_page(
    tree: &mut ContentTree,
    config: &SyncConfig,
    duplicator: &PageDuplicator,
    slug: &str,
    options: &DuplicateOptions,
) -> DispatchResult<DuplicationReport> {
    let staging = resolve_page(tree, &config.staging_root, slug)?;
    let production_root = tree
        .find_root(&config.production_root)
        .ok_or_else(|| DispatchError::NotFound(config.production_root.clone()))?;

    let production = match tree.find_descendant(production_root, SOURCE_LANGUAGE, slug) {
        Some(page) => page,
        None => mirror_page(tree, production_root, staging)?,
    };
    Ok(duplicator.duplicate(tree, staging, production, options)?)
}

/// Create the production counterpart of a staging page, parents first
fn mirror_page(
    tree: &mut ContentTree,
    production_root: PageId,
    staging: PageId,
) -> DispatchResult<PageId> {
    let title = tree
        .title(staging, SOURCE_LANGUAGE)
        .cloned()
        .ok_or_else(|| ContentError::MissingTitle {
            page: staging.0,
            language: SOURCE_LANGUAGE.to_string(),
        })?;

    let staging_parent = tree.page(staging)?.parent;
    let parent = match staging_parent {
        // Directly below the staging root
        Some(parent) if tree.page(parent)?.parent.is_none() => production_root,
        Some(parent) => {
            let parent_slug = tree
                .title(parent, SOURCE_LANGUAGE)
                .map(|t| t.slug.clone())
                .unwrap_or_default();
            match tree.find_descendant(production_root, SOURCE_LANGUAGE, &parent_slug) {
                Some(existing) => existing,
                None => mirror_page(tree, production_root, parent)?,
            }
        }
        None => production_root,
    };

    let page = tree.add_page(Some(parent), SOURCE_LANGUAGE, &title.title, &title.slug)?;
    info!("Created production page {} for '{}'", page.0, title.slug);
    Ok(page)
}

/// Run one job to completion
pub async fn run_job(context: &SyncContext, job: &Job) -> DispatchResult<()> {
    match job {
        Job::PromotePage {
            slug,
            publish,
            user,
            languages,
        } => {
            let options = DuplicateOptions {
                publish: *publish,
                user: user.clone(),
                languages: languages.clone(),
            };
            let mut tree = context.tree.lock().await;
            let report = promote_page(
                &mut tree,
                &context.config,
                &context.duplicator(),
                slug,
                &options,
            )?;
            for failure in report.failures() {
                warn!("Promotion of '{}' incomplete for {}", slug, failure.language);
            }
            context.save_snapshot(&tree)?;
        }
        Job::PushToTranslation { slug } => {
            // Render under the lock, upload without it
            let document = {
                let tree = context.tree.lock().await;
                let page = resolve_page(&tree, &context.config.staging_root, slug)?;
                let public = tree.public_object(page)?.unwrap_or(page);
                InterchangeDocument::from_page(&tree, public)?
            };
            context
                .translations
                .push_resource(
                    &context.config.translation_project,
                    &resource_slug(slug),
                    &document.title,
                    &document.render(),
                )
                .await?;
            info!(
                "Pushed '{}' ({} units) to {}",
                slug,
                document.units.len(),
                context.translations.provider_name()
            );
        }
        Job::PullTranslation {
            slug,
            language,
            project,
        } => {
            let html = context
                .translations
                .pull_translation(project, &resource_slug(slug), language)
                .await?;
            let parsed = parse_document(&html)?;

            let site_language = context.shim().to_site(language);
            if !context.config.language_codes().contains(&site_language) {
                return Err(DispatchError::InvalidPayload(format!(
                    "language '{}' is not configured",
                    site_language
                )));
            }

            let mut tree = context.tree.lock().await;
            let page = resolve_page(&tree, &context.config.staging_root, slug)?;
            let report = translate_page(&mut tree, page, &site_language, &parsed.records)?;
            if let Some(title) = parsed.title.filter(|t| !t.trim().is_empty()) {
                apply_page_title(&mut tree, page, &site_language, &title)?;
            }
            info!(
                "Imported {} translations into '{}' ({})",
                report.applied.len(),
                slug,
                site_language
            );
            context.save_snapshot(&tree)?;
        }
        Job::TransitionTicket { slug, project } => {
            let keys = context.tracker.transition_ticket(slug, project).await?;
            info!("Transitioned {:?} for '{}'", keys, slug);
        }
    }
    Ok(())
}

/// Store a translated meta-title, creating the language's title from the
/// English one when the page has none yet
pub fn apply_page_title(
    tree: &mut ContentTree,
    page: PageId,
    language: &str,
    page_title: &str,
) -> DispatchResult<()> {
    if tree.title(page, language).is_none() {
        let english = tree
            .title(page, SOURCE_LANGUAGE)
            .cloned()
            .ok_or_else(|| ContentError::MissingTitle {
                page: page.0,
                language: SOURCE_LANGUAGE.to_string(),
            })?;
        tree.create_title(page, language, &english.title, &english.slug)?;
    }
    tree.update_title(page, language, |title| {
        title.page_title = page_title.to_string()
    })?;
    Ok(())
}

/// Spawns jobs onto the tokio runtime
#[derive(Debug, Clone)]
pub struct JobQueue {
    context: Arc<SyncContext>,
}

impl JobQueue {
    pub fn new(context: Arc<SyncContext>) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        &self.context
    }

    pub fn enqueue(&self, job: Job) -> JoinHandle<DispatchResult<()>> {
        self.enqueue_after(job, Duration::ZERO)
    }

    /// Run `job` once `delay` has elapsed. Failures are logged; the handle
    /// also carries the result for callers that wait on it.
    pub fn enqueue_after(&self, job: Job, delay: Duration) -> JoinHandle<DispatchResult<()>> {
        let context = Arc::clone(&self.context);
        info!("Scheduled {} for '{}' in {:?}", job.name(), job.slug(), delay);
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let result = run_job(&context, &job).await;
            match &result {
                Ok(()) => info!("Finished {} for '{}'", job.name(), job.slug()),
                Err(e) => error!("{} for '{}' failed: {}", job.name(), job.slug(), e),
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{PluginTypes, TextFieldKind};
    use crate::error::ServiceError;
    use crate::tms::{MockMode, MockTranslationService};
    use crate::tracker::MockTracker;
    use std::collections::HashMap;

    fn site() -> ContentTree {
        let mut types = PluginTypes::new();
        types.register("TextPlugin", Some(TextFieldKind::Body));
        let mut tree = ContentTree::with_plugin_types(types);

        let staging = tree.add_page(None, "en", "Staging", "staging").unwrap();
        tree.add_page(None, "en", "Production", "production").unwrap();
        let about = tree.add_page(Some(staging), "en", "About", "about").unwrap();
        let team = tree.add_page(Some(about), "en", "Team", "team").unwrap();
        for page in [about, team] {
            let content = tree.add_placeholder(page, "content").unwrap();
            tree.add_plugin(content, "en", None, "TextPlugin", "Hello").unwrap();
        }
        tree
    }

    fn config() -> SyncConfig {
        SyncConfig {
            languages: vec![
                crate::config::Language::new("en", "English"),
                crate::config::Language::new("de", "Deutsch"),
            ],
            ..SyncConfig::default()
        }
    }

    fn context(mode: MockMode) -> (SyncContext, Arc<MockTranslationService>, Arc<MockTracker>) {
        let translations = Arc::new(MockTranslationService::new(mode));
        let tracker = Arc::new(MockTracker::new());
        let context = SyncContext::new(config(), site(), translations.clone(), tracker.clone());
        (context, translations, tracker)
    }

    #[test]
    fn test_resolve_page_not_found() {
        let tree = site();
        assert!(resolve_page(&tree, "staging", "about").is_ok());
        assert!(matches!(
            resolve_page(&tree, "staging", "missing"),
            Err(DispatchError::NotFound(_))
        ));
        assert!(matches!(
            resolve_page(&tree, "archive", "about"),
            Err(DispatchError::NotFound(name)) if name == "archive"
        ));
    }

    #[test]
    fn test_promote_creates_production_ancestors() {
        let mut tree = site();
        let config = config();
        let duplicator = PageDuplicator::new(config.language_codes());

        let options = DuplicateOptions::default();
        promote_page(&mut tree, &config, &duplicator, "team", &options).unwrap();

        let team = resolve_page(&tree, "production", "team").unwrap();
        let about = resolve_page(&tree, "production", "about").unwrap();
        assert_eq!(tree.page(team).unwrap().parent, Some(about));

        let content = tree.placeholder_by_slot(team, "content").unwrap();
        let plugins = tree.plugins(content, "en");
        assert_eq!(plugins.len(), 1);
        assert_eq!(plugins[0].text_value(), "Hello");
    }

    #[test]
    fn test_promote_reuses_existing_page() {
        let mut tree = site();
        let config = config();
        let duplicator = PageDuplicator::new(config.language_codes());
        let options = DuplicateOptions::default();

        promote_page(&mut tree, &config, &duplicator, "about", &options).unwrap();
        let first = resolve_page(&tree, "production", "about").unwrap();
        promote_page(&mut tree, &config, &duplicator, "about", &options).unwrap();
        assert_eq!(resolve_page(&tree, "production", "about").unwrap(), first);
    }

    #[tokio::test]
    async fn test_push_then_pull_translation() {
        let mut map = HashMap::new();
        map.insert(("Hello".to_string(), "de".to_string()), "Hallo".to_string());
        map.insert(("About".to_string(), "de".to_string()), "Über uns".to_string());
        let (context, translations, _) = context(MockMode::Mappings(map));

        run_job(&context, &Job::PushToTranslation { slug: "about".to_string() })
            .await
            .unwrap();
        assert!(translations.resource("website", "abouthtml").is_some());

        run_job(
            &context,
            &Job::PullTranslation {
                slug: "about".to_string(),
                language: "de".to_string(),
                project: "website".to_string(),
            },
        )
        .await
        .unwrap();

        let tree = context.tree.lock().await;
        let about = resolve_page(&tree, "staging", "about").unwrap();
        let content = tree.placeholder_by_slot(about, "content").unwrap();
        assert_eq!(tree.plugins(content, "de")[0].text_value(), "Hallo");
        assert_eq!(tree.title(about, "de").unwrap().page_title, "Über uns");
        assert_eq!(tree.title(about, "de").unwrap().slug, "about");
    }

    #[tokio::test]
    async fn test_pull_maps_service_language() {
        let (mut context, _, _) = context(MockMode::Echo);
        context.config.languages.push(crate::config::Language::new("af", "Pashto"));

        run_job(&context, &Job::PushToTranslation { slug: "about".to_string() })
            .await
            .unwrap();
        run_job(
            &context,
            &Job::PullTranslation {
                slug: "about".to_string(),
                language: "ps".to_string(),
                project: "website".to_string(),
            },
        )
        .await
        .unwrap();

        let tree = context.tree.lock().await;
        let about = resolve_page(&tree, "staging", "about").unwrap();
        let content = tree.placeholder_by_slot(about, "content").unwrap();
        assert_eq!(tree.plugins(content, "af").len(), 1);
        assert!(tree.plugins(content, "ps").is_empty());
    }

    #[tokio::test]
    async fn test_pull_rejects_unknown_language() {
        let (context, _, _) = context(MockMode::Echo);
        run_job(&context, &Job::PushToTranslation { slug: "about".to_string() })
            .await
            .unwrap();
        let result = run_job(
            &context,
            &Job::PullTranslation {
                slug: "about".to_string(),
                language: "xx".to_string(),
                project: "website".to_string(),
            },
        )
        .await;
        assert!(matches!(result, Err(DispatchError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_push_service_error() {
        let (context, _, _) = context(MockMode::Error("offline".to_string()));
        let result = run_job(&context, &Job::PushToTranslation { slug: "about".to_string() }).await;
        assert!(matches!(
            result,
            Err(DispatchError::Service(ServiceError::Other(_)))
        ));
    }

    #[tokio::test]
    async fn test_queue_runs_delayed_job() {
        let (context, _, tracker) = context(MockMode::Echo);
        let queue = JobQueue::new(Arc::new(context));

        let handle = queue.enqueue_after(
            Job::TransitionTicket {
                slug: "about".to_string(),
                project: "website".to_string(),
            },
            Duration::from_millis(20),
        );
        handle.await.unwrap().unwrap();
        assert_eq!(
            tracker.calls(),
            vec![("about".to_string(), "website".to_string())]
        );
    }

    #[tokio::test]
    async fn test_snapshot_written_after_promotion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.json");
        let (mut context, _, _) = context(MockMode::Echo);
        context.config.snapshot_path = Some(path.clone());

        run_job(
            &context,
            &Job::PromotePage {
                slug: "about".to_string(),
                publish: true,
                user: None,
                languages: None,
            },
        )
        .await
        .unwrap();

        let saved = ContentTree::load_json(&path).unwrap();
        assert!(resolve_page(&saved, "production", "about").is_ok());
    }
}
