//! Webhook dispatcher
//!
//! Turns inbound events into jobs. Issue tracker events carry a page
//! address such as `/en/staging/about/team/`; only addresses inside the
//! staging tree are acted on, and the last segment names the page.
//! Translation callbacks name a resource, from which the page slug is
//! derived.
//!
//! Every entry point returns as soon as its jobs are scheduled, except
//! [`Dispatcher::copy_from_production`] and [`Dispatcher::render_blank`],
//! which work synchronously.

use crate::content::SOURCE_LANGUAGE;
use crate::duplicator::{DuplicateOptions, DuplicationReport};
use crate::error::{DispatchError, DispatchResult};
use crate::interchange::InterchangeDocument;
use crate::jobs::{Job, JobQueue, SyncContext, resolve_page};
use crate::tms::slug_from_resource;
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Tree root and target slug taken from a page address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageAddress {
    pub root: String,
    pub slug: String,
}

impl PageAddress {
    /// Drop the first two `/`-separated segments and the last one, then
    /// take the first remaining segment as the root and the last as the slug
    pub fn parse(address: &str) -> Option<Self> {
        let segments: Vec<&str> = address.split('/').collect();
        if segments.len() < 4 {
            return None;
        }
        let inner = &segments[2..segments.len() - 1];
        Some(Self {
            root: inner.first()?.to_string(),
            slug: inner.last()?.to_string(),
        })
    }
}

/// Form fields posted by the translation service once a language is done
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TranslationCallback {
    pub resource: String,
    pub language: String,
    pub project: String,
}

/// Jobs handed to the queue by one dispatcher call
#[derive(Debug, Default)]
pub struct Scheduled {
    pub jobs: Vec<(Job, Duration)>,
    handles: Vec<JoinHandle<DispatchResult<()>>>,
}

impl Scheduled {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Wait for every job and collect the results in scheduling order
    pub async fn join(self) -> Vec<DispatchResult<()>> {
        let mut results = Vec::with_capacity(self.handles.len());
        for handle in self.handles {
            results.push(match handle.await {
                Ok(result) => result,
                Err(e) => Err(DispatchError::Aborted(e.to_string())),
            });
        }
        results
    }
}

/// Interchange document served for a page, with its HTTP date
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlankDocument {
    pub html: String,
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    queue: JobQueue,
}

impl Dispatcher {
    pub fn new(context: Arc<SyncContext>) -> Self {
        Self {
            queue: JobQueue::new(context),
        }
    }

    pub fn context(&self) -> &Arc<SyncContext> {
        self.queue.context()
    }

    fn schedule(&self, scheduled: &mut Scheduled, job: Job, delay: Duration) {
        scheduled
            .handles
            .push(self.queue.enqueue_after(job.clone(), delay));
        scheduled.jobs.push((job, delay));
    }

    fn jitter(&self) -> Duration {
        let (min, max) = self.context().config.import_jitter_secs;
        Duration::from_secs(rand::rng().random_range(min..=max))
    }

    /// Extract the staging slug an issue event refers to. `None` when the
    /// body is empty or the page lives outside the staging tree.
    fn staging_slug(&self, body: &[u8]) -> DispatchResult<Option<String>> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let issue: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| DispatchError::InvalidPayload(format!("issue is not JSON: {}", e)))?;

        let field = &self.context().config.page_address_field;
        let address = issue["issue"]["fields"][field.as_str()]
            .as_str()
            .ok_or_else(|| {
                DispatchError::InvalidPayload(format!("issue.fields.{} is missing", field))
            })?;
        let address = PageAddress::parse(address).ok_or_else(|| {
            DispatchError::InvalidPayload(format!("'{}' is not a page address", address))
        })?;

        if address.root != self.context().config.staging_root {
            debug!("Ignoring event for page outside staging: {:?}", address);
            return Ok(None);
        }
        Ok(Some(address.slug))
    }

    /// Validation event: promote the English version and send the page out
    /// for translation
    pub async fn validate_page(&self, body: &[u8]) -> DispatchResult<Scheduled> {
        let Some(slug) = self.staging_slug(body)? else {
            return Ok(Scheduled::default());
        };
        {
            let tree = self.context().tree.lock().await;
            resolve_page(&tree, &self.context().config.staging_root, &slug)?;
        }

        let mut scheduled = Scheduled::default();
        self.schedule(
            &mut scheduled,
            Job::PromotePage {
                slug: slug.clone(),
                publish: true,
                user: None,
                languages: Some(vec![SOURCE_LANGUAGE.to_string()]),
            },
            Duration::ZERO,
        );
        self.schedule(&mut scheduled, Job::PushToTranslation { slug }, Duration::ZERO);
        Ok(scheduled)
    }

    /// Completion event: promote and publish every language
    pub async fn complete_page(&self, body: &[u8]) -> DispatchResult<Scheduled> {
        let mut scheduled = Scheduled::default();
        if let Some(slug) = self.staging_slug(body)? {
            self.schedule(
                &mut scheduled,
                Job::PromotePage {
                    slug,
                    publish: true,
                    user: None,
                    languages: None,
                },
                Duration::ZERO,
            );
        }
        Ok(scheduled)
    }

    pub async fn push_to_translation(&self, slug: &str) -> DispatchResult<Scheduled> {
        {
            let tree = self.context().tree.lock().await;
            resolve_page(&tree, &self.context().config.staging_root, slug)?;
        }
        let mut scheduled = Scheduled::default();
        self.schedule(
            &mut scheduled,
            Job::PushToTranslation {
                slug: slug.to_string(),
            },
            Duration::ZERO,
        );
        Ok(scheduled)
    }

    /// Import one language; `language` is a site code
    pub async fn pull_from_translation(
        &self,
        slug: &str,
        language: &str,
    ) -> DispatchResult<Scheduled> {
        {
            let tree = self.context().tree.lock().await;
            resolve_page(&tree, &self.context().config.staging_root, slug)?;
        }
        let context = self.context();
        let mut scheduled = Scheduled::default();
        self.schedule(
            &mut scheduled,
            Job::PullTranslation {
                slug: slug.to_string(),
                language: context.shim().to_service(&language.to_lowercase()),
                project: context.config.translation_project.clone(),
            },
            Duration::ZERO,
        );
        Ok(scheduled)
    }

    /// Translation service callback: import after a random delay, and move
    /// the ticket on after another
    pub fn receive_translation(&self, callback: &TranslationCallback) -> Scheduled {
        let slug = slug_from_resource(&callback.resource);
        let language = callback.language.to_lowercase();
        let project = callback.project.to_lowercase();
        info!(
            "Translation of '{}' into {} completed in {}",
            slug, language, project
        );

        let mut scheduled = Scheduled::default();
        self.schedule(
            &mut scheduled,
            Job::PullTranslation {
                slug: slug.clone(),
                language,
                project: project.clone(),
            },
            self.jitter(),
        );
        self.schedule(
            &mut scheduled,
            Job::TransitionTicket { slug, project },
            self.jitter(),
        );
        scheduled
    }

    /// Overwrite the staging page with its production twin and publish it
    pub async fn copy_from_production(
        &self,
        slug: &str,
        user: Option<&str>,
    ) -> DispatchResult<DuplicationReport> {
        let context = self.context();
        let mut tree = context.tree.lock().await;
        let staging = resolve_page(&tree, &context.config.staging_root, slug)?;
        let production = resolve_page(&tree, &context.config.production_root, slug)?;

        let options = DuplicateOptions {
            publish: true,
            user: user.map(str::to_string),
            languages: None,
        };
        let report = context
            .duplicator()
            .duplicate(&mut tree, production, staging, &options)?;
        context.save_snapshot(&tree)?;
        Ok(report)
    }

    /// Queue a promotion of the staging page without publishing it
    pub async fn promote_to_production(
        &self,
        slug: &str,
        user: Option<&str>,
    ) -> DispatchResult<Scheduled> {
        {
            let tree = self.context().tree.lock().await;
            resolve_page(&tree, &self.context().config.staging_root, slug)?;
        }
        let mut scheduled = Scheduled::default();
        self.schedule(
            &mut scheduled,
            Job::PromotePage {
                slug: slug.to_string(),
                publish: false,
                user: user.map(str::to_string),
                languages: None,
            },
            Duration::ZERO,
        );
        Ok(scheduled)
    }

    /// Interchange document of the staging page's published version
    pub async fn render_blank(&self, slug: &str) -> DispatchResult<BlankDocument> {
        let context = self.context();
        let tree = context.tree.lock().await;
        let page = resolve_page(&tree, &context.config.staging_root, slug)?;
        let public = tree.public_object(page)?.unwrap_or(page);

        let html = InterchangeDocument::from_page(&tree, public)?.render();
        let last_modified = tree
            .page(public)?
            .publication_date
            .map(|date| date.format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        Ok(BlankDocument {
            html,
            last_modified,
        })
    }
}
