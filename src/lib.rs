//! Page duplication and translation round-trip for a CMS content tree.
//!
//! A site keeps two top-level trees, `staging` and `production`. Editors
//! work in staging; issue tracker events promote a page to production and
//! send its English text out to a translation service, and the service's
//! callbacks bring each language back into the page.
//!
//! The pieces, bottom up:
//!
//! - [`content`]: the page / placeholder / plugin arena and its storage operations
//! - [`walker`]: lazy enumeration of a page's text units
//! - [`interchange`]: the document sent to and returned by translators
//! - [`reinjector`]: writes returned translations into a language
//! - [`duplicator`]: copies one page onto another across languages
//! - [`tms`] and [`tracker`]: translation service and issue tracker clients
//! - [`jobs`] and [`dispatcher`]: background jobs and the webhook entry points

pub mod config;
pub mod content;
pub mod dispatcher;
pub mod duplicator;
pub mod error;
pub mod interchange;
pub mod jobs;
pub mod reinjector;
pub mod tms;
pub mod tracker;
pub mod walker;

pub use config::{Language, SyncConfig};
pub use content::{
    ContentTree, Page, PageId, Placeholder, PlaceholderId, Plugin, PluginId, PluginTypes,
    SOURCE_LANGUAGE, TextFieldKind, Title,
};
pub use dispatcher::{BlankDocument, Dispatcher, PageAddress, Scheduled, TranslationCallback};
pub use duplicator::{
    DuplicateOptions, DuplicationReport, LanguageOutcome, PageDuplicator, Publisher,
    TreePublisher,
};
pub use error::{
    ConfigError, ContentError, ContentResult, DispatchError, DispatchResult, InterchangeError,
    ServiceError, ServiceResult,
};
pub use interchange::{InterchangeDocument, ParsedDocument, TranslationRecord, parse_document};
pub use jobs::{Job, JobQueue, SyncContext, apply_page_title, promote_page, resolve_page};
pub use reinjector::{ReinjectionReport, translate_page};
pub use tms::{LanguageShim, MockMode, MockTranslationService, TransifexClient, TranslationService};
pub use tracker::{IssueTracker, JiraClient, MockTracker};
pub use walker::{PluginWalker, TextUnit};

#[cfg(test)]
mod integration_tests;
