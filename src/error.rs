//! Error types for page-sync
//!
//! Each concern gets its own enum and a `*Result<T>` alias. `DispatchError`
//! sits at the top and wraps the others so the web layer can map a single
//! type onto HTTP status codes.

use thiserror::Error;

/// Errors raised by the content tree and the operations that mutate it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("page {0} does not exist")]
    UnknownPage(usize),

    #[error("placeholder {0} does not exist")]
    UnknownPlaceholder(usize),

    #[error("plugin {0} does not exist")]
    UnknownPlugin(u64),

    #[error("plugin type '{0}' is not registered")]
    UnknownPluginType(String),

    #[error("page {page} has no title in '{language}'")]
    MissingTitle { page: usize, language: String },

    #[error("page {page} already has a title in '{language}'")]
    DuplicateTitle { page: usize, language: String },

    #[error("page {0} is not a draft page")]
    NotDraft(usize),

    #[error("parent plugin {parent} belongs to another placeholder or language")]
    ForeignParent { parent: u64 },

    #[error("placeholder {placeholder} cannot hold more than {limit} siblings")]
    TooManySiblings { placeholder: usize, limit: u32 },

    #[error("publishing '{language}' failed: {reason}")]
    PublishFailed { language: String, reason: String },

    #[error("snapshot error: {0}")]
    Snapshot(String),
}

/// Errors raised while reading a returned interchange document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterchangeError {
    #[error("unit {index}: unterminated <div>")]
    Unterminated { index: usize },

    #[error("unit {index}: invalid {attribute} '{value}'")]
    InvalidAttribute {
        index: usize,
        attribute: &'static str,
        value: String,
    },
}

/// Errors raised by the translation service and issue tracker clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{service} responded {status}: {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Network(err.to_string())
    }
}

/// Errors raised while loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid setting {key}: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Errors surfaced by the dispatcher and the jobs it schedules
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The tree root or the target slug does not resolve to a page
    #[error("no page found for '{0}'")]
    NotFound(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error(transparent)]
    Interchange(#[from] InterchangeError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A scheduled job panicked or was cancelled
    #[error("job did not complete: {0}")]
    Aborted(String),
}

pub type ContentResult<T> = Result<T, ContentError>;
pub type InterchangeResult<T> = Result<T, InterchangeError>;
pub type ServiceResult<T> = Result<T, ServiceError>;
pub type DispatchResult<T> = Result<T, DispatchError>;
