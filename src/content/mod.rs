//! Content tree: pages, per-language titles, placeholders and plugin instances
pub mod model;
pub mod tree;

pub use model::{
    MAX_SIBLINGS, Page, PageId, Placeholder, PlaceholderId, Plugin, PluginId, PluginTypes,
    PublisherState, SOURCE_LANGUAGE, TextField, TextFieldKind, Title,
};
pub use tree::ContentTree;
