//! Core data types of the content tree
//!
//! Pages own titles (one per language) and placeholders; placeholders own
//! plugin instances. A plugin may point at a parent plugin in the same
//! placeholder and language, which gives each placeholder a forest of
//! nested content per language.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The language every translation round-trip starts from
pub const SOURCE_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlaceholderId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginId(pub u64);

impl std::fmt::Display for PluginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-language title record of a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub title: String,
    pub slug: String,
    /// Meta title shown in the browser, may be empty
    #[serde(default)]
    pub page_title: String,
}

impl Title {
    pub fn new(title: &str, slug: &str) -> Self {
        Self {
            title: title.to_string(),
            slug: slug.to_string(),
            page_title: String::new(),
        }
    }
}

/// Whether a page is the editable draft or the published copy of one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublisherState {
    Draft { public: Option<PageId> },
    Public { draft: PageId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub parent: Option<PageId>,
    pub titles: BTreeMap<String, Title>,
    pub placeholders: Vec<PlaceholderId>,
    pub publisher: PublisherState,
    #[serde(default)]
    pub published_languages: BTreeSet<String>,
    #[serde(default)]
    pub publication_date: Option<chrono::DateTime<chrono::Utc>>,
}

impl Page {
    pub fn is_draft(&self) -> bool {
        matches!(self.publisher, PublisherState::Draft { .. })
    }
}

/// Named content slot of a page. The slot name is what ties placeholders
/// together across languages and across copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    pub id: PlaceholderId,
    pub page: PageId,
    pub slot: String,
}

/// Which field of a plugin type carries its translatable text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TextFieldKind {
    Body,
    Title,
    Name,
}

impl TextFieldKind {
    /// Lookup order used when a plugin type declares several candidates
    pub const PRIORITY: [TextFieldKind; 3] =
        [TextFieldKind::Body, TextFieldKind::Title, TextFieldKind::Name];

    pub fn field_name(&self) -> &'static str {
        match self {
            TextFieldKind::Body => "body",
            TextFieldKind::Title => "title",
            TextFieldKind::Name => "name",
        }
    }

    /// Pick the text field of a plugin type from the names of its fields.
    ///
    /// `body` wins over `title`, which wins over `name`. Types with none of
    /// the three have no translatable text.
    ///
    /// ```ignore
    /// assert_eq!(TextFieldKind::resolve(&["url", "name"]), Some(TextFieldKind::Name));
    /// assert_eq!(TextFieldKind::resolve(&["title", "body"]), Some(TextFieldKind::Body));
    /// ```
    pub fn resolve(field_names: &[&str]) -> Option<TextFieldKind> {
        Self::PRIORITY
            .into_iter()
            .find(|kind| field_names.contains(&kind.field_name()))
    }
}

/// Translatable text of a plugin instance, tagged with the field it lives in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextField {
    pub kind: TextFieldKind,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plugin {
    pub id: PluginId,
    pub placeholder: PlaceholderId,
    pub language: String,
    pub parent: Option<PluginId>,
    /// Ordinal among siblings sharing the same parent, starting at 0
    pub position: u32,
    /// Materialized path; ascending order is depth-first pre-order
    pub path: String,
    pub plugin_type: String,
    pub text: Option<TextField>,
}

impl Plugin {
    /// Text of the plugin's declared text field, empty when it has none
    pub fn text_value(&self) -> &str {
        self.text.as_ref().map(|t| t.value.as_str()).unwrap_or("")
    }
}

/// Registry of plugin types and the text field each one declares.
///
/// The field is resolved once, when the type is registered, instead of being
/// probed on every instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginTypes(BTreeMap<String, Option<TextFieldKind>>);

impl PluginTypes {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Register a type with an explicit text field
    pub fn register(&mut self, name: &str, kind: Option<TextFieldKind>) -> &mut Self {
        self.0.insert(name.to_string(), kind);
        self
    }

    /// Register a type from the list of its field names
    pub fn register_fields(&mut self, name: &str, field_names: &[&str]) -> &mut Self {
        self.register(name, TextFieldKind::resolve(field_names))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// `None` for unknown types, `Some(None)` for types without text
    pub fn text_field(&self, name: &str) -> Option<Option<TextFieldKind>> {
        self.0.get(name).copied()
    }
}

/// Width of one materialized-path step
const PATH_STEP_WIDTH: usize = 4;
const PATH_ALPHABET: &[u8; 36] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Siblings one parent can hold before a path step runs out of digits
pub const MAX_SIBLINGS: u32 = 36u32.pow(PATH_STEP_WIDTH as u32) - 1;

/// Encode a sibling position as one path step (base 36, 1-based).
/// `None` once the position no longer fits in a step.
pub(crate) fn path_step(position: u32) -> Option<String> {
    if position >= MAX_SIBLINGS {
        return None;
    }
    let mut value = position as u64 + 1;
    let mut step = vec![b'0'; PATH_STEP_WIDTH];
    for slot in step.iter_mut().rev() {
        *slot = PATH_ALPHABET[(value % 36) as usize];
        value /= 36;
    }
    Some(String::from_utf8_lossy(&step).into_owned())
}
