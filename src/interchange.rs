//! Interchange document
//!
//! Renders the English text units of a page into the markup document that
//! travels through the translation service, and reads a returned document
//! back into [`TranslationRecord`]s.
//!
//! # Format
//!
//! ```text
//! <html><body><div class='title'>About us</div><div data-id="12"
//!     data-position="0"
//!     data-type="TextPlugin"
//!     data-parent=""><p>Caf&#233; menu</p></div>
//! ...
//! </body></html>
//! ```
//!
//! Unit text is rich text and is not markup-escaped. Only non-ASCII
//! characters become numeric character references, and `&#160;` is
//! normalized to a plain space afterwards.

use crate::content::{ContentTree, PageId, PluginId, SOURCE_LANGUAGE};
use crate::error::{ContentError, ContentResult, InterchangeError, InterchangeResult};
use crate::walker::{PluginWalker, TextUnit};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static DIV_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div\b([^>]*)>").expect("valid div pattern"));
static DIV_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<div\b[^>]*>|</div\s*>").expect("valid tag pattern"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([\w-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attribute pattern")
});
static CHAR_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));").expect("valid reference pattern")
});

/// Text unit as returned by the translation round-trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRecord {
    pub id: Option<PluginId>,
    pub parent: Option<PluginId>,
    pub position: u32,
    pub plugin_type: String,
    pub translated: String,
}

impl TranslationRecord {
    pub fn new(position: u32, plugin_type: &str, translated: &str) -> Self {
        Self {
            id: None,
            parent: None,
            position,
            plugin_type: plugin_type.to_string(),
            translated: translated.to_string(),
        }
    }
}

/// Snapshot of a page's English text, ready to be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterchangeDocument {
    pub title: String,
    pub units: Vec<TextUnit>,
}

impl InterchangeDocument {
    /// Collect the English units of `page`.
    ///
    /// Units follow placeholder order, and within a placeholder are sorted by
    /// position (stable over path order). The title is the English meta
    /// title, or the English title when no meta title is set.
    pub fn from_page(tree: &ContentTree, page: PageId) -> ContentResult<Self> {
        tree.page(page)?;
        let title = tree
            .title(page, SOURCE_LANGUAGE)
            .ok_or_else(|| ContentError::MissingTitle {
                page: page.0,
                language: SOURCE_LANGUAGE.to_string(),
            })?;
        let title = if title.page_title.is_empty() {
            title.title.clone()
        } else {
            title.page_title.clone()
        };

        let units = PluginWalker::new(tree, page, SOURCE_LANGUAGE)
            .placeholders()
            .flat_map(|(_, mut units)| {
                units.sort_by_key(|unit| unit.position);
                units
            })
            .collect();

        Ok(Self { title, units })
    }

    pub fn render(&self) -> String {
        let units = self
            .units
            .iter()
            .map(|unit| {
                format!(
                    "<div data-id=\"{}\"\n    data-position=\"{}\"\n    data-type=\"{}\"\n    data-parent=\"{}\">{}</div>",
                    unit.id,
                    unit.position,
                    unit.plugin_type,
                    unit.parent.map(|p| p.to_string()).unwrap_or_default(),
                    escape_text(&unit.text)
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "<html><body><div class='title'>{}</div>{}</body></html>",
            escape_text(&self.title),
            units
        )
    }
}

/// Replace non-ASCII characters with numeric character references, then
/// turn `&#160;` into a plain space
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            escaped.push_str(&format!("&#{};", c as u32));
        }
    }
    escaped.replace("&#160;", " ")
}

/// Decode decimal and hexadecimal numeric character references.
/// Named entities are left untouched.
pub fn decode_char_refs(text: &str) -> String {
    CHAR_REF
        .replace_all(text, |caps: &regex::Captures| {
            let code = match (caps.get(1), caps.get(2)) {
                (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
                (None, Some(dec)) => dec.as_str().parse::<u32>().ok(),
                _ => None,
            };
            code.and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Translated document read back from the translation service
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDocument {
    pub title: Option<String>,
    pub records: Vec<TranslationRecord>,
}

/// Parse a returned interchange document.
///
/// Any `<div>` carrying `data-position` and `data-type` is a unit; its
/// content runs up to the balancing `</div>`, so units may contain nested
/// markup. Attribute order and quoting do not matter.
pub fn parse_document(html: &str) -> InterchangeResult<ParsedDocument> {
    let mut parsed = ParsedDocument::default();
    let mut cursor = 0;

    while let Some(open) = DIV_OPEN.captures_at(html, cursor) {
        let Some(tag) = open.get(0) else { break };
        let attributes = parse_attributes(open.get(1).map_or("", |m| m.as_str()));
        let is_title = attributes
            .get("class")
            .is_some_and(|class| class.split_whitespace().any(|c| c == "title"));
        let is_unit =
            attributes.contains_key("data-position") && attributes.contains_key("data-type");

        if !is_title && !is_unit {
            cursor = tag.end();
            continue;
        }

        let index = parsed.records.len();
        let (inner_end, close_end) =
            balanced_close(html, tag.end()).ok_or(InterchangeError::Unterminated { index })?;
        let content = decode_char_refs(&html[tag.end()..inner_end]);

        if is_unit {
            parsed
                .records
                .push(record_from_attributes(&attributes, content, index)?);
        } else {
            parsed.title = Some(content);
        }
        cursor = close_end;
    }

    Ok(parsed)
}

fn parse_attributes(raw: &str) -> HashMap<String, String> {
    ATTRIBUTE
        .captures_iter(raw)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().to_lowercase();
            let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
            Some((name, value))
        })
        .collect()
}

/// Find the `</div>` closing a div whose content starts at `start`.
/// Returns the content end and the end of the closing tag.
fn balanced_close(html: &str, start: usize) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    for tag in DIV_TAG.find_iter(&html[start..]) {
        if tag.as_str().starts_with("</") {
            if depth == 0 {
                return Some((start + tag.start(), start + tag.end()));
            }
            depth -= 1;
        } else {
            depth += 1;
        }
    }
    None
}

fn record_from_attributes(
    attributes: &HashMap<String, String>,
    translated: String,
    index: usize,
) -> InterchangeResult<TranslationRecord> {
    let raw_position = attributes
        .get("data-position")
        .map(|v| v.trim())
        .unwrap_or_default();
    let position = raw_position
        .parse::<u32>()
        .map_err(|_| InterchangeError::InvalidAttribute {
            index,
            attribute: "data-position",
            value: raw_position.to_string(),
        })?;

    Ok(TranslationRecord {
        id: optional_id(attributes, "data-id", index)?,
        parent: optional_id(attributes, "data-parent", index)?,
        position,
        plugin_type: attributes
            .get("data-type")
            .map(|t| t.trim().to_string())
            .unwrap_or_default(),
        translated,
    })
}

fn optional_id(
    attributes: &HashMap<String, String>,
    attribute: &'static str,
    index: usize,
) -> InterchangeResult<Option<PluginId>> {
    match attributes.get(attribute).map(|v| v.trim()) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u64>()
            .map(|id| Some(PluginId(id)))
            .map_err(|_| InterchangeError::InvalidAttribute {
                index,
                attribute,
                value: value.to_string(),
            }),
    }
}
