//! Plugin tree walker
//!
//! Walks a page's placeholders and yields one [`TextUnit`] per plugin
//! instance in a language, in path order. Walking is lazy and holds no
//! state between calls, so walking again reflects the current tree.

use crate::content::{ContentTree, PageId, Plugin, PluginId};

/// One translatable unit of a page, with the structural metadata needed to
/// find its counterpart in another language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    pub id: PluginId,
    /// Slot name of the placeholder holding the plugin
    pub slot: String,
    pub position: u32,
    pub plugin_type: String,
    pub parent: Option<PluginId>,
    pub text: String,
}

impl TextUnit {
    fn from_plugin(slot: &str, plugin: &Plugin) -> Self {
        Self {
            id: plugin.id,
            slot: slot.to_string(),
            position: plugin.position,
            plugin_type: plugin.plugin_type.clone(),
            parent: plugin.parent,
            text: plugin.text_value().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PluginWalker<'a> {
    tree: &'a ContentTree,
    page: PageId,
    language: &'a str,
}

impl<'a> PluginWalker<'a> {
    pub fn new(tree: &'a ContentTree, page: PageId, language: &'a str) -> Self {
        Self {
            tree,
            page,
            language,
        }
    }

    /// Units grouped by placeholder, in placeholder order.
    ///
    /// A page that does not exist or has no placeholders yields nothing.
    pub fn placeholders(self) -> impl Iterator<Item = (&'a str, Vec<TextUnit>)> + 'a {
        let tree = self.tree;
        let language = self.language;
        tree.placeholders(self.page)
            .unwrap_or(&[])
            .iter()
            .filter_map(move |id| tree.placeholder(*id).ok())
            .map(move |placeholder| {
                let units = tree
                    .plugins(placeholder.id, language)
                    .into_iter()
                    .map(|plugin| TextUnit::from_plugin(&placeholder.slot, plugin))
                    .collect();
                (placeholder.slot.as_str(), units)
            })
    }

    /// Every unit of the page, placeholder by placeholder
    pub fn units(self) -> impl Iterator<Item = TextUnit> + 'a {
        self.placeholders().flat_map(|(_, units)| units)
    }
}
