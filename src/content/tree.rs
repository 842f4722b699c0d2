//! Materialized content tree
//!
//! `ContentTree` is an arena holding every page, placeholder and plugin
//! instance of a site. The walker, the re-injector and the duplicator all
//! work on it by reference, so none of them knows how the tree is stored.
//! Snapshots are plain JSON.

use super::model::{
    MAX_SIBLINGS, Page, PageId, Placeholder, PlaceholderId, Plugin, PluginId, PluginTypes,
    PublisherState, SOURCE_LANGUAGE, TextField, Title, path_step,
};
use crate::error::{ContentError, ContentResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentTree {
    pages: Vec<Page>,
    placeholders: Vec<Placeholder>,
    plugins: BTreeMap<u64, Plugin>,
    #[serde(default)]
    plugin_types: PluginTypes,
    #[serde(default)]
    next_plugin_id: u64,
}

impl ContentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugin_types(plugin_types: PluginTypes) -> Self {
        Self {
            plugin_types,
            ..Self::default()
        }
    }

    pub fn plugin_types(&self) -> &PluginTypes {
        &self.plugin_types
    }

    pub fn plugin_types_mut(&mut self) -> &mut PluginTypes {
        &mut self.plugin_types
    }

    // ========== Pages ==========

    /// Create a draft page with a single title
    pub fn add_page(
        &mut self,
        parent: Option<PageId>,
        language: &str,
        title: &str,
        slug: &str,
    ) -> ContentResult<PageId> {
        if let Some(parent) = parent {
            self.page(parent)?;
        }
        let id = PageId(self.pages.len());
        let mut titles = BTreeMap::new();
        titles.insert(language.to_string(), Title::new(title, slug));
        self.pages.push(Page {
            id,
            parent,
            titles,
            placeholders: Vec::new(),
            publisher: PublisherState::Draft { public: None },
            published_languages: Default::default(),
            publication_date: None,
        });
        Ok(id)
    }

    pub fn page(&self, id: PageId) -> ContentResult<&Page> {
        self.pages.get(id.0).ok_or(ContentError::UnknownPage(id.0))
    }

    fn page_mut(&mut self, id: PageId) -> ContentResult<&mut Page> {
        self.pages.get_mut(id.0).ok_or(ContentError::UnknownPage(id.0))
    }

    pub fn children(&self, id: PageId) -> Vec<PageId> {
        self.pages
            .iter()
            .filter(|p| p.parent == Some(id))
            .map(|p| p.id)
            .collect()
    }

    /// All pages below `id`, depth first
    pub fn descendants(&self, id: PageId) -> Vec<PageId> {
        let mut result = Vec::new();
        let mut stack = self.children(id);
        stack.reverse();
        while let Some(next) = stack.pop() {
            result.push(next);
            let mut children = self.children(next);
            children.reverse();
            stack.extend(children);
        }
        result
    }

    /// Top-level draft page whose English slug is `slug`
    pub fn find_root(&self, slug: &str) -> Option<PageId> {
        self.pages
            .iter()
            .filter(|p| p.is_draft() && p.parent.is_none())
            .find(|p| {
                p.titles
                    .get(SOURCE_LANGUAGE)
                    .is_some_and(|t| t.slug == slug)
            })
            .map(|p| p.id)
    }

    /// First draft page below `root` whose title in `language` has `slug`
    pub fn find_descendant(&self, root: PageId, language: &str, slug: &str) -> Option<PageId> {
        self.descendants(root).into_iter().find(|id| {
            self.pages[id.0].is_draft()
                && self.pages[id.0]
                    .titles
                    .get(language)
                    .is_some_and(|t| t.slug == slug)
        })
    }

    /// Published copy of a page, if it was ever published
    pub fn public_object(&self, id: PageId) -> ContentResult<Option<PageId>> {
        Ok(match self.page(id)?.publisher {
            PublisherState::Draft { public } => public,
            PublisherState::Public { .. } => Some(id),
        })
    }

    /// Editable copy of a page
    pub fn draft_object(&self, id: PageId) -> ContentResult<PageId> {
        Ok(match self.page(id)?.publisher {
            PublisherState::Draft { .. } => id,
            PublisherState::Public { draft } => draft,
        })
    }

    // ========== Titles ==========

    pub fn title(&self, page: PageId, language: &str) -> Option<&Title> {
        self.pages.get(page.0)?.titles.get(language)
    }

    pub fn title_languages(&self, page: PageId) -> ContentResult<Vec<String>> {
        Ok(self.page(page)?.titles.keys().cloned().collect())
    }

    pub fn create_title(
        &mut self,
        page: PageId,
        language: &str,
        title: &str,
        slug: &str,
    ) -> ContentResult<()> {
        let entry = self.page_mut(page)?;
        if entry.titles.contains_key(language) {
            return Err(ContentError::DuplicateTitle {
                page: page.0,
                language: language.to_string(),
            });
        }
        entry
            .titles
            .insert(language.to_string(), Title::new(title, slug));
        Ok(())
    }

    /// Apply `update` to an existing title record and store it
    pub fn update_title(
        &mut self,
        page: PageId,
        language: &str,
        update: impl FnOnce(&mut Title),
    ) -> ContentResult<()> {
        let title = self
            .page_mut(page)?
            .titles
            .get_mut(language)
            .ok_or_else(|| ContentError::MissingTitle {
                page: page.0,
                language: language.to_string(),
            })?;
        update(title);
        Ok(())
    }

    // ========== Placeholders ==========

    pub fn add_placeholder(&mut self, page: PageId, slot: &str) -> ContentResult<PlaceholderId> {
        let id = PlaceholderId(self.placeholders.len());
        self.page_mut(page)?.placeholders.push(id);
        self.placeholders.push(Placeholder {
            id,
            page,
            slot: slot.to_string(),
        });
        Ok(id)
    }

    pub fn placeholder(&self, id: PlaceholderId) -> ContentResult<&Placeholder> {
        self.placeholders
            .get(id.0)
            .ok_or(ContentError::UnknownPlaceholder(id.0))
    }

    pub fn placeholders(&self, page: PageId) -> ContentResult<&[PlaceholderId]> {
        Ok(&self.page(page)?.placeholders)
    }

    pub fn placeholder_by_slot(&self, page: PageId, slot: &str) -> Option<PlaceholderId> {
        self.pages
            .get(page.0)?
            .placeholders
            .iter()
            .copied()
            .find(|id| self.placeholders[id.0].slot == slot)
    }

    pub fn slots(&self, page: PageId) -> ContentResult<Vec<String>> {
        Ok(self
            .placeholders(page)?
            .iter()
            .map(|id| self.placeholders[id.0].slot.clone())
            .collect())
    }

    // ========== Plugins ==========

    /// Append a plugin as the last child of `parent` (or as the last
    /// top-level plugin) in one placeholder and language
    pub fn add_plugin(
        &mut self,
        placeholder: PlaceholderId,
        language: &str,
        parent: Option<PluginId>,
        plugin_type: &str,
        text: &str,
    ) -> ContentResult<PluginId> {
        let kind = self
            .plugin_types
            .text_field(plugin_type)
            .ok_or_else(|| ContentError::UnknownPluginType(plugin_type.to_string()))?;
        let text = kind.map(|kind| TextField {
            kind,
            value: text.to_string(),
        });
        self.insert_plugin(placeholder, language, parent, plugin_type, text)
    }

    fn insert_plugin(
        &mut self,
        placeholder: PlaceholderId,
        language: &str,
        parent: Option<PluginId>,
        plugin_type: &str,
        text: Option<TextField>,
    ) -> ContentResult<PluginId> {
        self.placeholder(placeholder)?;
        let parent_path = match parent {
            Some(parent_id) => {
                let parent_plugin = self.plugin(parent_id)?;
                if parent_plugin.placeholder != placeholder || parent_plugin.language != language {
                    return Err(ContentError::ForeignParent {
                        parent: parent_id.0,
                    });
                }
                parent_plugin.path.clone()
            }
            None => String::new(),
        };
        let position = self
            .plugins
            .values()
            .filter(|p| {
                p.placeholder == placeholder && p.language == language && p.parent == parent
            })
            .count() as u32;

        let step = path_step(position).ok_or(ContentError::TooManySiblings {
            placeholder: placeholder.0,
            limit: MAX_SIBLINGS,
        })?;

        self.next_plugin_id += 1;
        let id = PluginId(self.next_plugin_id);
        self.plugins.insert(
            id.0,
            Plugin {
                id,
                placeholder,
                language: language.to_string(),
                parent,
                position,
                path: format!("{}{}", parent_path, step),
                plugin_type: plugin_type.to_string(),
                text,
            },
        );
        Ok(id)
    }

    pub fn plugin(&self, id: PluginId) -> ContentResult<&Plugin> {
        self.plugins
            .get(&id.0)
            .ok_or(ContentError::UnknownPlugin(id.0))
    }

    /// Plugins of one placeholder and language, ordered by path
    pub fn plugins(&self, placeholder: PlaceholderId, language: &str) -> Vec<&Plugin> {
        let mut plugins: Vec<&Plugin> = self
            .plugins
            .values()
            .filter(|p| p.placeholder == placeholder && p.language == language)
            .collect();
        plugins.sort_by(|a, b| a.path.cmp(&b.path));
        plugins
    }

    /// Overwrite the text field of a plugin.
    ///
    /// Returns `false` when the plugin's type has no text field.
    pub fn set_text(&mut self, id: PluginId, text: &str) -> ContentResult<bool> {
        let plugin = self
            .plugins
            .get_mut(&id.0)
            .ok_or(ContentError::UnknownPlugin(id.0))?;
        match plugin.text.as_mut() {
            Some(field) => {
                field.value = text.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove the plugins of a placeholder, in one language or in all of them
    pub fn clear(&mut self, placeholder: PlaceholderId, language: Option<&str>) -> usize {
        let before = self.plugins.len();
        self.plugins.retain(|_, p| {
            p.placeholder != placeholder || language.is_some_and(|lang| p.language != lang)
        });
        before - self.plugins.len()
    }

    /// Copy plugins into `target` under `language`, keeping types, text,
    /// nesting and relative order. Plugins whose parent is not part of the
    /// copied set become top-level plugins.
    pub fn copy_plugins_to(
        &mut self,
        plugins: &[PluginId],
        target: PlaceholderId,
        language: &str,
    ) -> ContentResult<Vec<PluginId>> {
        let mut sources = plugins
            .iter()
            .map(|id| self.plugin(*id).cloned())
            .collect::<ContentResult<Vec<Plugin>>>()?;
        sources.sort_by(|a, b| a.path.cmp(&b.path));

        let mut mapping: HashMap<PluginId, PluginId> = HashMap::new();
        let mut copied = Vec::with_capacity(sources.len());
        for source in sources {
            let parent = source.parent.and_then(|p| mapping.get(&p).copied());
            let id =
                self.insert_plugin(target, language, parent, &source.plugin_type, source.text)?;
            mapping.insert(source.id, id);
            copied.push(id);
        }
        Ok(copied)
    }

    /// Copy every placeholder's `source_language` plugins into
    /// `target_language` on the same page. Placeholders that already hold
    /// content in `target_language` are left alone.
    pub fn copy_plugins_to_language(
        &mut self,
        page: PageId,
        source_language: &str,
        target_language: &str,
    ) -> ContentResult<usize> {
        let mut copied = 0;
        for placeholder in self.placeholders(page)?.to_vec() {
            if !self.plugins(placeholder, target_language).is_empty() {
                continue;
            }
            let sources: Vec<PluginId> = self
                .plugins(placeholder, source_language)
                .iter()
                .map(|p| p.id)
                .collect();
            copied += self
                .copy_plugins_to(&sources, placeholder, target_language)?
                .len();
        }
        Ok(copied)
    }

    // ========== Publishing ==========

    /// Publish one language of a draft page into its public copy, creating
    /// the public copy on first publish. Returns the public page.
    pub fn publish(&mut self, page: PageId, language: &str) -> ContentResult<PageId> {
        let draft = self.page(page)?;
        let existing = match draft.publisher {
            PublisherState::Draft { public } => public,
            PublisherState::Public { .. } => return Err(ContentError::NotDraft(page.0)),
        };
        let title = draft
            .titles
            .get(language)
            .cloned()
            .ok_or_else(|| ContentError::MissingTitle {
                page: page.0,
                language: language.to_string(),
            })?;

        let public = match existing {
            Some(public) => public,
            None => {
                let public_parent = match draft.parent {
                    Some(parent) => self.public_object(parent)?,
                    None => None,
                };
                let id = PageId(self.pages.len());
                self.pages.push(Page {
                    id,
                    parent: public_parent,
                    titles: BTreeMap::new(),
                    placeholders: Vec::new(),
                    publisher: PublisherState::Public { draft: page },
                    published_languages: Default::default(),
                    publication_date: None,
                });
                self.page_mut(page)?.publisher = PublisherState::Draft { public: Some(id) };
                id
            }
        };

        self.page_mut(public)?
            .titles
            .insert(language.to_string(), title);

        for placeholder in self.placeholders(page)?.to_vec() {
            let slot = self.placeholder(placeholder)?.slot.clone();
            let target = match self.placeholder_by_slot(public, &slot) {
                Some(target) => target,
                None => self.add_placeholder(public, &slot)?,
            };
            self.clear(target, Some(language));
            let sources: Vec<PluginId> = self
                .plugins(placeholder, language)
                .iter()
                .map(|p| p.id)
                .collect();
            self.copy_plugins_to(&sources, target, language)?;
        }

        let now = chrono::Utc::now();
        for id in [page, public] {
            let entry = self.page_mut(id)?;
            entry.published_languages.insert(language.to_string());
            entry.publication_date.get_or_insert(now);
        }
        Ok(public)
    }

    // ========== Snapshots ==========

    pub fn load_json(path: &Path) -> ContentResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ContentError::Snapshot(format!("failed to read '{}': {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ContentError::Snapshot(format!("failed to parse '{}': {}", path.display(), e))
        })
    }

    pub fn save_json(&self, path: &Path) -> ContentResult<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ContentError::Snapshot(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| {
            ContentError::Snapshot(format!("failed to write '{}': {}", path.display(), e))
        })
    }
}
