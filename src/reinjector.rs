//! Translation re-injector
//!
//! Rebuilds one language of a page as a structural copy of the English
//! content, then overwrites each copied plugin's text with the translation
//! record that has the same (position, type).

use crate::content::{ContentTree, PageId, PluginId, SOURCE_LANGUAGE};
use crate::error::ContentResult;
use crate::interchange::TranslationRecord;
use tracing::{debug, info};

/// A record that was written into a plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedTranslation {
    pub plugin: PluginId,
    /// Index of the record in the input slice
    pub record: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReinjectionReport {
    pub language: String,
    pub applied: Vec<AppliedTranslation>,
    /// Plugins left with the text of the structural copy, either because no
    /// record matched or because their type has no text field
    pub untouched: Vec<PluginId>,
    /// Plugins for which more than one record matched. The first record won.
    pub ambiguous: Vec<PluginId>,
}

/// Re-inject translated text into `language` of `page`.
///
/// Every placeholder's `language` content is cleared and re-copied from
/// English first, so the result always mirrors the English structure. When
/// `language` is English itself the content is updated in place instead.
///
/// Matching is by (position, type) and the first matching record wins.
pub fn translate_page(
    tree: &mut ContentTree,
    page: PageId,
    language: &str,
    records: &[TranslationRecord],
) -> ContentResult<ReinjectionReport> {
    let placeholders = tree.placeholders(page)?.to_vec();

    if language != SOURCE_LANGUAGE {
        for placeholder in &placeholders {
            tree.clear(*placeholder, Some(language));
        }
        let copied = tree.copy_plugins_to_language(page, SOURCE_LANGUAGE, language)?;
        debug!("Copied {} plugins from {} to {}", copied, SOURCE_LANGUAGE, language);
    }

    let targets: Vec<(PluginId, u32, String)> = placeholders
        .iter()
        .flat_map(|placeholder| tree.plugins(*placeholder, language))
        .map(|plugin| (plugin.id, plugin.position, plugin.plugin_type.clone()))
        .collect();

    let mut report = ReinjectionReport {
        language: language.to_string(),
        ..Default::default()
    };

    for (plugin, position, plugin_type) in targets {
        let mut matches = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.position == position && r.plugin_type == plugin_type);

        let Some((index, record)) = matches.next() else {
            report.untouched.push(plugin);
            continue;
        };
        if matches.next().is_some() {
            debug!(
                "Several records match position {} of type {}, using the first",
                position, plugin_type
            );
            report.ambiguous.push(plugin);
        }

        if tree.set_text(plugin, &record.translated)? {
            report.applied.push(AppliedTranslation {
                plugin,
                record: index,
            });
        } else {
            report.untouched.push(plugin);
        }
    }

    info!(
        "Re-injected {} translations into page {} ({}), {} untouched",
        report.applied.len(),
        page.0,
        language,
        report.untouched.len()
    );
    Ok(report)
}
