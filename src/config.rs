//! Runtime configuration
//!
//! Settings come from an optional JSON file named by `PAGE_SYNC_SETTINGS`,
//! overlaid with individual environment variables:
//!
//! | Variable               | Setting                                   |
//! |------------------------|-------------------------------------------|
//! | `PAGE_SYNC_LANGUAGES`  | `en:English,de:Deutsch`                   |
//! | `PAGE_SYNC_PAGE_FIELD` | issue field holding the page address      |
//! | `PAGE_SYNC_PROJECT`    | translation project slug                  |
//! | `PAGE_SYNC_SNAPSHOT`   | content tree snapshot path                |
//! | `PAGE_SYNC_BIND`       | web server bind address                   |
//! | `TRANSIFEX_API_TOKEN`  | enables the Transifex client              |
//! | `TRANSIFEX_BASE_URL`   | overrides the Transifex API base URL      |
//! | `JIRA_BASE_URL`        | enables the Jira client, together with    |
//! | `JIRA_USER`            | the user, token and transition id         |
//! | `JIRA_API_TOKEN`       |                                           |
//! | `JIRA_TRANSITION_ID`   |                                           |

use crate::content::SOURCE_LANGUAGE;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub code: String,
    pub name: String,
}

impl Language {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransifexSettings {
    pub api_token: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraSettings {
    pub base_url: String,
    pub user: String,
    pub api_token: String,
    pub transition_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Ordered list of site languages; drives every "all languages" loop
    pub languages: Vec<Language>,
    pub page_address_field: String,
    pub staging_root: String,
    pub production_root: String,
    pub translation_project: String,
    /// Inclusive start-delay window for translation imports, in seconds
    pub import_jitter_secs: (u64, u64),
    /// Site language code to translation service code
    pub language_shim: BTreeMap<String, String>,
    pub snapshot_path: Option<PathBuf>,
    pub bind_address: String,
    pub transifex: Option<TransifexSettings>,
    pub jira: Option<JiraSettings>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let mut language_shim = BTreeMap::new();
        // Pashto is served under the Afrikaans code on the site
        language_shim.insert("af".to_string(), "ps".to_string());

        Self {
            languages: vec![Language::new("en", "English")],
            page_address_field: "page_address".to_string(),
            staging_root: "staging".to_string(),
            production_root: "production".to_string(),
            translation_project: "website".to_string(),
            import_jitter_secs: (10, 20),
            language_shim,
            snapshot_path: None,
            bind_address: "127.0.0.1:3000".to_string(),
            transifex: None,
            jira: None,
        }
    }
}

impl SyncConfig {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup("PAGE_SYNC_SETTINGS") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(languages) = lookup("PAGE_SYNC_LANGUAGES") {
            config.languages = parse_languages(&languages)?;
        }
        if let Some(field) = lookup("PAGE_SYNC_PAGE_FIELD") {
            config.page_address_field = field;
        }
        if let Some(project) = lookup("PAGE_SYNC_PROJECT") {
            config.translation_project = project;
        }
        if let Some(path) = lookup("PAGE_SYNC_SNAPSHOT") {
            config.snapshot_path = Some(PathBuf::from(path));
        }
        if let Some(bind) = lookup("PAGE_SYNC_BIND") {
            config.bind_address = bind;
        }
        if let Some(api_token) = lookup("TRANSIFEX_API_TOKEN") {
            config.transifex = Some(TransifexSettings {
                api_token,
                base_url: lookup("TRANSIFEX_BASE_URL"),
            });
        }
        if let (Some(base_url), Some(user), Some(api_token), Some(transition_id)) = (
            lookup("JIRA_BASE_URL"),
            lookup("JIRA_USER"),
            lookup("JIRA_API_TOKEN"),
            lookup("JIRA_TRANSITION_ID"),
        ) {
            config.jira = Some(JiraSettings {
                base_url,
                user,
                api_token,
                transition_id,
            });
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.languages.iter().any(|l| l.code == SOURCE_LANGUAGE) {
            return Err(ConfigError::Invalid {
                key: "languages",
                message: format!("'{}' must be one of the languages", SOURCE_LANGUAGE),
            });
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = self.languages.iter().find(|l| !seen.insert(&l.code)) {
            return Err(ConfigError::Invalid {
                key: "languages",
                message: format!("'{}' is listed twice", duplicate.code),
            });
        }
        let (min, max) = self.import_jitter_secs;
        if min > max {
            return Err(ConfigError::Invalid {
                key: "import_jitter_secs",
                message: format!("{} is greater than {}", min, max),
            });
        }
        if self.page_address_field.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "page_address_field",
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn language_codes(&self) -> Vec<String> {
        self.languages.iter().map(|l| l.code.clone()).collect()
    }
}

/// Parse `code:Name,code:Name`; a bare code uses itself as the name
fn parse_languages(raw: &str) -> Result<Vec<Language>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (code, name) = entry.split_once(':').unwrap_or((entry, entry));
            let code = code.trim().to_lowercase();
            if code.is_empty() {
                return Err(ConfigError::Invalid {
                    key: "PAGE_SYNC_LANGUAGES",
                    message: format!("empty language code in '{}'", entry),
                });
            }
            Ok(Language {
                code,
                name: name.trim().to_string(),
            })
        })
        .collect()
}
