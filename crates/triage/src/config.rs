use std::env;
use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use triage_model::KnowledgeBase;
use triage_openai::{OpenAIConfig, OpenAIConfigBuilder};

/// The API key value shipped in sample configurations.
pub const PLACEHOLDER_API_KEY: &str = "YOUR_ACTUAL_API_KEY";

const API_KEY_VAR: &str = "OPENAI_API_KEY";
const BASE_URL_VAR: &str = "OPENAI_BASE_URL";
const MODEL_VAR: &str = "OPENAI_MODEL";
const KNOWLEDGE_BASE_VAR: &str = "TRIAGE_KNOWLEDGE_BASE";
const SEARCH_MODE_VAR: &str = "TRIAGE_KB_SEARCH";

/// How the knowledge base is searched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchMode {
    /// The model picks the entry that answers the query.
    #[default]
    Model,
    /// Entries are matched locally by keywords.
    Keyword,
}

impl FromStr for SearchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "model" => Ok(Self::Model),
            "keyword" => Ok(Self::Keyword),
            _ => Err(ConfigError::InvalidSearchMode(s.to_owned())),
        }
    }
}

/// Error returned when the environment does not describe a usable setup.
///
/// The `Display` text is what the user sees as the configuration error.
#[derive(Debug)]
pub enum ConfigError {
    /// The API key is not set, or empty.
    MissingApiKey,
    /// The API key is still the sample value.
    PlaceholderApiKey,
    /// The knowledge base document could not be read.
    KnowledgeBase {
        /// Where the document was looked for.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },
    /// The search mode is not one of the known values.
    InvalidSearchMode(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey | Self::PlaceholderApiKey => write!(
                f,
                "API Key is not configured or is using a placeholder. Please \
                 set a valid {API_KEY_VAR} environment variable."
            ),
            Self::KnowledgeBase { path, source } => write!(
                f,
                "Failed to read the knowledge base at {}: {source}",
                path.display()
            ),
            Self::InvalidSearchMode(value) => write!(
                f,
                "Invalid {SEARCH_MODE_VAR} value \"{value}\", expected \
                 \"model\" or \"keyword\"."
            ),
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::KnowledgeBase { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Everything needed to assemble an engine.
#[derive(Clone, Debug)]
pub struct Settings {
    /// The backend configuration.
    pub openai: OpenAIConfig,
    /// The knowledge base to answer from.
    pub knowledge_base: KnowledgeBase,
    /// How the knowledge base is searched.
    pub search_mode: SearchMode,
}

impl Settings {
    /// Reads the settings from the process environment.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the settings with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR)
            .map(|key| key.trim().to_owned())
            .filter(|key| !key.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        if api_key == PLACEHOLDER_API_KEY {
            return Err(ConfigError::PlaceholderApiKey);
        }

        let mut openai = OpenAIConfigBuilder::with_api_key(api_key);
        if let Some(base_url) = non_empty(lookup(BASE_URL_VAR)) {
            openai = openai.with_base_url(base_url);
        }
        if let Some(model) = non_empty(lookup(MODEL_VAR)) {
            openai = openai.with_model(model);
        }

        let knowledge_base = match non_empty(lookup(KNOWLEDGE_BASE_VAR)) {
            Some(path) => {
                let path = PathBuf::from(path);
                let text = fs::read_to_string(&path).map_err(|source| {
                    ConfigError::KnowledgeBase {
                        path: path.clone(),
                        source,
                    }
                })?;
                debug!("loaded knowledge base from {}", path.display());
                KnowledgeBase::parse(&text)
            }
            None => KnowledgeBase::sample(),
        };

        let search_mode = match non_empty(lookup(SEARCH_MODE_VAR)) {
            Some(mode) => mode.parse()?,
            None => SearchMode::default(),
        };

        Ok(Self {
            openai: openai.build(),
            knowledge_base,
            search_mode,
        })
    }
}

#[inline]
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_api_key_is_required() {
        for vars in [
            &[][..],
            &[("OPENAI_API_KEY", "  ")][..],
            &[("OPENAI_API_KEY", "YOUR_ACTUAL_API_KEY")][..],
        ] {
            let err = settings(vars).unwrap_err();
            assert_eq!(
                err.to_string(),
                "API Key is not configured or is using a placeholder. Please \
                 set a valid OPENAI_API_KEY environment variable."
            );
        }
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert_eq!(settings.search_mode, SearchMode::Model);
        assert_eq!(settings.knowledge_base, KnowledgeBase::sample());
        assert_eq!(settings.openai.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:1234/v1"),
            ("OPENAI_MODEL", "local-model"),
            ("TRIAGE_KB_SEARCH", "Keyword"),
        ])
        .unwrap();
        assert_eq!(settings.search_mode, SearchMode::Keyword);
        assert_eq!(settings.openai.base_url(), "http://localhost:1234/v1");
        assert_eq!(settings.openai.model(), "local-model");

        let err = self::settings(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("TRIAGE_KB_SEARCH", "fuzzy"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSearchMode(_)));
    }

    #[test]
    fn test_missing_knowledge_base() {
        let err = settings(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("TRIAGE_KNOWLEDGE_BASE", "/nonexistent/kb.md"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::KnowledgeBase { .. }));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/nonexistent/kb.md"));
    }
}
