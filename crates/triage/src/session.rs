use triage_core::{Engine, EngineBuilder};
use triage_openai::OpenAIServices;

use crate::{ConfigError, KeywordSearcher, SearchMode, Settings};

/// A session builder, which assembles an [`Engine`] from [`Settings`].
///
/// Invalid settings don't prevent building: the engine starts in the
/// configuration error mode instead, showing what is wrong.
pub struct SessionBuilder {
    settings: Result<Settings, ConfigError>,
    greeting: Option<String>,
}

impl SessionBuilder {
    /// Creates a session builder with settings read from the environment.
    ///
    /// See [`Settings::from_env`].
    #[inline]
    pub fn from_env() -> Self {
        Self::with_settings(Settings::from_env())
    }

    /// Creates a session builder with the specified settings.
    #[inline]
    pub fn with_settings(settings: Result<Settings, ConfigError>) -> Self {
        Self {
            settings,
            greeting: None,
        }
    }

    /// Replaces the greeting the conversation opens with.
    #[inline]
    pub fn with_greeting<S: Into<String>>(mut self, greeting: S) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    /// Builds the engine.
    ///
    /// Must be called within a tokio runtime.
    pub fn build(self) -> Engine {
        let mut builder = match self.settings {
            Ok(settings) => {
                info!(
                    "assembling engine with {:?} knowledge base search, model {}",
                    settings.search_mode,
                    settings.openai.model()
                );
                let services = OpenAIServices::new(
                    settings.openai,
                    settings.knowledge_base.clone(),
                );
                match settings.search_mode {
                    SearchMode::Model => EngineBuilder::with_services(
                        services.clone(),
                        services.clone(),
                        services,
                    ),
                    SearchMode::Keyword => EngineBuilder::with_services(
                        KeywordSearcher::new(settings.knowledge_base),
                        services.clone(),
                        services,
                    ),
                }
            }
            Err(err) => {
                error!("invalid configuration: {err}");
                EngineBuilder::with_configuration_error(err.to_string())
            }
        };
        if let Some(greeting) = self.greeting {
            builder = builder.with_greeting(greeting);
        }
        builder.build()
    }
}
