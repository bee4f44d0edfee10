use triage_model::{EscalationAdvisor, IntentClassifier, KnowledgeBaseSearcher};

use super::Engine;
use crate::services::Services;

const DEFAULT_GREETING: &str =
    "Hello! I'm your AI Customer Service Agent. How can I help you today?";

/// [`Engine`] builder.
pub struct EngineBuilder {
    pub(super) services: Result<Services, String>,
    pub(super) greeting: String,
}

impl EngineBuilder {
    /// Creates a builder for an engine backed by the given collaborators.
    pub fn with_services<K, C, A>(searcher: K, classifier: C, advisor: A) -> Self
    where
        K: KnowledgeBaseSearcher + 'static,
        C: IntentClassifier + 'static,
        A: EscalationAdvisor + 'static,
    {
        Self {
            services: Ok(Services::new(searcher, classifier, advisor)),
            greeting: DEFAULT_GREETING.to_owned(),
        }
    }

    /// Creates a builder for an engine whose backend could not be set up.
    ///
    /// The engine starts in, and never leaves, the configuration error mode.
    /// `reason` is shown as its only message.
    pub fn with_configuration_error<S: Into<String>>(reason: S) -> Self {
        Self {
            services: Err(reason.into()),
            greeting: DEFAULT_GREETING.to_owned(),
        }
    }

    /// Replaces the greeting the conversation opens with.
    #[inline]
    pub fn with_greeting<S: Into<String>>(mut self, greeting: S) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Builds the engine.
    ///
    /// Must be called within a tokio runtime.
    #[inline]
    pub fn build(self) -> Engine {
        Engine::spawn_from_builder(self)
    }
}
