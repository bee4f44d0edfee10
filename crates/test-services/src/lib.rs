//! Local fake collaborators for testing purpose.

mod preset;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::sleep;
use triage_model::{
    ErrorKind, EscalationAdvisor, EscalationDecision, EscalationRequest,
    IntentClassification, IntentClassifier, KbSearchResult,
    KnowledgeBaseSearcher, ServiceError,
};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Error {}

impl ServiceError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A local fake service for testing purpose.
///
/// Before sending requests, you need to script how the service should answer
/// them. Answers are selected by the exact query text, and every query
/// without a scripted answer gets the fallback, which is
/// [`Preset::NoResult`] unless changed.
///
/// Clones share the call counter, so a clone can be handed to the engine
/// while the original is kept for assertions.
///
/// # Note
///
/// This type is not optimized for production use, presets are cloned on
/// every request. You should only use it for testing.
#[derive(Clone)]
pub struct Scripted<T> {
    presets: HashMap<String, Preset<T>>,
    fallback: Preset<T>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

/// A scripted [`KnowledgeBaseSearcher`].
pub type ScriptedKnowledgeBase = Scripted<KbSearchResult>;

/// A scripted [`IntentClassifier`].
pub type ScriptedClassifier = Scripted<IntentClassification>;

/// A scripted [`EscalationAdvisor`], keyed by the query of the exchange.
pub type ScriptedAdvisor = Scripted<EscalationDecision>;

impl<T> Default for Scripted<T> {
    fn default() -> Self {
        Self {
            presets: HashMap::new(),
            fallback: Preset::NoResult,
            delay: None,
            calls: Default::default(),
        }
    }
}

impl<T> Scripted<T> {
    /// Answers `query` with `Ok(Some(reply))`.
    #[inline]
    pub fn add_reply<S: Into<String>>(&mut self, query: S, reply: T) {
        self.add_preset(query, Preset::Reply(reply));
    }

    /// Answers `query` with an error carrying `message`.
    #[inline]
    pub fn add_failure<S1: Into<String>, S2: Into<String>>(
        &mut self,
        query: S1,
        message: S2,
    ) {
        self.add_preset(query, Preset::failure(message));
    }

    #[inline]
    pub fn add_preset<S: Into<String>>(&mut self, query: S, preset: Preset<T>) {
        self.presets.insert(query.into(), preset);
    }

    /// Sets the answer for queries that have none scripted.
    #[inline]
    pub fn set_fallback(&mut self, preset: Preset<T>) {
        self.fallback = preset;
    }

    /// Delays every answer. Defaults to 1ms.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns how many requests this service (or any clone) received.
    #[inline]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<T: Clone + Send + 'static> Scripted<T> {
    fn respond(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<T>, Error>> + Send + 'static {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let preset = self.presets.get(query).unwrap_or(&self.fallback).clone();
        let delay = self.delay.unwrap_or(Duration::from_millis(1));
        async move {
            sleep(delay).await;
            match preset {
                Preset::Reply(reply) => Ok(Some(reply)),
                Preset::NoResult => Ok(None),
                Preset::Failure(message) => Err(Error {
                    message,
                    kind: ErrorKind::Other,
                }),
                Preset::Panic(message) => panic!("{message}"),
            }
        }
    }
}

impl KnowledgeBaseSearcher for ScriptedKnowledgeBase {
    type Error = crate::Error;

    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<KbSearchResult>, Self::Error>>
    + Send
    + 'static {
        self.respond(query)
    }
}

impl IntentClassifier for ScriptedClassifier {
    type Error = crate::Error;

    fn classify(
        &self,
        query: &str,
    ) -> impl Future<
        Output = Result<Option<IntentClassification>, Self::Error>,
    > + Send
    + 'static {
        self.respond(query)
    }
}

impl EscalationAdvisor for ScriptedAdvisor {
    type Error = crate::Error;

    fn advise(
        &self,
        req: &EscalationRequest,
    ) -> impl Future<Output = Result<Option<EscalationDecision>, Self::Error>>
    + Send
    + 'static {
        self.respond(&req.query)
    }
}
