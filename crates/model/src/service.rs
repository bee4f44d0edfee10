use std::error::Error;

use crate::error::ErrorKind;
use crate::request::EscalationRequest;
use crate::response::{EscalationDecision, IntentClassification, KbSearchResult};

/// The error type for a collaborator service.
///
/// Returning an error means the backend itself failed (transport, quota,
/// malformed traffic). "Nothing found" is never an error, it is `Ok(None)`.
pub trait ServiceError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// Looks up a user query in the knowledge base.
///
/// Like the other services, once created it should behave like a stateless
/// object, and the returned future must be independent of `self`.
pub trait KnowledgeBaseSearcher: Send + Sync {
    /// The error type that may be returned by the searcher.
    type Error: ServiceError;

    /// Searches the knowledge base with the raw user text.
    ///
    /// Resolves to `Ok(None)` when there is no answer.
    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<KbSearchResult>, Self::Error>>
    + Send
    + 'static;
}

/// Maps a user query to an [`Intent`](crate::Intent) and a topic.
pub trait IntentClassifier: Send + Sync {
    /// The error type that may be returned by the classifier.
    type Error: ServiceError;

    /// Classifies the raw user text.
    ///
    /// Resolves to `Ok(None)` when the query could not be classified.
    fn classify(
        &self,
        query: &str,
    ) -> impl Future<
        Output = Result<Option<IntentClassification>, Self::Error>,
    > + Send
    + 'static;
}

/// Decides whether an exchange should be handed to a human team.
///
/// The advice is never load-bearing: callers treat `Ok(None)` and errors
/// alike as "don't escalate".
pub trait EscalationAdvisor: Send + Sync {
    /// The error type that may be returned by the advisor.
    type Error: ServiceError;

    /// Gives advice for one finished exchange.
    fn advise(
        &self,
        req: &EscalationRequest,
    ) -> impl Future<Output = Result<Option<EscalationDecision>, Self::Error>>
    + Send
    + 'static;
}
