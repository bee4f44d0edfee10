use std::fmt::{self, Debug};
use std::pin::Pin;
use std::sync::Arc;

use tracing::Instrument;
use triage_model::{
    EscalationAdvisor, EscalationDecision, EscalationRequest,
    IntentClassification, IntentClassifier, KbSearchResult,
    KnowledgeBaseSearcher, ServiceError,
};

pub type ServiceResult<T> = Result<T, Box<dyn ServiceError>>;
type BoxedServiceFuture<T> =
    Pin<Box<dyn Future<Output = ServiceResult<T>> + Send>>;
#[rustfmt::skip]
type SearchFn = Arc<
    dyn Fn(&str) -> BoxedServiceFuture<Option<KbSearchResult>> + Send + Sync
>;
#[rustfmt::skip]
type ClassifyFn = Arc<
    dyn Fn(&str) -> BoxedServiceFuture<Option<IntentClassification>>
        + Send + Sync
>;
#[rustfmt::skip]
type AdviseFn = Arc<
    dyn Fn(&EscalationRequest)
        -> BoxedServiceFuture<Option<EscalationDecision>> + Send + Sync
>;

/// The three collaborators of an engine behind a type-erased interface.
///
/// Cloning is cheap, so every pipeline task can own a copy.
#[derive(Clone)]
pub struct Services {
    search_fn: SearchFn,
    classify_fn: ClassifyFn,
    advise_fn: AdviseFn,
}

impl Services {
    pub fn new<K, C, A>(searcher: K, classifier: C, advisor: A) -> Self
    where
        K: KnowledgeBaseSearcher + 'static,
        C: IntentClassifier + 'static,
        A: EscalationAdvisor + 'static,
    {
        // Erase the collaborator types, `Services` is passed around without
        // generic parameters.
        let search_fn: SearchFn = Arc::new(move |query: &str| {
            let fut = searcher.search(query);
            Box::pin(
                async move { fut.await.map_err(erase::<K::Error>) }
                    .instrument(trace_span!("kb search")),
            ) as BoxedServiceFuture<_>
        });
        let classify_fn: ClassifyFn = Arc::new(move |query: &str| {
            let fut = classifier.classify(query);
            Box::pin(
                async move { fut.await.map_err(erase::<C::Error>) }
                    .instrument(trace_span!("classify")),
            ) as BoxedServiceFuture<_>
        });
        let advise_fn: AdviseFn = Arc::new(move |req: &EscalationRequest| {
            let fut = advisor.advise(req);
            Box::pin(
                async move { fut.await.map_err(erase::<A::Error>) }
                    .instrument(trace_span!("escalation check")),
            ) as BoxedServiceFuture<_>
        });
        Self {
            search_fn,
            classify_fn,
            advise_fn,
        }
    }

    /// Searches the knowledge base.
    #[inline]
    pub async fn search(
        &self,
        query: &str,
    ) -> ServiceResult<Option<KbSearchResult>> {
        (self.search_fn)(query).await
    }

    /// Classifies the query.
    #[inline]
    pub async fn classify(
        &self,
        query: &str,
    ) -> ServiceResult<Option<IntentClassification>> {
        (self.classify_fn)(query).await
    }

    /// Asks whether the exchange should be escalated.
    #[inline]
    pub async fn advise(
        &self,
        req: &EscalationRequest,
    ) -> ServiceResult<Option<EscalationDecision>> {
        (self.advise_fn)(req).await
    }
}

impl Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

#[inline]
fn erase<E: ServiceError>(err: E) -> Box<dyn ServiceError> {
    trace!("got an error: {err:?}");
    Box::new(err)
}
