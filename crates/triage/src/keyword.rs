use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::future::ready;
use std::sync::Arc;

use triage_model::{
    ErrorKind, KbSearchResult, KnowledgeBase, KnowledgeBaseSearcher,
    ServiceError,
};

/// Error type for [`KeywordSearcher`], which never fails.
#[derive(Debug)]
pub enum KeywordSearchError {}

impl Display for KeywordSearchError {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl StdError for KeywordSearchError {}

impl ServiceError for KeywordSearchError {
    fn kind(&self) -> ErrorKind {
        match *self {}
    }
}

/// A knowledge base searcher that matches queries against the entries'
/// questions locally, by keywords.
#[derive(Clone, Debug)]
pub struct KeywordSearcher {
    knowledge_base: Arc<KnowledgeBase>,
}

impl KeywordSearcher {
    /// Creates a searcher over the given knowledge base.
    #[inline]
    pub fn new(knowledge_base: KnowledgeBase) -> Self {
        Self {
            knowledge_base: Arc::new(knowledge_base),
        }
    }
}

impl KnowledgeBaseSearcher for KeywordSearcher {
    type Error = KeywordSearchError;

    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<KbSearchResult>, Self::Error>>
    + Send
    + 'static {
        let result = self.knowledge_base.lookup(query).map(|entry| {
            KbSearchResult::hit(entry.answer.clone(), entry.question.clone())
        });
        trace!("keyword lookup for {query:?}: {result:?}");
        ready(Ok(result))
    }
}
