use serde::{Deserialize, Serialize};

use crate::Intent;

/// The result of classifying a query.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentClassification {
    /// The classified intent.
    pub intent: Intent,
    /// A short topic label, e.g. `"dark mode"`.
    pub topic: Option<String>,
}

impl IntentClassification {
    /// Creates a classification without a topic.
    #[inline]
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            topic: None,
        }
    }

    /// Attaches a topic.
    #[inline]
    pub fn with_topic<S: Into<String>>(mut self, topic: S) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

/// The result of searching the knowledge base.
///
/// Only a present, non-empty `snippet` counts as a hit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KbSearchResult {
    /// The answer text found in the knowledge base.
    pub snippet: Option<String>,
    /// The knowledge base entry the snippet came from, e.g. its question.
    pub relevant_topic: Option<String>,
}

impl KbSearchResult {
    /// Creates a hit.
    #[inline]
    pub fn hit<S1: Into<String>, S2: Into<String>>(
        snippet: S1,
        relevant_topic: S2,
    ) -> Self {
        Self {
            snippet: Some(snippet.into()),
            relevant_topic: Some(relevant_topic.into()),
        }
    }

    /// Returns the snippet if this result is a hit.
    #[inline]
    pub fn hit_snippet(&self) -> Option<&str> {
        self.snippet.as_deref().filter(|s| !s.is_empty())
    }
}

/// The advisor's verdict on whether a human team should take over.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscalationDecision {
    /// Whether the conversation should be routed to a human team.
    pub escalate: bool,
    /// Why, if the advisor gave a reason.
    pub reason: Option<String>,
}

impl EscalationDecision {
    /// A decision to escalate, with an optional reason.
    #[inline]
    pub fn escalate(reason: Option<String>) -> Self {
        Self {
            escalate: true,
            reason,
        }
    }
}
