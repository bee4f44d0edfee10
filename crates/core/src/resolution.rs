//! Turning collaborator answers into a reply.
//!
//! Everything here is pure. The engine feeds in what the knowledge base and
//! the classifier said, and gets back the texts to append to the log.

use triage_model::{
    EscalationDecision, Intent, IntentClassification, KbSearchResult,
};

/// Appended to every reply the user can confirm.
pub const RESOLUTION_CHECK: &str = "Does this resolve your issue?";

/// Logged when the knowledge base had nothing and the classifier is asked.
pub const KNOWLEDGE_BASE_MISS: &str =
    "No direct answer in Knowledge Base. Proceeding with AI classification...";

const TOPIC_PREFIX_CHARS: usize = 50;

/// How a query got resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The knowledge base had an answer. Always technical support.
    KnowledgeBaseHit {
        /// What the answer is about.
        topic: String,
        /// The answer.
        snippet: String,
    },
    /// The classifier recognized the query.
    Classified {
        /// The classified intent, which may still be `Unknown`.
        intent: Intent,
        /// What the query is about.
        topic: String,
    },
    /// The classifier could not make sense of the query.
    Unclassified,
}

impl ResolutionOutcome {
    /// Interprets a knowledge base search.
    ///
    /// Returns `None` unless the result carries a non-empty snippet, in
    /// which case the classifier has to be consulted.
    pub fn from_search(
        query: &str,
        result: Option<KbSearchResult>,
    ) -> Option<Self> {
        let result = result?;
        let snippet = result.hit_snippet()?.to_owned();
        let topic = non_empty(result.relevant_topic)
            .unwrap_or_else(|| fallback_topic(query));
        Some(Self::KnowledgeBaseHit { topic, snippet })
    }

    /// Interprets a classification.
    pub fn from_classification(
        query: &str,
        classification: Option<IntentClassification>,
    ) -> Self {
        let Some(classification) = classification else {
            return Self::Unclassified;
        };
        Self::Classified {
            intent: classification.intent,
            topic: non_empty(classification.topic)
                .unwrap_or_else(|| fallback_topic(query)),
        }
    }

    /// Returns the resolved intent.
    pub fn intent(&self) -> Intent {
        match self {
            Self::KnowledgeBaseHit { .. } => Intent::TechnicalSupport,
            Self::Classified { intent, .. } => *intent,
            Self::Unclassified => Intent::Unknown,
        }
    }

    /// Returns the topic, unless the query was not understood at all.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::KnowledgeBaseHit { topic, .. }
            | Self::Classified { topic, .. } => Some(topic),
            Self::Unclassified => None,
        }
    }

    /// Returns the knowledge base snippet, if the query was answered by it.
    pub fn snippet(&self) -> Option<&str> {
        match self {
            Self::KnowledgeBaseHit { snippet, .. } => Some(snippet),
            _ => None,
        }
    }

    /// Returns the system note documenting where the intent came from.
    pub fn classification_notice(&self) -> String {
        match self {
            Self::KnowledgeBaseHit { .. } => format!(
                "Query content matched knowledge base. Classified as: {} \
                 (Source: KB).",
                self.intent()
            ),
            Self::Classified { intent, topic } => format!(
                "Query classified by AI as: {intent} (Topic: {topic})"
            ),
            Self::Unclassified => "Error: Could not classify your query \
                                   after KB search. Please try rephrasing."
                .to_owned(),
        }
    }

    /// Returns the reply to show to the user.
    ///
    /// Replies the user can act on end with [`RESOLUTION_CHECK`]. Replies
    /// for the `Unknown` intent never do, they are followed up with a
    /// "rephrase" action instead.
    pub fn response_text(&self) -> String {
        let mut text = match self {
            Self::KnowledgeBaseHit { topic, snippet } => format!(
                "Regarding \"{topic}\", here's some information from our \
                 knowledge base: \"{snippet}\"."
            ),
            Self::Classified { intent, topic } => template(*intent, topic),
            Self::Unclassified => "I'm having trouble understanding your \
                                   request. Could you please try rephrasing \
                                   it?"
                .to_owned(),
        };
        if self.intent() != Intent::Unknown {
            text.push(' ');
            text.push_str(RESOLUTION_CHECK);
        }
        text
    }
}

fn template(intent: Intent, topic: &str) -> String {
    match intent {
        Intent::TechnicalSupport => format!(
            "Thanks for your query about \"{topic}\". I couldn't find an \
             immediate answer in our knowledge base for this technical \
             issue. Our team will look into this."
        ),
        Intent::ProductFeatureRequest => format!(
            "Thank you for your suggestion! We've logged your feature \
             request for \"{topic}\" for our product team to review."
        ),
        Intent::SalesLead => format!(
            "Thanks for your interest in our products/services regarding \
             \"{topic}\"! Our sales team will be in touch soon. In the \
             meantime, could you tell us more about your needs or your \
             company?"
        ),
        Intent::Unknown => {
            "I'm not sure how to help with that. What would you like to do?"
                .to_owned()
        }
    }
}

/// The topic used when no collaborator named one: the beginning of the
/// query followed by an ellipsis.
pub fn fallback_topic(query: &str) -> String {
    let prefix: String = query.chars().take(TOPIC_PREFIX_CHARS).collect();
    format!("{}...", prefix.trim())
}

/// Returns the system note announcing an escalation, or `None` if the
/// advisor did not ask for one.
pub fn escalation_notice(
    intent: Intent,
    decision: &EscalationDecision,
) -> Option<String> {
    if !decision.escalate {
        return None;
    }
    let team = match intent {
        Intent::TechnicalSupport => "Technical Support",
        Intent::SalesLead => "Sales",
        _ => "the relevant",
    };
    let mut text = format!(
        "This issue has been flagged for escalation to our human {team} team."
    );
    if let Some(reason) = decision.reason.as_deref().filter(|r| !r.is_empty())
    {
        text.push_str(" Reason: ");
        text.push_str(reason);
    }
    Some(text)
}

#[inline]
fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}
