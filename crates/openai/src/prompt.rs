//! Prompts for the three collaborators, and the replies they ask for.

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use triage_model::{
    EscalationDecision, EscalationRequest, Intent, IntentClassification,
    KbSearchResult, KnowledgeBase,
};

use crate::OpenAIConfig;
use crate::proto::{ChatCompletionRequest, create_request};

const SEARCH_PROMPT: &str = "\
You answer customer support queries from a knowledge base. The knowledge \
base is a numbered list of questions with their answers. Pick the entry \
whose answer resolves the customer's query. If no entry clearly does, \
reply with a null entry. Never make up an answer.

Knowledge base:

";

const CLASSIFY_PROMPT: &str = "\
You classify customer support queries. Pick exactly one intent:

- Technical Support: something is broken, slow, or the customer cannot \
access their account.
- Product Feature Request: the customer suggests or asks for a new \
capability.
- Sales Lead: the customer asks about pricing, plans, purchasing or a demo.
- Unknown: none of the above, or the query is unintelligible.

Also give a topic of a few words describing what the query is about.";

const ESCALATION_PROMPT: &str = "\
You review a finished customer support exchange and decide whether a human \
team should take over. Escalate when the customer is frustrated, the issue \
is urgent or affects their business, the automated reply is unlikely to \
help, or the query is a promising sales opportunity. Otherwise do not \
escalate. When escalating, give a one-sentence reason.";

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchReply {
    #[schemars(
        description = "The number of the matching entry, or null if none \
                       answers the query."
    )]
    entry: Option<usize>,
}

impl SearchReply {
    /// Looks the chosen entry up, returning its answer verbatim.
    pub fn resolve(self, kb: &KnowledgeBase) -> Option<KbSearchResult> {
        let number = self.entry?;
        let Some(entry) = kb.entry(number) else {
            warn!("model picked a nonexistent entry {number}");
            return None;
        };
        Some(KbSearchResult::hit(
            entry.answer.clone(),
            entry.question.clone(),
        ))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ClassificationReply {
    #[schemars(
        description = "One of \"Technical Support\", \"Product Feature \
                       Request\", \"Sales Lead\" or \"Unknown\"."
    )]
    intent: String,
    #[schemars(description = "A short label for what the query is about.")]
    topic: Option<String>,
}

impl ClassificationReply {
    pub fn resolve(self) -> Option<IntentClassification> {
        let intent: Intent = match self.intent.parse() {
            Ok(intent) => intent,
            Err(err) => {
                warn!("model replied with an invalid intent: {err}");
                return None;
            }
        };
        Some(IntentClassification {
            intent,
            topic: self.topic.filter(|topic| !topic.trim().is_empty()),
        })
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct EscalationReply {
    #[schemars(description = "Whether a human team should take over.")]
    escalate: bool,
    #[schemars(description = "Why, when escalating.")]
    reason: Option<String>,
}

impl EscalationReply {
    #[inline]
    pub fn resolve(self) -> EscalationDecision {
        EscalationDecision {
            escalate: self.escalate,
            reason: self.reason.filter(|reason| !reason.trim().is_empty()),
        }
    }
}

pub fn search_request(
    config: &OpenAIConfig,
    kb: &KnowledgeBase,
    query: &str,
) -> ChatCompletionRequest {
    let mut system = SEARCH_PROMPT.to_owned();
    system.push_str(&kb.render_numbered());
    create_request(
        config,
        system,
        query.to_owned(),
        "knowledge_base_entry",
        schema_for!(SearchReply).to_value(),
    )
}

pub fn classify_request(
    config: &OpenAIConfig,
    query: &str,
) -> ChatCompletionRequest {
    create_request(
        config,
        CLASSIFY_PROMPT.to_owned(),
        query.to_owned(),
        "intent_classification",
        schema_for!(ClassificationReply).to_value(),
    )
}

pub fn escalation_request(
    config: &OpenAIConfig,
    req: &EscalationRequest,
) -> ChatCompletionRequest {
    let mut exchange = format!(
        "Customer query: {}\nClassified intent: {}\n",
        req.query, req.intent
    );
    if let Some(snippet) = &req.kb_snippet {
        exchange.push_str(&format!("Knowledge base answer: {snippet}\n"));
    }
    exchange.push_str(&format!("Reply sent: {}", req.response_text));
    create_request(
        config,
        ESCALATION_PROMPT.to_owned(),
        exchange,
        "escalation_decision",
        schema_for!(EscalationReply).to_value(),
    )
}

/// Parses a structured reply, tolerating a surrounding code fence.
///
/// Returns `None` if the content does not match `T`.
pub fn parse_reply<T: DeserializeOwned>(content: &str) -> Option<T> {
    let mut json = content.trim();
    if let Some(fenced) = json.strip_prefix("```") {
        json = fenced.trim_start_matches("json");
        json = json.strip_suffix("```").unwrap_or(json).trim();
    }
    match serde_json::from_str(json) {
        Ok(reply) => Some(reply),
        Err(err) => {
            warn!("failed to parse the model reply: {err}");
            trace!("unparseable reply: {content}");
            None
        }
    }
}
