use serde::{Deserialize, Serialize};

use crate::Intent;

/// Everything the escalation advisor gets to see about one exchange.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscalationRequest {
    /// The user's original query.
    pub query: String,
    /// The intent the engine resolved the query to.
    pub intent: Intent,
    /// The knowledge base snippet, if the query was answered from it.
    pub kb_snippet: Option<String>,
    /// The final response text shown to the user.
    pub response_text: String,
}
