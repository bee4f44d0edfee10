//! Triage collaborators backed by OpenAI-compatible APIs.

#[macro_use]
extern crate tracing;

mod config;
mod prompt;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use backoff::ExponentialBackoffBuilder;
use mime::Mime;
use reqwest::{Client, StatusCode, header};
use tracing::Instrument;
use triage_model::{
    ErrorKind, EscalationAdvisor, EscalationDecision, EscalationRequest,
    IntentClassification, IntentClassifier, KbSearchResult, KnowledgeBase,
    KnowledgeBaseSearcher, ServiceError,
};

pub use config::{OpenAIConfig, OpenAIConfigBuilder};
use prompt::{ClassificationReply, EscalationReply, SearchReply, parse_reply};
use proto::{ChatCompletion, ChatCompletionRequest};

/// Error type for [`OpenAIServices`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ServiceError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// The knowledge base searcher, intent classifier and escalation advisor,
/// all asking the same OpenAI-compatible model.
///
/// Replies that don't follow the requested format are treated as "no
/// result" rather than errors.
#[derive(Clone, Debug)]
pub struct OpenAIServices {
    client: Client,
    config: Arc<OpenAIConfig>,
    knowledge_base: Arc<KnowledgeBase>,
}

impl OpenAIServices {
    /// Creates the services with the given configuration, searching the given
    /// knowledge base.
    #[inline]
    pub fn new(config: OpenAIConfig, knowledge_base: KnowledgeBase) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
            knowledge_base: Arc::new(knowledge_base),
        }
    }

    /// Sends the request, retrying while rate limited, and returns the
    /// content of the reply.
    fn complete(
        &self,
        req: ChatCompletionRequest,
    ) -> impl Future<Output = Result<String, Error>> + Send + 'static {
        let client = self.client.clone();
        let config = Arc::clone(&self.config);

        async move {
            let backoff = ExponentialBackoffBuilder::new()
                .with_max_elapsed_time(Some(config.max_retry_time))
                .build();
            let (client, config, req) = (&client, &*config, &req);
            backoff::future::retry_notify(
                backoff,
                move || async move {
                    send_request(client, config, req).await.map_err(|err| {
                        if err.kind == ErrorKind::RateLimitExceeded {
                            backoff::Error::transient(err)
                        } else {
                            backoff::Error::permanent(err)
                        }
                    })
                },
                |err, delay| warn!("{err}, retrying in {delay:?}"),
            )
            .await
        }
    }
}

/// Maps an unsuccessful HTTP status to an error. Any 5xx status means the
/// backend is unavailable.
fn status_error(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Error::new("Rate limit exceeded", ErrorKind::RateLimitExceeded);
    }
    let kind = if status.is_server_error() {
        ErrorKind::Unavailable
    } else {
        ErrorKind::Other
    };
    Error::new(format!("Request failed with {status}: {body}"), kind)
}

async fn send_request(
    client: &Client,
    config: &OpenAIConfig,
    req: &ChatCompletionRequest,
) -> Result<String, Error> {
    let resp = client
        .post(format!("{}{}", config.base_url, "/chat/completions"))
        .header(header::AUTHORIZATION, format!("Bearer {}", config.api_key))
        .header(header::ACCEPT, "application/json")
        .json(req)
        .send()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Unavailable))?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(status_error(status, &body));
    }

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let is_valid_content_type = content_type
        .and_then(|v| v.parse().ok())
        .map(|m: Mime| m.essence_str() == mime::APPLICATION_JSON.essence_str())
        .unwrap_or(false);
    if !is_valid_content_type {
        return Err(Error::new(
            format!("Unexpected content type: {content_type:?}"),
            ErrorKind::InvalidReply,
        ));
    }

    let completion: ChatCompletion = resp
        .json()
        .await
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::InvalidReply))?;
    let Some(choice) = completion.choices.into_iter().next() else {
        return Err(Error::new("The reply has no choices", ErrorKind::InvalidReply));
    };
    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(Error::new(
            "The reply was filtered",
            ErrorKind::Moderated,
        ));
    }
    if let Some(refusal) = choice.message.refusal {
        return Err(Error::new(
            format!("The model refused: {refusal}"),
            ErrorKind::Moderated,
        ));
    }
    Ok(choice.message.content.unwrap_or_default())
}

impl KnowledgeBaseSearcher for OpenAIServices {
    type Error = Error;

    fn search(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Option<KbSearchResult>, Self::Error>>
    + Send
    + 'static {
        let req = prompt::search_request(&self.config, &self.knowledge_base, query);
        let reply_fut = self.complete(req);
        let knowledge_base = Arc::clone(&self.knowledge_base);
        async move {
            let content = reply_fut.await?;
            Ok(parse_reply::<SearchReply>(&content)
                .and_then(|reply| reply.resolve(&knowledge_base)))
        }
        .instrument(debug_span!("openai search"))
    }
}

impl IntentClassifier for OpenAIServices {
    type Error = Error;

    fn classify(
        &self,
        query: &str,
    ) -> impl Future<
        Output = Result<Option<IntentClassification>, Self::Error>,
    > + Send
    + 'static {
        let reply_fut = self.complete(prompt::classify_request(&self.config, query));
        async move {
            let content = reply_fut.await?;
            Ok(parse_reply::<ClassificationReply>(&content)
                .and_then(ClassificationReply::resolve))
        }
        .instrument(debug_span!("openai classify"))
    }
}

impl EscalationAdvisor for OpenAIServices {
    type Error = Error;

    fn advise(
        &self,
        req: &EscalationRequest,
    ) -> impl Future<Output = Result<Option<EscalationDecision>, Self::Error>>
    + Send
    + 'static {
        let reply_fut =
            self.complete(prompt::escalation_request(&self.config, req));
        async move {
            let content = reply_fut.await?;
            Ok(parse_reply::<EscalationReply>(&content)
                .map(EscalationReply::resolve))
        }
        .instrument(debug_span!("openai escalation check"))
    }
}
