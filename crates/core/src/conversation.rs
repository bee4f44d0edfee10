//! Conversation-related types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use triage_model::Intent;
use uuid::Uuid;

/// Who a message comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person asking for help.
    User,
    /// The support agent, i.e. the engine speaking to the user.
    Agent,
    /// Bookkeeping about what the engine did, e.g. how a query was
    /// classified or that something failed.
    System,
}

/// An entry in the conversation log.
///
/// Messages are never changed once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    id: Uuid,
    text: String,
    sender: Sender,
    timestamp: DateTime<Utc>,
    intent: Option<Intent>,
    topic: Option<String>,
}

impl Message {
    pub(crate) fn new<S: Into<String>>(sender: Sender, text: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
            intent: None,
            topic: None,
        }
    }

    #[inline]
    pub(crate) fn with_intent(mut self, intent: Option<Intent>) -> Self {
        self.intent = intent;
        self
    }

    #[inline]
    pub(crate) fn with_topic(mut self, topic: Option<String>) -> Self {
        self.topic = topic;
        self
    }

    /// Returns the unique id of this message.
    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the display text.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns who sent this message.
    #[inline]
    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// Returns when this message was appended.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns the intent this message is associated with, if any.
    #[inline]
    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    /// Returns the topic label, if any.
    #[inline]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }
}

/// The interaction mode, derived from the conversation flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// The backend is not configured. Nothing is accepted, ever.
    ConfigurationError,
    /// Free-text input is accepted.
    Idle,
    /// A query is being resolved.
    Processing,
    /// The last reply could not help. Only "rephrase" is offered.
    AwaitingConfirmationUnknown,
    /// The last reply may have helped. "Resolved" and "not resolved" are
    /// offered.
    AwaitingConfirmationResolved,
    /// Resolving the last query failed. Only "start new query" is offered.
    Inactive,
}

/// The state of one conversation.
#[derive(Clone, Debug, Default)]
pub(crate) struct Conversation {
    messages: Vec<Message>,
    pub(crate) is_loading: bool,
    pub(crate) is_active: bool,
    pub(crate) awaiting_confirmation: bool,
    pub(crate) last_agent_intent: Option<Intent>,
    pub(crate) configuration_error: Option<String>,
}

impl Conversation {
    /// A conversation that is ready for the first query.
    pub(crate) fn greeted(greeting: &str) -> Self {
        let mut conversation = Self {
            is_active: true,
            ..Default::default()
        };
        conversation.push(
            Message::new(Sender::Agent, greeting)
                .with_intent(Some(Intent::Unknown)),
        );
        conversation
    }

    /// A conversation that can never start.
    pub(crate) fn misconfigured(reason: String) -> Self {
        let mut conversation = Self::default();
        conversation.push(
            Message::new(Sender::System, reason.as_str())
                .with_intent(Some(Intent::Unknown)),
        );
        conversation.configuration_error = Some(reason);
        conversation
    }

    #[inline]
    pub(crate) fn push(&mut self, msg: Message) {
        trace!("appending {:?} message: {}", msg.sender, msg.text);
        self.messages.push(msg);
    }

    #[inline]
    pub(crate) fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Leaves any confirmation gate and accepts free text again.
    pub(crate) fn reopen(&mut self) {
        self.awaiting_confirmation = false;
        self.last_agent_intent = None;
        self.is_active = true;
        self.is_loading = false;
    }

    pub(crate) fn mode(&self) -> Mode {
        if self.configuration_error.is_some() {
            return Mode::ConfigurationError;
        }
        if self.is_loading {
            return Mode::Processing;
        }
        if self.awaiting_confirmation {
            match self.last_agent_intent {
                Some(Intent::Unknown) => {
                    return Mode::AwaitingConfirmationUnknown;
                }
                Some(_) => return Mode::AwaitingConfirmationResolved,
                None => {}
            }
        }
        if self.is_active {
            Mode::Idle
        } else {
            Mode::Inactive
        }
    }
}

/// What a presentation layer needs to render a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationView {
    /// The whole message log, oldest first.
    pub messages: Vec<Message>,
    /// The current interaction mode.
    pub mode: Mode,
    /// Whether a query is being resolved.
    pub is_loading: bool,
    /// Whether the conversation accepts queries at all.
    pub is_conversation_active: bool,
    /// Whether the engine waits for a verdict on its last reply.
    pub awaiting_resolution_confirmation: bool,
    /// The intent of the most recent reply, until the user moves on.
    pub last_agent_intent: Option<Intent>,
    /// Whether the free-text input should be enabled.
    pub input_enabled: bool,
    /// Whether the "rephrase" action should be shown.
    pub show_rephrase: bool,
    /// Whether the "resolved" / "not resolved" actions should be shown.
    pub show_resolution_actions: bool,
    /// Whether "start new query" is the only way to continue.
    pub show_start_new_query: bool,
    /// Whether an escalation check is still running in the background.
    pub escalation_pending: bool,
    /// The banner text of a configuration error.
    pub configuration_error: Option<String>,
    /// Increases every time the view changes.
    pub revision: u64,
}

impl ConversationView {
    pub(crate) fn new(
        conversation: &Conversation,
        escalation_pending: bool,
    ) -> Self {
        let mode = conversation.mode();
        Self {
            messages: conversation.messages().to_vec(),
            mode,
            is_loading: conversation.is_loading,
            is_conversation_active: conversation.is_active,
            awaiting_resolution_confirmation: conversation
                .awaiting_confirmation,
            last_agent_intent: conversation.last_agent_intent,
            input_enabled: mode == Mode::Idle,
            show_rephrase: mode == Mode::AwaitingConfirmationUnknown,
            show_resolution_actions: mode
                == Mode::AwaitingConfirmationResolved,
            show_start_new_query: mode == Mode::Inactive,
            escalation_pending,
            configuration_error: conversation.configuration_error.clone(),
            revision: 0,
        }
    }

    /// Whether nothing is running in the background for this conversation.
    #[inline]
    pub fn is_settled(&self) -> bool {
        !self.is_loading && !self.escalation_pending
    }

    /// Returns the messages appended after the first `count` ones.
    #[inline]
    pub fn messages_since(&self, count: usize) -> &[Message] {
        self.messages.get(count..).unwrap_or_default()
    }
}
