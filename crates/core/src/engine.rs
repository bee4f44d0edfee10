mod builder;
mod state;
#[cfg(test)]
mod tests;

use std::collections::HashMap;

use tokio::sync::watch;
use tokio::task::AbortHandle;
use triage_actor::{Actor, ActorDeadError};
use triage_model::Intent;

pub use builder::EngineBuilder;
use state::{
    ConfirmNotResolved, ConfirmResolved, RephraseAfterUnknown, StartNewQuery,
    Submit,
};

use crate::conversation::{Conversation, ConversationView};
use crate::services::Services;

/// A conversation engine, which owns one conversation and resolves the
/// user's queries with the help of its collaborators.
///
/// Actions can be sent at any time, but each of them is only valid in some
/// modes (see [`Mode`](crate::conversation::Mode)). Actions sent in any other
/// mode are ignored. The outcome of an action is observed through the
/// [`ConversationView`] published after it has been handled.
///
/// Cloning an engine yields another handle to the same conversation.
#[derive(Clone)]
pub struct Engine {
    handle: Actor<EngineState>,
    view_rx: watch::Receiver<ConversationView>,
}

impl Engine {
    /// Submits a free-text query.
    ///
    /// Only accepted in the idle mode, and only if the text is not blank.
    #[inline]
    pub fn submit<S: Into<String>>(&self, text: S) -> Result<(), ActorDeadError> {
        self.handle.send(Submit(text.into()))
    }

    /// Abandons the current exchange and asks for the next question.
    ///
    /// Accepted in every mode except the configuration error. A query that is
    /// still being processed is dropped, and whatever its collaborators
    /// answer later is ignored.
    #[inline]
    pub fn start_new_query(&self) -> Result<(), ActorDeadError> {
        self.handle.send(StartNewQuery)
    }

    /// Tells the engine that its last reply resolved the issue.
    #[inline]
    pub fn confirm_resolved(&self) -> Result<(), ActorDeadError> {
        self.handle.send(ConfirmResolved)
    }

    /// Tells the engine that its last reply did not resolve the issue.
    #[inline]
    pub fn confirm_not_resolved(&self) -> Result<(), ActorDeadError> {
        self.handle.send(ConfirmNotResolved)
    }

    /// Asks to rephrase a query the engine could not help with.
    #[inline]
    pub fn rephrase_after_unknown(&self) -> Result<(), ActorDeadError> {
        self.handle.send(RephraseAfterUnknown)
    }

    /// Returns the latest view of the conversation.
    #[inline]
    pub fn view(&self) -> ConversationView {
        self.view_rx.borrow().clone()
    }

    /// Returns a receiver that is notified whenever the view changes.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<ConversationView> {
        self.view_rx.clone()
    }

    /// Stops the engine.
    ///
    /// Requests that are still in flight are aborted, and every action sent
    /// afterwards fails with [`ActorDeadError`].
    #[inline]
    pub fn shutdown(&self) {
        self.handle.stop();
    }
}

impl Engine {
    fn spawn_from_builder(builder: EngineBuilder) -> Self {
        let EngineBuilder { services, greeting } = builder;

        let (services, conversation) = match services {
            Ok(services) => (Some(services), Conversation::greeted(&greeting)),
            Err(reason) => {
                warn!("starting a misconfigured engine: {reason}");
                (None, Conversation::misconfigured(reason))
            }
        };
        let (view_tx, view_rx) =
            watch::channel(ConversationView::new(&conversation, false));

        let state = EngineState {
            services,
            conversation,
            pipeline: None,
            escalation: None,
            deferred_query: None,
            running_tasks: Default::default(),
            next_task_id: 1,
            view_tx,
        };
        Self {
            handle: Actor::spawn(state, Some("engine")),
            view_rx,
        }
    }
}

/// The state behind an [`Engine`].
///
/// `services` is `None` exactly when the conversation is in the
/// configuration error mode.
pub(crate) struct EngineState {
    services: Option<Services>,
    conversation: Conversation,
    pipeline: Option<PipelineRun>,
    escalation: Option<PendingEscalation>,
    deferred_query: Option<String>,
    running_tasks: HashMap<u64, AbortHandle>,
    next_task_id: u64,
    view_tx: watch::Sender<ConversationView>,
}

/// The query being resolved, and the task currently working on it.
struct PipelineRun {
    task_id: u64,
    query: String,
}

/// An escalation check running in the background.
struct PendingEscalation {
    task_id: u64,
    intent: Intent,
    topic: Option<String>,
}
