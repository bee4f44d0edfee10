use std::sync::Arc;

use tracing::Instrument;

use crate::mailbox::{Mailbox, MailboxParts};
use crate::scheduler::run_actor;
use crate::{ActorDeadError, Message, State};

/// The address of a running actor, used to queue messages for it.
///
/// Clones point at the same actor. Once the last clone is dropped or
/// [`Actor::stop`] is called, the actor exits and drops its state.
pub struct Actor<S> {
    mailbox: Arc<Mailbox<S>>,
}

impl<S: State> Actor<S> {
    /// Moves `state` onto a new tokio task and returns the first handle to
    /// it. `label` tags the actor's tracing span.
    ///
    /// Panics outside a tokio runtime, like [`tokio::spawn`].
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let MailboxParts {
            mailbox,
            msg_rx,
            stop_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_actor(Arc::downgrade(&mailbox), state, msg_rx, stop_rx)
                .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox }
    }

    #[inline]
    pub(crate) fn from_mailbox(mailbox: Arc<Mailbox<S>>) -> Self {
        Self { mailbox }
    }

    /// Queues `msg` behind the messages already waiting. Never blocks.
    #[inline]
    pub fn send<M: Message<S> + 'static>(
        &self,
        msg: M,
    ) -> Result<(), ActorDeadError> {
        self.mailbox.post(Box::new(msg))
    }

    /// Shuts the actor down.
    ///
    /// A handler already running completes. Messages still queued are
    /// dropped unhandled, and later sends fail with [`ActorDeadError`].
    #[inline]
    pub fn stop(&self) {
        self.mailbox.request_stop();
    }
}

impl<S> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}
