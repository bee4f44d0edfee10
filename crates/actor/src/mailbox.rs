use std::fmt::Debug;

use tokio::sync::{mpsc, watch};

use crate::{Actor, ActorDeadError, State};

/// Object-safe half of [`Message`], so queued messages can be boxed.
pub trait DynMessage<S>: Send + Debug + 'static {
    fn handle_boxed(self: Box<Self>, state: &mut S, handle: &Actor<S>);
}

/// Something an actor with state `S` knows how to react to.
///
/// The actor's task runs one handler at a time. A handler owns the state for
/// its duration, so it must return quickly and leave slow work to tasks it
/// spawns.
pub trait Message<S>: DynMessage<S> {
    /// Applies the message to `state`. `handle` points back at the actor,
    /// for tasks that report their results later.
    fn handle(self, state: &mut S, handle: &Actor<S>);
}

impl<S, M: Message<S>> DynMessage<S> for M {
    #[inline]
    fn handle_boxed(self: Box<Self>, state: &mut S, handle: &Actor<S>) {
        (*self).handle(state, handle)
    }
}

impl<S, M: Message<S> + ?Sized> Message<S> for Box<M> {
    #[inline]
    fn handle(self, state: &mut S, handle: &Actor<S>) {
        self.handle_boxed(state, handle)
    }
}

pub type Envelope<S> = Box<dyn Message<S>>;

/// A fresh mailbox with the receiving ends the actor's task consumes.
pub struct MailboxParts<S> {
    pub mailbox: Mailbox<S>,
    pub msg_rx: mpsc::UnboundedReceiver<Envelope<S>>,
    pub stop_rx: watch::Receiver<bool>,
}

/// Sending side shared by all handles of one actor.
pub struct Mailbox<S> {
    msg_tx: mpsc::UnboundedSender<Envelope<S>>,
    stop_tx: watch::Sender<bool>,
}

impl<S: State> Mailbox<S> {
    #[inline]
    pub fn new() -> MailboxParts<S> {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        MailboxParts {
            mailbox: Mailbox { msg_tx, stop_tx },
            msg_rx,
            stop_rx,
        }
    }

    /// Queues `msg`, failing once the actor's task is gone.
    #[inline]
    pub fn post(&self, msg: Envelope<S>) -> Result<(), ActorDeadError> {
        self.msg_tx.send(msg).map_err(|_| ActorDeadError)
    }

    #[inline]
    pub fn request_stop(&self) {
        // Nobody listens after the task ended, which is fine.
        self.stop_tx.send(true).ok();
    }
}
