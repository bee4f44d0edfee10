use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, watch};

use crate::mailbox::{Envelope, Mailbox};
use crate::{Actor, Message, State};

/// Body of an actor's task: hands each queued message to the state, then
/// lets the state settle, until a stop is requested or every handle is gone.
pub async fn run_actor<S: State>(
    mailbox: Weak<Mailbox<S>>,
    mut state: S,
    mut msg_rx: mpsc::UnboundedReceiver<Envelope<S>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    debug!("actor running");
    loop {
        // A stop request wins over queued messages.
        let msg = select! {
            biased;

            changed = stop_rx.changed() => {
                if changed.is_ok() {
                    debug!("stop requested");
                }
                break;
            }
            msg = msg_rx.recv() => {
                let Some(msg) = msg else {
                    break;
                };
                msg
            }
        };
        trace!("dequeued {msg:?}");

        let Some(mailbox) = mailbox.upgrade() else {
            warn!("no handles left, dropping {msg:?}");
            break;
        };
        let handle = Actor::from_mailbox(mailbox);

        trace_span!("handle msg").in_scope(|| {
            msg.handle(&mut state, &handle);
            state.settle();
            trace!("settled");
        });
    }
    debug!("actor exiting, dropping its state");
}
