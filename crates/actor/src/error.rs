use std::error::Error;
use std::fmt;

/// The actor behind a handle no longer runs, so the message was not queued.
///
/// This happens after [`Actor::stop`](crate::Actor::stop), or when the
/// actor's task ended for any other reason.
pub struct ActorDeadError;

impl fmt::Debug for ActorDeadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActorDeadError")
    }
}

impl fmt::Display for ActorDeadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("message sent to a stopped actor")
    }
}

impl Error for ActorDeadError {}
