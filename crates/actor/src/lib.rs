//! A lightweight actor runtime.
//!
//! An actor owns a piece of state on its own task. Everybody else holds an
//! [`Actor`] handle and mutates the state by sending [`Message`]s, which are
//! handled strictly one after another.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod scheduler;

pub use error::ActorDeadError;
pub use handle::Actor;
pub use mailbox::Message;

/// State owned by an actor.
pub trait State: Send + Sized + 'static {
    /// Called after every handled message, before the next one is received.
    ///
    /// Typically used to publish a snapshot of the state to observers.
    #[inline]
    fn settle(&mut self) {}
}
