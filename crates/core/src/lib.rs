//! The conversation engine of the support desk.
//!
//! The engine turns one user query into a knowledge base lookup, an intent
//! classification, a reply, a resolution-confirmation gate and an escalation
//! check. It owns the conversation state and talks to the outside world only
//! through the collaborator traits of `triage_model`.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod conversation;
mod engine;
pub mod resolution;
mod services;

pub use engine::{Engine, EngineBuilder};
pub use triage_actor::ActorDeadError;
