//! Contracts between the conversation engine and the services it consults.
//!
//! The engine never talks to a language model or a search index directly.
//! Instead it calls three collaborators: a knowledge base searcher, an intent
//! classifier and an escalation advisor. This crate defines the data they
//! exchange with the engine and the traits they implement, so that backends
//! can be swapped without touching the core.
//!
//! Types in this crate don't define any triage behavior, they are the
//! constraints that the implementors should adhere to. The only exception is
//! [`KnowledgeBase`], the document format shared by the backends.

#![deny(missing_docs)]

mod error;
mod intent;
mod knowledge_base;
mod request;
mod response;
mod service;

pub use error::*;
pub use intent::*;
pub use knowledge_base::*;
pub use request::*;
pub use response::*;
pub use service::*;
