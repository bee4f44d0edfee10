//! An out-of-the-box support triage agent.
//!
//! The crate assembles a conversation engine from the environment, with an
//! OpenAI-compatible backend and a markdown knowledge base. It includes a CLI
//! tool for using in the terminal, and can also be used as a library to bring
//! the engine into your own host apps.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod keyword;
mod session;

pub use config::{ConfigError, PLACEHOLDER_API_KEY, SearchMode, Settings};
pub use keyword::{KeywordSearchError, KeywordSearcher};
pub use session::SessionBuilder;

/// Re-exports of [`triage_core`] crate.
pub mod core {
    pub use triage_core::*;
}
