use serde::{Deserialize, Serialize};

/// How a scripted service answers a request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Preset<T> {
    /// Resolves to `Ok(Some(..))`.
    #[serde(rename = "reply")]
    Reply(T),
    /// Resolves to `Ok(None)`.
    #[serde(rename = "no_result")]
    NoResult,
    /// Fails with the given message.
    #[serde(rename = "failure")]
    Failure(String),
    /// Panics with the given message instead of answering.
    #[serde(rename = "panic")]
    Panic(String),
}

impl<T> Preset<T> {
    /// Creates a `Failure` preset.
    #[inline]
    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self::Failure(message.into())
    }
}

impl<T> Default for Preset<T> {
    #[inline]
    fn default() -> Self {
        Self::NoResult
    }
}
