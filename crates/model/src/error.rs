use std::fmt::{self, Display};

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content is moderated.
    Moderated,
    /// The backend is rate limited.
    RateLimitExceeded,
    /// The backend could not be reached.
    Unavailable,
    /// The backend replied with something that is not a valid answer.
    InvalidReply,
    /// Any other errors.
    Other,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Moderated => write!(f, "Moderated"),
            ErrorKind::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            ErrorKind::Unavailable => write!(f, "Service unavailable"),
            ErrorKind::InvalidReply => write!(f, "Invalid reply"),
            ErrorKind::Other => write!(f, "Other error"),
        }
    }
}
