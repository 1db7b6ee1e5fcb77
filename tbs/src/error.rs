use crate::broker::Status;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by a TBS session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load broker library {library}")]
    BrokerUnavailable {
        library: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to locate {name}")]
    EntryPointNotFound {
        name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("error calling {entry_point}: {status}")]
    NativeCallFailed {
        entry_point: &'static str,
        status: Status,
    },

    #[error("malformed broker output: expected {expected} bytes, got {actual}")]
    DecodeFailed { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("broker reported a {reported} byte response for a {capacity} byte buffer")]
    ResponseOverflow { reported: usize, capacity: usize },

    #[error("failed to release broker library {library}")]
    ReleaseFailed {
        library: String,
        #[source]
        source: BoxError,
    },

    #[error("session is closed")]
    Closed,

    #[error("invalid broker configuration: {0}")]
    Config(String),
}

impl Error {
    /// The broker status code carried by a failed native call, if any.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::NativeCallFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}
