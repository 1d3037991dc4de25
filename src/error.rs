//! Error types for remoting-core.

use thiserror::Error;

/// Main error type for all lifecycle and reply-correlation operations.
#[derive(Debug, Error)]
pub enum RemotingError {
    /// A precondition violation detected at the call that violates it
    /// (out-of-range identifier, malformed wire field). Never retried.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation required an open resource that has already closed.
    #[error("not open: {0}")]
    NotOpen(String),

    /// The true outcome of a request could not be determined, typically
    /// because the resource closed mid-flight. Deliberately distinct from an
    /// explicit failure outcome.
    #[error("indeterminate outcome: {0}")]
    IndeterminateOutcome(String),

    /// Generic transport failure (peer gone, channel torn down, caller
    /// disappeared).
    #[error("transport error: {0}")]
    Transport(String),

    /// I/O error surfaced by a collaborator during teardown.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemotingError {
    /// Whether this error means the outcome is unknown rather than failed.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, RemotingError::IndeterminateOutcome(_))
    }
}

/// Result type alias using RemotingError.
pub type Result<T> = std::result::Result<T, RemotingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indeterminate_is_distinct_from_transport() {
        let unknown = RemotingError::IndeterminateOutcome("closed mid-flight".into());
        let failed = RemotingError::Transport("peer reset".into());

        assert!(unknown.is_indeterminate());
        assert!(!failed.is_indeterminate());
    }

    #[test]
    fn test_display_messages() {
        let err = RemotingError::NotOpen("connection is not open".into());
        assert_eq!(err.to_string(), "not open: connection is not open");

        let err = RemotingError::InvalidArgument("id out of range".into());
        assert!(err.to_string().starts_with("invalid argument"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: RemotingError = io.into();
        assert!(matches!(err, RemotingError::Io(_)));
    }
}
