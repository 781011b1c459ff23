//! Error types for protocol parsing.

/// Result type alias for protocol parsing.
pub type Result<T> = std::result::Result<T, Error>;

/// Protocol parse errors.
///
/// Every variant is recoverable: the filter counts the error, drops the
/// offending line from correlation, and keeps forwarding traffic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Command line contained no verb token.
    #[error("empty command line")]
    EmptyCommand,

    /// Command verb token was not valid UTF-8.
    #[error("command verb is not valid UTF-8")]
    InvalidVerb,

    /// Reply line was shorter than a 3-digit code.
    #[error("reply line too short: {0:?}")]
    ReplyTooShort(String),

    /// Reply line did not start with a 3-digit code in 100..=599.
    #[error("invalid reply code: {0:?}")]
    InvalidReplyCode(String),

    /// Byte after the reply code was neither SP, `-`, nor end of line.
    #[error("invalid reply separator: {0:?}")]
    InvalidReplySeparator(char),

    /// A logical reply exceeded the accumulated line cap.
    #[error("multi-line reply exceeded {0} lines")]
    ReplyTooLong(usize),
}
