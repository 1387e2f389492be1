//! Main Crate Error

#[derive(thiserror::Error, Debug)]
/// Kadnode crate error enum.
pub enum Error {
    /// Missing key in the store, or a lookup with no candidates at all.
    #[error("Not found")]
    NotFound,

    /// Bad magic, short read, unknown message code or malformed body.
    #[error("Failed to decode message: {0}")]
    Decode(String),

    /// Encoded body exceeds [crate::messages::MAX_PAYLOAD].
    #[error("Message body of {0} bytes exceeds the frame limit")]
    PayloadTooLarge(usize),

    /// Xor distance requested between byte strings of different widths.
    #[error("Can not calculate distance between identifiers of width {0} and {1}")]
    DistanceWidth(usize, usize),

    /// Liveness ping to a bucket's least recently seen contact failed.
    #[error("Liveness probe failed")]
    ProbeFailed,

    /// The reply channel was closed (or timed out) without a value.
    #[error("Mailbox unavailable, the actor or the transport was shutdown")]
    MailboxUnavailable,

    /// Indicates that the Id is not 16 bytes.
    #[error("Invalid Id size, expected 16, got {0}")]
    InvalidIdSize(usize),

    #[error("Invalid Id string: {0}")]
    /// Id string is not in the canonical form.
    InvalidId(#[from] uuid::Error),

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    #[error("Failed to parse payload bytes: {0}")]
    BencodeError(#[from] serde_bencode::Error),
}

/// Alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
