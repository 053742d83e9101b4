use thiserror::Error;

/// Wire-format errors. Any of these on a live stream is fatal for the
/// session that owns it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// A handshake that is not exactly 68 bytes, or a frame whose payload
    /// disagrees with its advertised length.
    #[error("invalid length")]
    InvalidLength,

    /// Bytes that decode to no known handshake or message shape.
    #[error("invalid content")]
    InvalidContent,
}
