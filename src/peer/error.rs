use thiserror::Error;

/// Errors that terminate a channel and the session that owns it.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] crate::pwp::CodecError),

    #[error("timeout")]
    Timeout,

    #[error("connection closed")]
    Closed,
}

/// Protocol rules a remote peer can break. Each one is reported to the
/// coordinator, which terminates the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
    /// A second `bitfield` message in one session.
    #[error("bitfield sent twice")]
    BitfieldRepeat,

    /// A block request while we are choking the peer.
    #[error("request while choked")]
    RequestWhileChoked,

    /// A block request for a piece our bitfield never announced.
    #[error("request for unannounced piece")]
    RequestUnannounced,

    /// A `piece` message whose body is empty or over the block size.
    #[error("invalid block sent")]
    InvalidBlockSent,

    /// An assembled piece whose SHA-1 does not match the metafile.
    #[error("piece hash mismatch")]
    InvalidPiece,

    /// A `piece` message for a block we never requested.
    #[error("block not requested")]
    BlockNotRequested,
}
