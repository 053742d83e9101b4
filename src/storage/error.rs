use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation referenced an info-hash that was never activated.
    #[error("torrent not activated")]
    NotActivated,

    /// A retrieval referenced a piece that is not on disk.
    #[error("piece {0} not stored")]
    PieceNotStored(u32),

    /// The storage actor is gone; its reply channel closed.
    #[error("storage unavailable")]
    Unavailable,
}
