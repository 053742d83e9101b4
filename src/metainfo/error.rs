use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetainfoError {
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    #[error("metafile is not a dictionary")]
    NotADictionary,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The `pieces` string is not a multiple of 20 bytes.
    #[error("piece hashes are not 20-byte aligned")]
    MisalignedPieceHashes,
}
