use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    /// A complete value was decoded but bytes remained after it.
    #[error("trailing bytes after value")]
    PartialDecode,

    /// The input ended inside a value.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// A byte that cannot start or continue a value at this position.
    #[error("unexpected byte {0:#04x}")]
    UnexpectedByte(u8),

    /// An integer with a malformed body (empty, leading zeros, `-0`).
    #[error("invalid integer")]
    InvalidInteger,

    /// A string length prefix that is not a decimal number.
    #[error("invalid string length")]
    InvalidStringLength,

    /// Too many nested containers.
    #[error("nesting too deep")]
    NestingTooDeep,
}
