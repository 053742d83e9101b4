//! Torrent metafile handling.
//!
//! Parses `.torrent` files into [`Metainfo`] and computes the info-hash
//! over the raw bencoded `info` span, exactly as it appeared in the
//! metafile. Re-encoding is not equivalent: a non-canonical source would
//! produce a different hash and a different torrent identity.

mod error;
mod id;
mod torrent;

pub use error::MetainfoError;
pub use id::{InfoHash, PeerId};
pub use torrent::{File, Metainfo, PieceInfo};

#[cfg(test)]
mod tests;
