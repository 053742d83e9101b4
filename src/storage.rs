//! Piece persistence.
//!
//! A single storage actor owns all disk I/O under its base directory.
//! Pieces live one file each at `<base>/<dir_name>/<index>.piece` until a
//! completed torrent is composed into its final file layout. Callers
//! never block on disk: store and retrieve hand back a oneshot receiver
//! that the caller forwards into its own mailbox as an event.

mod actor;
mod error;

pub use actor::{Storage, StorageHandle};
pub use error::StorageError;
