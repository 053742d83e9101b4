//! Peer wire protocol framing.
//!
//! The handshake (a fixed 68-byte exchange) and the length-prefixed
//! message frames that follow it. Both a whole-message codec and a
//! streaming decoder are exposed; the streaming form is what the channel
//! drives, draining every complete frame from a growing buffer and
//! leaving at most one partial frame behind.

mod error;
mod handshake;
mod message;
mod stream;

pub use error::CodecError;
pub use handshake::{decode_handshake, encode_handshake, HANDSHAKE_LEN};
pub use message::Message;
pub use stream::{decode_messages, drain_messages};

#[cfg(test)]
mod tests;
