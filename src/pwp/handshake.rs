use bytes::{BufMut, Bytes, BytesMut};

use crate::metainfo::{InfoHash, PeerId};

use super::error::CodecError;

const PROTOCOL: &[u8] = b"BitTorrent protocol";

/// Handshake length on the wire: 1 + 19 + 8 + 20 + 20.
pub const HANDSHAKE_LEN: usize = 68;

/// Encodes the 68-byte handshake. Reserved bytes are all zero; no
/// extensions are negotiated.
pub fn encode_handshake(info_hash: &InfoHash, peer_id: &PeerId) -> Bytes {
    let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
    buf.put_u8(PROTOCOL.len() as u8);
    buf.put_slice(PROTOCOL);
    buf.put_slice(&[0u8; 8]);
    buf.put_slice(info_hash.as_bytes());
    buf.put_slice(peer_id.as_bytes());
    buf.freeze()
}

/// Decodes a handshake.
///
/// # Errors
///
/// [`CodecError::InvalidLength`] unless `data` is exactly 68 bytes;
/// [`CodecError::InvalidContent`] when the protocol identifier does not
/// match. Reserved bytes are accepted as-is since remote clients set
/// extension bits we do not speak.
pub fn decode_handshake(data: &[u8]) -> Result<(InfoHash, PeerId), CodecError> {
    if data.len() != HANDSHAKE_LEN {
        return Err(CodecError::InvalidLength);
    }
    if data[0] as usize != PROTOCOL.len() || &data[1..20] != PROTOCOL {
        return Err(CodecError::InvalidContent);
    }
    let info_hash = InfoHash::from_bytes(&data[28..48]).ok_or(CodecError::InvalidContent)?;
    let peer_id = PeerId::from_bytes(&data[48..68]).ok_or(CodecError::InvalidContent)?;
    Ok((info_hash, peer_id))
}
