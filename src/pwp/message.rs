use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::CodecError;

const ID_CHOKE: u8 = 0;
const ID_UNCHOKE: u8 = 1;
const ID_INTERESTED: u8 = 2;
const ID_UNINTERESTED: u8 = 3;
const ID_HAVE: u8 = 4;
const ID_BITFIELD: u8 = 5;
const ID_REQUEST: u8 = 6;
const ID_PIECE: u8 = 7;
const ID_CANCEL: u8 = 8;

/// A peer wire protocol message.
///
/// On the wire each message is a 4-byte big-endian length followed by a
/// 1-byte id and payload; a zero length is a keep-alive with no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    KeepAlive,
    Choke,
    Unchoke,
    Interested,
    Uninterested,
    Have { index: u32 },
    Bitfield(Bytes),
    Request { index: u32, offset: u32, length: u32 },
    Piece { index: u32, offset: u32, data: Bytes },
    Cancel { index: u32, offset: u32, length: u32 },
}

impl Message {
    /// Encodes the message with its length prefix. Total on the variant
    /// set: every message value has a wire form.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Message::KeepAlive => buf.put_u32(0),
            Message::Choke => encode_bare(&mut buf, ID_CHOKE),
            Message::Unchoke => encode_bare(&mut buf, ID_UNCHOKE),
            Message::Interested => encode_bare(&mut buf, ID_INTERESTED),
            Message::Uninterested => encode_bare(&mut buf, ID_UNINTERESTED),
            Message::Have { index } => {
                buf.put_u32(5);
                buf.put_u8(ID_HAVE);
                buf.put_u32(*index);
            }
            Message::Bitfield(bits) => {
                buf.put_u32(1 + bits.len() as u32);
                buf.put_u8(ID_BITFIELD);
                buf.put_slice(bits);
            }
            Message::Request {
                index,
                offset,
                length,
            } => encode_triple(&mut buf, ID_REQUEST, *index, *offset, *length),
            Message::Piece {
                index,
                offset,
                data,
            } => {
                buf.put_u32(9 + data.len() as u32);
                buf.put_u8(ID_PIECE);
                buf.put_u32(*index);
                buf.put_u32(*offset);
                buf.put_slice(data);
            }
            Message::Cancel {
                index,
                offset,
                length,
            } => encode_triple(&mut buf, ID_CANCEL, *index, *offset, *length),
        }
        buf.freeze()
    }

    /// Decodes one frame payload (the bytes after the length prefix).
    ///
    /// The caller guarantees `payload.len()` equals the advertised frame
    /// length; this checks that the id agrees with that length.
    pub fn decode_payload(mut payload: Bytes) -> Result<Self, CodecError> {
        if payload.is_empty() {
            return Ok(Message::KeepAlive);
        }
        let id = payload.get_u8();
        let body = payload.remaining();
        match id {
            ID_CHOKE | ID_UNCHOKE | ID_INTERESTED | ID_UNINTERESTED => {
                if body != 0 {
                    return Err(CodecError::InvalidLength);
                }
                Ok(match id {
                    ID_CHOKE => Message::Choke,
                    ID_UNCHOKE => Message::Unchoke,
                    ID_INTERESTED => Message::Interested,
                    _ => Message::Uninterested,
                })
            }
            ID_HAVE => {
                if body != 4 {
                    return Err(CodecError::InvalidLength);
                }
                Ok(Message::Have {
                    index: payload.get_u32(),
                })
            }
            ID_BITFIELD => Ok(Message::Bitfield(payload)),
            ID_REQUEST | ID_CANCEL => {
                if body != 12 {
                    return Err(CodecError::InvalidLength);
                }
                let index = payload.get_u32();
                let offset = payload.get_u32();
                let length = payload.get_u32();
                Ok(if id == ID_REQUEST {
                    Message::Request {
                        index,
                        offset,
                        length,
                    }
                } else {
                    Message::Cancel {
                        index,
                        offset,
                        length,
                    }
                })
            }
            ID_PIECE => {
                if body < 8 {
                    return Err(CodecError::InvalidLength);
                }
                let index = payload.get_u32();
                let offset = payload.get_u32();
                Ok(Message::Piece {
                    index,
                    offset,
                    data: payload,
                })
            }
            _ => Err(CodecError::InvalidContent),
        }
    }
}

fn encode_bare(buf: &mut BytesMut, id: u8) {
    buf.put_u32(1);
    buf.put_u8(id);
}

fn encode_triple(buf: &mut BytesMut, id: u8, index: u32, offset: u32, length: u32) {
    buf.put_u32(13);
    buf.put_u8(id);
    buf.put_u32(index);
    buf.put_u32(offset);
    buf.put_u32(length);
}
