use bytes::{Buf, Bytes, BytesMut};

use super::error::CodecError;
use super::message::Message;

/// Decodes every complete frame at the front of `data`.
///
/// Returns the decoded messages in order and the undecoded tail — the
/// bytes of at most one partial frame. A malformed frame aborts the whole
/// decode; callers treat that as fatal for the stream.
pub fn decode_messages(data: &[u8]) -> Result<(Vec<Message>, &[u8]), CodecError> {
    let mut messages = Vec::new();
    let mut rest = data;
    while let Some(frame_len) = complete_frame_len(rest) {
        let payload = Bytes::copy_from_slice(&rest[4..frame_len]);
        messages.push(Message::decode_payload(payload)?);
        rest = &rest[frame_len..];
    }
    Ok((messages, rest))
}

/// Streaming variant over a growing read buffer: consumes every complete
/// frame out of `buf`, leaving the partial tail in place for the next
/// read to extend.
pub fn drain_messages(buf: &mut BytesMut) -> Result<Vec<Message>, CodecError> {
    let mut messages = Vec::new();
    while let Some(frame_len) = complete_frame_len(buf) {
        let mut frame = buf.split_to(frame_len);
        frame.advance(4);
        messages.push(Message::decode_payload(frame.freeze())?);
    }
    Ok(messages)
}

// Total length (prefix included) of the frame at the front of `data`,
// when all of it has arrived.
fn complete_frame_len(data: &[u8]) -> Option<usize> {
    if data.len() < 4 {
        return None;
    }
    let payload_len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    let total = 4 + payload_len;
    (data.len() >= total).then_some(total)
}
