use bytes::Bytes;

use crate::metainfo::{InfoHash, PeerId};

use super::*;

#[test]
fn handshake_wire_layout() {
    let info_hash = InfoHash([0x02; 20]);
    let peer_id = PeerId([0x01; 20]);

    let encoded = encode_handshake(&info_hash, &peer_id);
    assert_eq!(encoded.len(), HANDSHAKE_LEN);

    let mut expected = vec![19u8];
    expected.extend_from_slice(b"BitTorrent protocol");
    expected.extend_from_slice(&[0u8; 8]);
    expected.extend_from_slice(&[0x02; 20]);
    expected.extend_from_slice(&[0x01; 20]);
    assert_eq!(&encoded[..], &expected[..]);
}

#[test]
fn handshake_roundtrip() {
    let info_hash = InfoHash([0xab; 20]);
    let peer_id = PeerId([0xcd; 20]);
    let (h, p) = decode_handshake(&encode_handshake(&info_hash, &peer_id)).unwrap();
    assert_eq!(h, info_hash);
    assert_eq!(p, peer_id);
}

#[test]
fn handshake_rejects_bad_input() {
    assert_eq!(
        decode_handshake(&[0u8; 67]),
        Err(CodecError::InvalidLength)
    );
    assert_eq!(
        decode_handshake(&[0u8; 69]),
        Err(CodecError::InvalidLength)
    );
    let mut garbage = [0u8; 68];
    garbage[0] = 19;
    assert_eq!(decode_handshake(&garbage), Err(CodecError::InvalidContent));
}

fn sample_messages() -> Vec<Message> {
    vec![
        Message::Have { index: 5 },
        Message::Bitfield(Bytes::from_static(b"bitfield_data")),
        Message::Choke,
        Message::Request {
            index: 5,
            offset: 10,
            length: 15,
        },
        Message::Interested,
        Message::Cancel {
            index: 5,
            offset: 10,
            length: 15,
        },
        Message::Uninterested,
        Message::Piece {
            index: 5,
            offset: 10,
            data: Bytes::from_static(b"test_block"),
        },
        Message::Have { index: 30 },
        Message::KeepAlive,
        Message::Unchoke,
        Message::Request {
            index: 100,
            offset: 200,
            length: 300,
        },
    ]
}

#[test]
fn every_message_roundtrips() {
    for message in sample_messages() {
        let encoded = message.encode();
        let (decoded, rest) = decode_messages(&encoded).unwrap();
        assert!(rest.is_empty());
        assert_eq!(decoded, vec![message]);
    }
}

#[test]
fn streaming_decode_returns_messages_and_tail() {
    let messages = sample_messages();
    let mut wire = Vec::new();
    for message in &messages {
        wire.extend_from_slice(&message.encode());
    }
    wire.extend_from_slice(b"leftover");

    let (decoded, rest) = decode_messages(&wire).unwrap();
    assert_eq!(decoded, messages);
    assert_eq!(rest, b"leftover");
}

#[test]
fn drain_keeps_the_partial_frame() {
    use bytes::BytesMut;

    let mut buf = BytesMut::new();
    buf.extend_from_slice(&Message::Unchoke.encode());
    buf.extend_from_slice(&Message::Have { index: 7 }.encode());
    buf.extend_from_slice(&[0, 0, 0, 5, 4]); // have frame missing its index

    let drained = drain_messages(&mut buf).unwrap();
    assert_eq!(drained, vec![Message::Unchoke, Message::Have { index: 7 }]);
    assert_eq!(&buf[..], &[0, 0, 0, 5, 4]);

    buf.extend_from_slice(&9u32.to_be_bytes());
    let drained = drain_messages(&mut buf).unwrap();
    assert_eq!(drained, vec![Message::Have { index: 9 }]);
    assert!(buf.is_empty());
}

#[test]
fn frames_disagreeing_with_their_id_are_errors() {
    // have with a 2-byte body
    let bad_have = [0, 0, 0, 3, 4, 0, 1];
    assert_eq!(decode_messages(&bad_have), Err(CodecError::InvalidLength));

    // choke with a payload
    let fat_choke = [0, 0, 0, 2, 0, 9];
    assert_eq!(decode_messages(&fat_choke), Err(CodecError::InvalidLength));

    // request advertising 13 bytes but carrying 10
    let short_request = [0, 0, 0, 10, 6, 0, 0, 0, 1, 0, 0, 0, 2, 0];
    assert_eq!(
        decode_messages(&short_request),
        Err(CodecError::InvalidLength)
    );

    // unknown id
    let unknown = [0, 0, 0, 1, 42];
    assert_eq!(decode_messages(&unknown), Err(CodecError::InvalidContent));
}

#[test]
fn piece_payload_shorter_than_header_is_an_error() {
    let truncated_piece = [0, 0, 0, 6, 7, 0, 0, 0, 1, 0];
    assert_eq!(
        decode_messages(&truncated_piece),
        Err(CodecError::InvalidLength)
    );
}
