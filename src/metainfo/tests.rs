use super::*;
use sha1::{Digest, Sha1};

fn single_file_metafile() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(b"d8:announce23:http://tracker/announce4:info");
    data.extend_from_slice(&info_dict());
    data.push(b'e');
    data
}

fn info_dict() -> Vec<u8> {
    // 3 pieces of 16384 bytes, final piece 100 bytes.
    let mut info = Vec::new();
    info.extend_from_slice(b"d6:lengthi32868e4:name8:demo.bin12:piece lengthi16384e6:pieces60:");
    info.extend_from_slice(&[0xaa; 20]);
    info.extend_from_slice(&[0xbb; 20]);
    info.extend_from_slice(&[0xcc; 20]);
    info.push(b'e');
    info
}

#[test]
fn parses_single_file_metafile() {
    let metainfo = Metainfo::from_bytes(&single_file_metafile()).unwrap();
    assert_eq!(metainfo.announce, "http://tracker/announce");
    assert_eq!(metainfo.name, "demo.bin");
    assert_eq!(metainfo.piece_length, 16384);
    assert_eq!(metainfo.piece_count(), 3);
    assert_eq!(metainfo.piece_hashes[1], [0xbb; 20]);
    assert_eq!(metainfo.total_length, 32868);
    assert_eq!(
        metainfo.files,
        vec![File {
            path: "demo.bin".into(),
            length: 32868,
        }]
    );
}

#[test]
fn final_piece_carries_the_remainder() {
    let metainfo = Metainfo::from_bytes(&single_file_metafile()).unwrap();
    assert_eq!(metainfo.piece_size(0), 16384);
    assert_eq!(metainfo.piece_size(1), 16384);
    assert_eq!(metainfo.piece_size(2), 100);

    let info = metainfo.piece_info(2).unwrap();
    assert_eq!(info.index, 2);
    assert_eq!(info.length, 100);
    assert_eq!(info.hash, [0xcc; 20]);
    assert!(metainfo.piece_info(3).is_none());
}

#[test]
fn info_hash_covers_the_raw_info_span() {
    let data = single_file_metafile();
    let metainfo = Metainfo::from_bytes(&data).unwrap();

    let mut hasher = Sha1::new();
    hasher.update(info_dict());
    let expected: [u8; 20] = hasher.finalize().into();
    assert_eq!(*metainfo.info_hash.as_bytes(), expected);
}

#[test]
fn parses_multi_file_layout() {
    let mut data = Vec::new();
    data.extend_from_slice(b"d8:announce23:http://tracker/announce4:info");
    data.extend_from_slice(b"d5:filesl");
    data.extend_from_slice(b"d6:lengthi10e4:pathl3:sub5:a.txtee");
    data.extend_from_slice(b"d6:lengthi6e4:pathl5:b.txtee");
    data.extend_from_slice(b"e4:name4:demo12:piece lengthi16e6:pieces20:");
    data.extend_from_slice(&[0x11; 20]);
    data.extend_from_slice(b"ee");

    let metainfo = Metainfo::from_bytes(&data).unwrap();
    assert_eq!(metainfo.files.len(), 2);
    assert_eq!(metainfo.files[0].path, std::path::PathBuf::from("sub/a.txt"));
    assert_eq!(metainfo.files[0].length, 10);
    assert_eq!(metainfo.files[1].length, 6);
    assert_eq!(metainfo.total_length, 16);
}

#[test]
fn missing_announce_is_an_error() {
    let mut data = Vec::new();
    data.extend_from_slice(b"d4:info");
    data.extend_from_slice(&info_dict());
    data.push(b'e');
    assert!(matches!(
        Metainfo::from_bytes(&data),
        Err(MetainfoError::MissingField("announce"))
    ));
}

#[test]
fn misaligned_piece_hashes_are_rejected() {
    let data =
        b"d8:announce23:http://tracker/announce4:infod6:lengthi5e4:name1:x12:piece lengthi5e6:pieces3:abcee";
    assert!(matches!(
        Metainfo::from_bytes(data),
        Err(MetainfoError::MisalignedPieceHashes)
    ));
}

#[test]
fn peer_id_carries_the_client_prefix() {
    let id = PeerId::generate();
    assert_eq!(&id.as_bytes()[..8], b"-BS0001-");
    assert_ne!(id, PeerId::generate());
}
