use std::path::PathBuf;

use crate::bencode::{decode_prefix, BencodeError, Value};

use super::error::MetainfoError;
use super::id::InfoHash;

/// A parsed torrent metafile.
#[derive(Debug, Clone)]
pub struct Metainfo {
    /// Primary tracker announce URL.
    pub announce: String,
    /// Identity of this torrent: SHA-1 of the raw `info` span.
    pub info_hash: InfoHash,
    /// Suggested name for the file or directory.
    pub name: String,
    /// Bytes per piece; the final piece carries the remainder.
    pub piece_length: u32,
    /// SHA-1 hash of every piece, in index order.
    pub piece_hashes: Vec<[u8; 20]>,
    /// Files in layout order. Single-file torrents have exactly one entry
    /// whose path is the torrent name.
    pub files: Vec<File>,
    /// Total content size in bytes.
    pub total_length: u64,
}

/// One file within a torrent, relative to the torrent root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct File {
    pub path: PathBuf,
    pub length: u64,
}

/// Identity and geometry of one piece, as handed to a peer session when a
/// download is assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceInfo {
    pub index: u32,
    pub hash: [u8; 20],
    pub length: u32,
}

impl Metainfo {
    /// Parses a metafile.
    ///
    /// The info-hash is computed over the byte span the `info` value
    /// occupied in `data`, never over a re-encoding.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let (value, used) = decode_prefix(data)?;
        if used != data.len() {
            return Err(MetainfoError::Bencode(BencodeError::PartialDecode));
        }
        let dict = value.as_dict().ok_or(MetainfoError::NotADictionary)?;

        let announce = dict
            .get(b"announce".as_slice())
            .ok_or(MetainfoError::MissingField("announce"))?
            .as_str()
            .ok_or(MetainfoError::InvalidField("announce"))?
            .to_string();

        let raw_info = info_span(data)?;
        let info_hash = InfoHash::from_info_slice(raw_info);

        let info = dict
            .get(b"info".as_slice())
            .ok_or(MetainfoError::MissingField("info"))?;

        let name = info
            .get(b"name")
            .ok_or(MetainfoError::MissingField("name"))?
            .as_str()
            .ok_or(MetainfoError::InvalidField("name"))?
            .to_string();

        let piece_length = info
            .get(b"piece length")
            .and_then(Value::as_integer)
            .filter(|&n| n > 0)
            .ok_or(MetainfoError::InvalidField("piece length"))? as u32;

        let pieces_raw = info
            .get(b"pieces")
            .and_then(Value::as_bytes)
            .ok_or(MetainfoError::MissingField("pieces"))?;
        if pieces_raw.len() % 20 != 0 {
            return Err(MetainfoError::MisalignedPieceHashes);
        }
        let piece_hashes: Vec<[u8; 20]> = pieces_raw
            .chunks_exact(20)
            .map(|chunk| {
                let mut hash = [0u8; 20];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let files = parse_files(info, &name)?;
        let total_length: u64 = files.iter().map(|f| f.length).sum();

        Ok(Self {
            announce,
            info_hash,
            name,
            piece_length,
            piece_hashes,
            files,
            total_length,
        })
    }

    pub fn piece_count(&self) -> u32 {
        self.piece_hashes.len() as u32
    }

    /// Length of the piece at `index`; the final piece carries the
    /// remainder of the total size.
    pub fn piece_size(&self, index: u32) -> u32 {
        let last = self.piece_count().saturating_sub(1);
        if index < last {
            self.piece_length
        } else {
            let remainder = self.total_length % self.piece_length as u64;
            if remainder == 0 {
                self.piece_length
            } else {
                remainder as u32
            }
        }
    }

    pub fn piece_info(&self, index: u32) -> Option<PieceInfo> {
        let hash = *self.piece_hashes.get(index as usize)?;
        Some(PieceInfo {
            index,
            hash,
            length: self.piece_size(index),
        })
    }
}

fn parse_files(info: &Value, name: &str) -> Result<Vec<File>, MetainfoError> {
    if let Some(length) = info.get(b"length").and_then(Value::as_integer) {
        if length < 0 {
            return Err(MetainfoError::InvalidField("length"));
        }
        return Ok(vec![File {
            path: PathBuf::from(name),
            length: length as u64,
        }]);
    }

    let entries = info
        .get(b"files")
        .and_then(Value::as_list)
        .ok_or(MetainfoError::MissingField("length or files"))?;

    let mut files = Vec::with_capacity(entries.len());
    for entry in entries {
        let length = entry
            .get(b"length")
            .and_then(Value::as_integer)
            .filter(|&n| n >= 0)
            .ok_or(MetainfoError::InvalidField("files.length"))?;
        let components = entry
            .get(b"path")
            .and_then(Value::as_list)
            .ok_or(MetainfoError::InvalidField("files.path"))?;
        let mut path = PathBuf::new();
        for component in components {
            path.push(
                component
                    .as_str()
                    .ok_or(MetainfoError::InvalidField("files.path"))?,
            );
        }
        if path.as_os_str().is_empty() {
            return Err(MetainfoError::InvalidField("files.path"));
        }
        files.push(File {
            path,
            length: length as u64,
        });
    }
    if files.is_empty() {
        return Err(MetainfoError::InvalidField("files"));
    }
    Ok(files)
}

// Walks the top-level dictionary entry by entry to find the byte span the
// `info` value occupies in the original input.
fn info_span(data: &[u8]) -> Result<&[u8], MetainfoError> {
    if data.first() != Some(&b'd') {
        return Err(MetainfoError::NotADictionary);
    }
    let mut pos = 1;
    while pos < data.len() && data[pos] != b'e' {
        let (key, key_len) = decode_prefix(&data[pos..])?;
        pos += key_len;
        let value_start = pos;
        let (_, value_len) = decode_prefix(&data[pos..])?;
        pos += value_len;
        if key.as_bytes().map(|b| b.as_ref()) == Some(b"info".as_slice()) {
            return Ok(&data[value_start..value_start + value_len]);
        }
    }
    Err(MetainfoError::MissingField("info"))
}
