use std::fmt;

use rand::Rng as _;
use sha1::{Digest, Sha1};

use crate::constants::CLIENT_PREFIX;

/// The 20-byte SHA-1 identity of a torrent.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InfoHash(pub [u8; 20]);

impl InfoHash {
    /// Hashes a raw bencoded `info` span.
    pub fn from_info_slice(raw_info: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(raw_info);
        Self(hasher.finalize().into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Percent-encodes the hash for tracker announce URLs. Unreserved
    /// characters pass through, everything else becomes `%XX`.
    pub fn url_encode(&self) -> String {
        url_encode_bytes(&self.0)
    }
}

impl fmt::Debug for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InfoHash({})", self.to_hex())
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// A 20-byte peer identity, ours or a remote's.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 20]);

impl PeerId {
    /// Fresh Azureus-style id: client prefix plus random tail.
    pub fn generate() -> Self {
        let mut id = [0u8; 20];
        id[..CLIENT_PREFIX.len()].copy_from_slice(CLIENT_PREFIX);
        rand::rng().fill(&mut id[CLIENT_PREFIX.len()..]);
        Self(id)
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; 20] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn url_encode(&self) -> String {
        url_encode_bytes(&self.0)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0[0] == b'-' && self.0[7] == b'-' {
            if let Ok(client) = std::str::from_utf8(&self.0[1..7]) {
                return write!(f, "PeerId({client})");
            }
        }
        write!(f, "PeerId({:02x?})", &self.0[..8])
    }
}

pub(crate) fn url_encode_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for &b in bytes {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
