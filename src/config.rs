//! Runtime configuration.

use std::path::PathBuf;

use crate::constants::{
    DEFAULT_PORT, INITIAL_BATCH_PER_PEER, MAX_ACCEPTED_PEERS, MAX_ASSIGNED_PER_PEER,
    MAX_INITIATED_PEERS, MAX_PEERS_PER_PIECE, NUMWANT, PIECE_CACHE_CAPACITY,
};

/// Client-wide settings. `Config::default()` mirrors `constants`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port announced to trackers and bound by the listener.
    pub listen_port: u16,
    /// Base directory for piece storage and composed files.
    pub download_dir: PathBuf,
    /// Cap on outbound peer connections per torrent.
    pub max_initiated_peers: usize,
    /// Cap on inbound peer connections per torrent.
    pub max_accepted_peers: usize,
    /// Byte capacity of the per-torrent piece cache.
    pub piece_cache_capacity: usize,
    /// Peers requested per tracker announce.
    pub numwant: u32,
    /// Cap on concurrently assigned pieces per peer.
    pub max_assigned_per_peer: usize,
    /// Cap on peers concurrently assigned one piece.
    pub max_peers_per_piece: usize,
    /// Pieces assigned when a peer's bitfield first arrives.
    pub initial_batch_per_peer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: DEFAULT_PORT,
            download_dir: PathBuf::from("downloads"),
            max_initiated_peers: MAX_INITIATED_PEERS,
            max_accepted_peers: MAX_ACCEPTED_PEERS,
            piece_cache_capacity: PIECE_CACHE_CAPACITY,
            numwant: NUMWANT,
            max_assigned_per_peer: MAX_ASSIGNED_PER_PEER,
            max_peers_per_piece: MAX_PEERS_PER_PIECE,
            initial_batch_per_peer: INITIAL_BATCH_PER_PEER,
        }
    }
}
