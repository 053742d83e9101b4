use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use crate::peer::Bitfield;

/// Torrent-wide piece state: what is missing, who has what, and what is
/// on its way to disk. Owned exclusively by the coordinator.
#[derive(Debug)]
pub struct PieceTracker {
    missing: HashSet<u32>,
    /// piece index -> peers that announced it
    possession: HashMap<u32, HashSet<SocketAddr>>,
    /// peer -> piece indexes it announced
    per_peer: HashMap<SocketAddr, HashSet<u32>>,
    /// piece index -> the peer that downloaded it, while storage runs
    storing: HashMap<u32, SocketAddr>,
}

impl PieceTracker {
    /// Starts with `missing` as the set of pieces we do not hold yet.
    pub fn new<I: IntoIterator<Item = u32>>(missing: I) -> Self {
        Self {
            missing: missing.into_iter().collect(),
            possession: HashMap::new(),
            per_peer: HashMap::new(),
            storing: HashMap::new(),
        }
    }

    pub fn is_missing(&self, index: u32) -> bool {
        self.missing.contains(&index)
    }

    /// Whether any possession info for `peer` has been recorded.
    pub fn has_possession_info(&self, peer: &SocketAddr) -> bool {
        self.per_peer.contains_key(peer)
    }

    /// Merges a peer's bitfield into the possession maps.
    pub fn update_with_bitfield(&mut self, peer: SocketAddr, bitfield: &Bitfield) {
        let indexes = bitfield.indexes();
        for &index in &indexes {
            self.possession.entry(index).or_default().insert(peer);
        }
        self.per_peer.entry(peer).or_default().extend(indexes);
    }

    /// Records a single announced piece.
    pub fn update_with_index(&mut self, peer: SocketAddr, index: u32) {
        self.possession.entry(index).or_default().insert(peer);
        self.per_peer.entry(peer).or_default().insert(index);
    }

    /// Moves a piece from missing to storing, remembering who delivered
    /// it.
    pub fn mark_piece_as_storing(&mut self, index: u32, downloader: SocketAddr) {
        self.missing.remove(&index);
        self.storing.insert(index, downloader);
    }

    /// Whether this piece is currently being written to disk.
    pub fn is_storing(&self, index: u32) -> bool {
        self.storing.contains_key(&index)
    }

    /// Completes a store, returning the peer that downloaded the piece.
    pub fn remove_storing_piece(&mut self, index: u32) -> Option<SocketAddr> {
        self.storing.remove(&index)
    }

    /// Number of peers known to hold `index`.
    pub fn possession_count(&self, index: u32) -> usize {
        self.possession.get(&index).map_or(0, HashSet::len)
    }

    /// Missing pieces this peer has announced.
    pub fn missing_held_by(&self, peer: &SocketAddr) -> Vec<u32> {
        self.per_peer
            .get(peer)
            .map(|held| {
                held.iter()
                    .filter(|index| self.missing.contains(index))
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove_peer(&mut self, peer: &SocketAddr) {
        if let Some(held) = self.per_peer.remove(peer) {
            for index in held {
                if let Some(holders) = self.possession.get_mut(&index) {
                    holders.remove(peer);
                    if holders.is_empty() {
                        self.possession.remove(&index);
                    }
                }
            }
        }
    }

    pub fn missing_count(&self) -> usize {
        self.missing.len()
    }

    /// True once nothing is missing and nothing is still being stored.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.storing.is_empty()
    }
}
