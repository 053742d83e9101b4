use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

/// Which peer is downloading which piece, bounded in both directions.
///
/// `max_assigned_per_peer` keeps one peer from hoarding work it may never
/// deliver; `max_peers_per_piece` bounds duplicated downloads of one
/// piece.
#[derive(Debug)]
pub struct PieceAssigner {
    max_assigned_per_peer: usize,
    max_peers_per_piece: usize,
    initial_batch_per_peer: usize,
    per_peer: HashMap<SocketAddr, HashSet<u32>>,
    per_piece: HashMap<u32, HashSet<SocketAddr>>,
}

impl PieceAssigner {
    pub fn new(
        max_assigned_per_peer: usize,
        max_peers_per_piece: usize,
        initial_batch_per_peer: usize,
    ) -> Self {
        Self {
            max_assigned_per_peer,
            max_peers_per_piece,
            initial_batch_per_peer,
            per_peer: HashMap::new(),
            per_piece: HashMap::new(),
        }
    }

    /// Assigns pieces from `candidates` (in the given order) to a peer
    /// whose bitfield just arrived. Returns the subset actually assigned:
    /// at most the initial batch, subject to both caps.
    pub fn assign_initial(&mut self, candidates: &[u32], peer: SocketAddr) -> Vec<u32> {
        let mut assigned = Vec::new();
        for &index in candidates {
            if assigned.len() >= self.initial_batch_per_peer {
                break;
            }
            if self.assign(index, peer) {
                assigned.push(index);
            }
        }
        assigned
    }

    /// Assigns one piece to one peer unless a cap is hit or the pair
    /// already exists. Returns whether the assignment was made.
    pub fn assign(&mut self, index: u32, peer: SocketAddr) -> bool {
        let peer_load = self.per_peer.get(&peer).map_or(0, HashSet::len);
        if peer_load >= self.max_assigned_per_peer {
            return false;
        }
        let piece_spread = self.per_piece.get(&index).map_or(0, HashSet::len);
        if piece_spread >= self.max_peers_per_piece {
            return false;
        }
        let inserted = self.per_peer.entry(peer).or_default().insert(index);
        if inserted {
            self.per_piece.entry(index).or_default().insert(peer);
        }
        inserted
    }

    /// The peers a piece is assigned to.
    pub fn peers_assigned(&self, index: u32) -> HashSet<SocketAddr> {
        self.per_piece.get(&index).cloned().unwrap_or_default()
    }

    pub fn is_assigned_to(&self, index: u32, peer: &SocketAddr) -> bool {
        self.per_piece
            .get(&index)
            .is_some_and(|peers| peers.contains(peer))
    }

    /// Drops a piece from every peer it was assigned to.
    pub fn remove_piece(&mut self, index: u32) {
        if let Some(peers) = self.per_piece.remove(&index) {
            for peer in peers {
                if let Some(load) = self.per_peer.get_mut(&peer) {
                    load.remove(&index);
                }
            }
        }
    }

    /// Drops a peer, freeing every piece it was assigned.
    pub fn remove_peer(&mut self, peer: &SocketAddr) -> Vec<u32> {
        let Some(held) = self.per_peer.remove(peer) else {
            return Vec::new();
        };
        for index in &held {
            if let Some(peers) = self.per_piece.get_mut(index) {
                peers.remove(peer);
                if peers.is_empty() {
                    self.per_piece.remove(index);
                }
            }
        }
        held.into_iter().collect()
    }

    pub fn assigned_count(&self, peer: &SocketAddr) -> usize {
        self.per_peer.get(peer).map_or(0, HashSet::len)
    }
}
