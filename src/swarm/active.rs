use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rand::seq::IteratorRandom;

use super::events::PeerRole;

/// Admission bookkeeping: which peers are active, in which role, and
/// whether an inbound peer was admitted within the current window (the
/// eviction policy allows at most one forced admission per window).
#[derive(Debug)]
pub struct ActivePeersTracker {
    peers: HashMap<SocketAddr, PeerRole>,
    admission_window: Duration,
    last_accepted: Option<Instant>,
}

impl ActivePeersTracker {
    pub fn new(admission_window: Duration) -> Self {
        Self {
            peers: HashMap::new(),
            admission_window,
            last_accepted: None,
        }
    }

    /// Records a peer. Returns false when the address is already active,
    /// in either role.
    pub fn add(&mut self, addr: SocketAddr, role: PeerRole) -> bool {
        if self.peers.contains_key(&addr) {
            return false;
        }
        self.peers.insert(addr, role);
        if role == PeerRole::Accepted {
            self.last_accepted = Some(Instant::now());
        }
        true
    }

    pub fn remove(&mut self, addr: &SocketAddr) -> Option<PeerRole> {
        self.peers.remove(addr)
    }

    pub fn contains(&self, addr: &SocketAddr) -> bool {
        self.peers.contains_key(addr)
    }

    pub fn count(&self, role: PeerRole) -> usize {
        self.peers.values().filter(|&&r| r == role).count()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Whether an inbound peer was admitted within the admission window.
    pub fn has_recently_accepted(&self) -> bool {
        self.last_accepted
            .is_some_and(|at| at.elapsed() < self.admission_window)
    }

    /// A uniformly random accepted peer, the eviction candidate when the
    /// accepted set is full.
    pub fn random_accepted(&self) -> Option<SocketAddr> {
        self.peers
            .iter()
            .filter(|(_, &role)| role == PeerRole::Accepted)
            .map(|(addr, _)| *addr)
            .choose(&mut rand::rng())
    }

    pub fn addrs(&self) -> impl Iterator<Item = &SocketAddr> {
        self.peers.keys()
    }
}
