//! Process-wide actor lookup.
//!
//! Maps an info-hash to the mailbox of the coordinator that owns the
//! torrent. Each key has a single writer: the coordinator registers
//! itself at spawn and deregisters when its run loop ends. The
//! responder-side handshaker resolves inbound connections here.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::metainfo::InfoHash;
use crate::swarm::SwarmEvent;

#[derive(Default)]
pub struct Registry {
    coordinators: DashMap<InfoHash, mpsc::Sender<SwarmEvent>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, info_hash: InfoHash, mailbox: mpsc::Sender<SwarmEvent>) {
        self.coordinators.insert(info_hash, mailbox);
    }

    pub fn deregister(&self, info_hash: &InfoHash) {
        self.coordinators.remove(info_hash);
    }

    /// The coordinator mailbox for an active torrent.
    pub fn coordinator(&self, info_hash: &InfoHash) -> Option<mpsc::Sender<SwarmEvent>> {
        self.coordinators
            .get(info_hash)
            .map(|entry| entry.value().clone())
    }

    /// Whether any torrent with this info-hash is active.
    pub fn is_active(&self, info_hash: &InfoHash) -> bool {
        self.coordinators.contains_key(info_hash)
    }
}
