use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::constants::{ADMISSION_WINDOW, RETRIEVAL_COALESCE, SWARM_MAILBOX};
use crate::handshaker;
use crate::heap::Heap;
use crate::metainfo::{InfoHash, Metainfo, PeerId, PieceInfo};
use crate::peer::{Bitfield, PeerSession, SessionCommand};
use crate::registry::Registry;
use crate::storage::{StorageError, StorageHandle};

use super::active::ActivePeersTracker;
use super::announced::AnnouncedPeersTracker;
use super::assigner::PieceAssigner;
use super::events::{PeerRole, SwarmEvent};
use super::health::HealthTracker;
use super::piece_cache::PieceCache;
use super::piece_tracker::PieceTracker;
use super::stats::SwarmStats;

/// How long a peer may keep us choked before it stops receiving
/// opportunistic `have` assignments.
const STARVATION_PATIENCE: Duration = Duration::from_secs(120);

struct PeerEntry {
    commands: mpsc::Sender<SessionCommand>,
    #[allow(dead_code)]
    peer_id: PeerId,
}

struct PendingRetrieval {
    requesters: Vec<(SocketAddr, u32, u32)>,
    initiated_at: Instant,
}

/// Mailbox and lifecycle grip on one torrent's coordinator.
pub struct SwarmHandle {
    tx: mpsc::Sender<SwarmEvent>,
}

impl SwarmHandle {
    pub fn sender(&self) -> mpsc::Sender<SwarmEvent> {
        self.tx.clone()
    }

    /// Requests an orderly teardown: every session stops, the registry
    /// entry goes away, the actor exits.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(SwarmEvent::Shutdown).await;
    }
}

/// The single event-handling actor for one torrent.
///
/// Owns every piece-level invariant: admission, assignment, the serve
/// path with its cache and retrieval coalescing, store completion
/// fan-out, and peer teardown. All interaction with the rest of the
/// system happens through its mailbox; handlers tolerate events from
/// peers that were already removed, since sessions publish concurrently
/// with their own termination.
pub struct SwarmCoordinator {
    info_hash: InfoHash,
    metainfo: Arc<Metainfo>,
    peer_id: PeerId,
    config: Config,
    tx: mpsc::Sender<SwarmEvent>,
    bitfield: Bitfield,
    sessions: HashMap<SocketAddr, PeerEntry>,
    dialing: HashSet<SocketAddr>,
    active: ActivePeersTracker,
    pieces: PieceTracker,
    assigner: PieceAssigner,
    health: HealthTracker,
    announced: AnnouncedPeersTracker,
    cache: PieceCache,
    pending_retrievals: HashMap<u32, PendingRetrieval>,
    pending_stores: HashMap<u32, Bytes>,
    storage: StorageHandle,
    stats: Arc<SwarmStats>,
    registry: Arc<Registry>,
    completion: Option<oneshot::Sender<()>>,
}

impl SwarmCoordinator {
    /// Spawns the coordinator for an activated torrent. `existing` holds
    /// the piece indexes already on disk; everything else is missing.
    /// The handle's mailbox is registered under the torrent's info-hash
    /// until the actor exits.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        metainfo: Arc<Metainfo>,
        peer_id: PeerId,
        config: Config,
        existing: impl IntoIterator<Item = u32>,
        storage: StorageHandle,
        stats: Arc<SwarmStats>,
        registry: Arc<Registry>,
        completion: oneshot::Sender<()>,
    ) -> SwarmHandle {
        let (tx, rx) = mpsc::channel(SWARM_MAILBOX);
        let piece_count = metainfo.piece_count();
        let bitfield = Bitfield::from_indexes(piece_count, existing);
        let missing = bitfield.missing_indexes();
        let info_hash = metainfo.info_hash;

        let coordinator = SwarmCoordinator {
            info_hash,
            metainfo,
            peer_id,
            tx: tx.clone(),
            bitfield,
            sessions: HashMap::new(),
            dialing: HashSet::new(),
            active: ActivePeersTracker::new(ADMISSION_WINDOW),
            pieces: PieceTracker::new(missing),
            assigner: PieceAssigner::new(
                config.max_assigned_per_peer,
                config.max_peers_per_piece,
                config.initial_batch_per_peer,
            ),
            health: HealthTracker::new(),
            announced: AnnouncedPeersTracker::new(),
            cache: PieceCache::new(config.piece_cache_capacity),
            pending_retrievals: HashMap::new(),
            pending_stores: HashMap::new(),
            storage,
            stats,
            registry: registry.clone(),
            completion: Some(completion),
            config,
        };

        registry.register(info_hash, tx.clone());
        tokio::spawn(coordinator.run(rx));
        SwarmHandle { tx }
    }

    async fn run(mut self, mut events: mpsc::Receiver<SwarmEvent>) {
        info!(info_hash = %self.info_hash, "swarm coordinator started");
        while let Some(event) = events.recv().await {
            if !self.handle_event(event).await {
                break;
            }
        }
        self.registry.deregister(&self.info_hash);
        for entry in self.sessions.values() {
            let _ = entry.commands.send(SessionCommand::Stop).await;
        }
        info!(info_hash = %self.info_hash, "swarm coordinator stopped");
    }

    async fn handle_event(&mut self, event: SwarmEvent) -> bool {
        match event {
            SwarmEvent::PeersAnnounced(peers) => {
                trace!(count = peers.len(), "peers announced");
                self.announced.extend(peers);
                self.dial_candidates();
            }
            SwarmEvent::HandshakeCompleted {
                stream,
                addr,
                peer_id,
                role,
            } => {
                self.dialing.remove(&addr);
                self.admit(stream, addr, peer_id, role).await;
            }
            SwarmEvent::HandshakeFailed { addr } => {
                self.dialing.remove(&addr);
                self.dial_candidates();
            }
            SwarmEvent::PeerChoked { addr } => self.health.record_choke(addr),
            SwarmEvent::PeerUnchoked { addr } => self.health.record_unchoke(addr),
            SwarmEvent::PeerHas { addr, index } => self.peer_has(addr, index).await,
            SwarmEvent::PeerBitfield { addr, bitfield } => {
                self.peer_bitfield(addr, bitfield).await
            }
            SwarmEvent::BlockRequested {
                addr,
                index,
                offset,
                length,
            } => self.serve_block(addr, index, offset, length).await,
            SwarmEvent::BlockRequestCancelled {
                addr,
                index,
                offset,
                length,
            } => {
                if let Some(pending) = self.pending_retrievals.get_mut(&index) {
                    if let Some(pos) = pending
                        .requesters
                        .iter()
                        .position(|&(a, o, l)| a == addr && o == offset && l == length)
                    {
                        pending.requesters.remove(pos);
                    }
                }
            }
            SwarmEvent::PieceDownloaded { addr, piece, data } => {
                self.piece_downloaded(addr, piece, data).await
            }
            SwarmEvent::PieceStored { index, result } => {
                self.piece_stored(index, result).await
            }
            SwarmEvent::PieceRetrieved { index, result } => {
                self.piece_retrieved(index, result).await
            }
            SwarmEvent::ProtocolViolation { addr, violation } => {
                warn!(%addr, %violation, "terminating peer");
                self.terminate_peer(addr, true).await;
            }
            SwarmEvent::SessionClosed { addr } => {
                if self.sessions.contains_key(&addr) {
                    debug!(%addr, "session closed");
                    self.terminate_peer(addr, false).await;
                    self.dial_candidates();
                }
            }
            SwarmEvent::Shutdown => return false,
        }
        true
    }

    // Dials announced candidates while outbound capacity remains.
    fn dial_candidates(&mut self) {
        loop {
            let outbound = self.active.count(PeerRole::Initiated) + self.dialing.len();
            if outbound >= self.config.max_initiated_peers {
                return;
            }
            let active = &self.active;
            let dialing = &self.dialing;
            let Some(candidate) = self
                .announced
                .pop(|addr| active.contains(addr) || dialing.contains(addr))
            else {
                return;
            };
            self.dialing.insert(candidate);
            tokio::spawn(handshaker::initiate(
                candidate,
                self.info_hash,
                self.peer_id,
                self.tx.clone(),
            ));
        }
    }

    async fn admit(
        &mut self,
        stream: TcpStream,
        addr: SocketAddr,
        peer_id: PeerId,
        role: PeerRole,
    ) {
        // one session per address, whichever side connected first
        if self.active.contains(&addr) {
            debug!(%addr, "duplicate peer refused");
            return;
        }

        match role {
            PeerRole::Accepted => {
                if self.active.count(PeerRole::Accepted) >= self.config.max_accepted_peers {
                    if self.active.has_recently_accepted() {
                        debug!(%addr, "accepted capacity exhausted, refusing");
                        return;
                    }
                    if let Some(victim) = self.active.random_accepted() {
                        debug!(%victim, replacement = %addr, "evicting accepted peer");
                        self.terminate_peer(victim, true).await;
                    }
                }
            }
            PeerRole::Initiated => {
                if self.active.count(PeerRole::Initiated) >= self.config.max_initiated_peers {
                    debug!(%addr, "initiated capacity exhausted, refusing");
                    return;
                }
            }
        }

        self.active.add(addr, role);
        self.health.add_peer(addr);
        let commands = PeerSession::spawn(stream, addr, self.bitfield.clone(), self.tx.clone());
        let _ = commands
            .send(SessionCommand::SendBitfield(self.bitfield.clone()))
            .await;
        let _ = commands.send(SessionCommand::Unchoke).await;
        self.sessions.insert(addr, PeerEntry { commands, peer_id });
        debug!(%addr, ?role, "peer admitted");
    }

    async fn peer_has(&mut self, addr: SocketAddr, index: u32) {
        self.pieces.update_with_index(addr, index);
        if !self.pieces.is_missing(index) || !self.sessions.contains_key(&addr) {
            return;
        }
        if self.health.is_starving_us(&addr, STARVATION_PATIENCE) {
            return;
        }
        if self.assigner.assign(index, addr) {
            self.start_download(addr, index).await;
        }
    }

    async fn peer_bitfield(&mut self, addr: SocketAddr, bitfield: Bitfield) {
        let fresh = !self.pieces.has_possession_info(&addr);
        self.pieces.update_with_bitfield(addr, &bitfield);
        if !fresh || !self.sessions.contains_key(&addr) {
            return;
        }

        // rarest-first: fewest known holders pop first
        let candidates = self.pieces.missing_held_by(&addr);
        let mut heap = Heap::new(|a: &(usize, u32), b: &(usize, u32)| a.cmp(b));
        for index in candidates {
            heap.push((self.pieces.possession_count(index), index));
        }
        let mut ordered = Vec::with_capacity(heap.len());
        while let Some((_, index)) = heap.pop() {
            ordered.push(index);
        }

        let assigned = self.assigner.assign_initial(&ordered, addr);
        for index in assigned {
            self.start_download(addr, index).await;
        }
    }

    async fn start_download(&mut self, addr: SocketAddr, index: u32) {
        let Some(piece) = self.metainfo.piece_info(index) else {
            return;
        };
        if let Some(entry) = self.sessions.get(&addr) {
            trace!(%addr, index, "assigning piece");
            let _ = entry
                .commands
                .send(SessionCommand::StartDownload(piece))
                .await;
        }
    }

    // The serve path: cache hit answers immediately; a miss parks the
    // requester and kicks off one coalesced retrieval per window.
    async fn serve_block(&mut self, addr: SocketAddr, index: u32, offset: u32, length: u32) {
        if !self.sessions.contains_key(&addr) {
            return;
        }
        if let Some(data) = self.cache.get(index) {
            self.send_slice(addr, index, offset, length, &data).await;
            return;
        }

        let now = Instant::now();
        let initiate = match self.pending_retrievals.get_mut(&index) {
            Some(pending) => {
                pending.requesters.push((addr, offset, length));
                let due = now.duration_since(pending.initiated_at) > RETRIEVAL_COALESCE;
                if due {
                    pending.initiated_at = now;
                }
                due
            }
            None => {
                self.pending_retrievals.insert(
                    index,
                    PendingRetrieval {
                        requesters: vec![(addr, offset, length)],
                        initiated_at: now,
                    },
                );
                true
            }
        };
        if initiate {
            self.initiate_retrieval(index).await;
        }
    }

    async fn initiate_retrieval(&self, index: u32) {
        let rx = self.storage.retrieve(self.info_hash, index).await;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = rx.await.unwrap_or(Err(StorageError::Unavailable));
            let _ = tx.send(SwarmEvent::PieceRetrieved { index, result }).await;
        });
    }

    async fn send_slice(
        &mut self,
        addr: SocketAddr,
        index: u32,
        offset: u32,
        length: u32,
        data: &Bytes,
    ) {
        let start = offset as usize;
        let end = start + length as usize;
        if end > data.len() {
            warn!(%addr, index, offset, length, "block request out of range");
            return;
        }
        if let Some(entry) = self.sessions.get(&addr) {
            let sent = entry
                .commands
                .send(SessionCommand::ServeBlock {
                    index,
                    offset,
                    data: data.slice(start..end),
                })
                .await;
            if sent.is_ok() {
                self.stats.add_uploaded(length as u64);
            }
        }
    }

    async fn piece_downloaded(&mut self, addr: SocketAddr, piece: PieceInfo, data: Bytes) {
        if !self.pieces.is_missing(piece.index) {
            // already stored or storing via another peer
            return;
        }
        debug!(%addr, index = piece.index, "piece downloaded, storing");
        self.pieces.mark_piece_as_storing(piece.index, addr);
        self.pending_stores.insert(piece.index, data.clone());
        self.initiate_store(piece.index, data).await;
    }

    async fn initiate_store(&self, index: u32, data: Bytes) {
        let rx = self.storage.store(self.info_hash, index, data).await;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = rx.await.unwrap_or(Err(StorageError::Unavailable));
            let _ = tx.send(SwarmEvent::PieceStored { index, result }).await;
        });
    }

    async fn piece_stored(&mut self, index: u32, result: Result<(), StorageError>) {
        if let Err(e) = result {
            // resubmit the same piece until the disk takes it
            warn!(index, error = %e, "piece store failed, retrying");
            if let Some(data) = self.pending_stores.get(&index) {
                self.initiate_store(index, data.clone()).await;
            }
            return;
        }

        self.pending_stores.remove(&index);
        let downloader = self.pieces.remove_storing_piece(index);
        self.bitfield.set(index);
        self.stats
            .add_downloaded(self.metainfo.piece_size(index) as u64);

        let assigned = self.assigner.peers_assigned(index);
        self.assigner.remove_piece(index);

        for (addr, entry) in &self.sessions {
            if assigned.contains(addr) {
                if Some(*addr) != downloader {
                    let _ = entry.commands.send(SessionCommand::CancelPiece(index)).await;
                }
            } else {
                let _ = entry
                    .commands
                    .send(SessionCommand::AnnounceHave(index))
                    .await;
            }
        }

        if self.pieces.is_complete() {
            info!(info_hash = %self.info_hash, "download complete");
            if let Some(done) = self.completion.take() {
                let _ = done.send(());
            }
        }
    }

    async fn piece_retrieved(&mut self, index: u32, result: Result<Bytes, StorageError>) {
        let data = match result {
            Ok(data) => data,
            Err(e) => {
                // requesters stay parked; the next request past the
                // coalescing window fires a fresh retrieval
                warn!(index, error = %e, "piece retrieval failed");
                return;
            }
        };

        if let Some(pending) = self.pending_retrievals.remove(&index) {
            for (addr, offset, length) in pending.requesters {
                self.send_slice(addr, index, offset, length, &data).await;
            }
        }
        self.cache.add(index, data);
    }

    // Removes a peer from every per-peer structure. `stop_session` is
    // false when the session is already gone and only state remains.
    async fn terminate_peer(&mut self, addr: SocketAddr, stop_session: bool) {
        if let Some(entry) = self.sessions.remove(&addr) {
            if stop_session {
                let _ = entry.commands.send(SessionCommand::Stop).await;
            }
        }
        self.active.remove(&addr);
        self.pieces.remove_peer(&addr);
        self.assigner.remove_peer(&addr);
        self.health.remove_peer(&addr);
        for pending in self.pending_retrievals.values_mut() {
            pending.requesters.retain(|&(a, _, _)| a != addr);
        }
    }
}
