//! Torrent activation and teardown.
//!
//! The [`Client`] owns what is shared across torrents: the peer id, the
//! registry, the storage actor, and the listener that feeds inbound
//! connections to the handshaker. Each added torrent gets its own
//! coordinator and announcer; a [`Torrent`] is the grip on that pair.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::Config;
use crate::handshaker;
use crate::metainfo::{Metainfo, MetainfoError, PeerId};
use crate::registry::Registry;
use crate::storage::{Storage, StorageError, StorageHandle};
use crate::swarm::{SwarmCoordinator, SwarmHandle, SwarmStats};
use crate::tracker::{Announcer, AnnouncerHandle};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("metainfo error: {0}")]
    Metainfo(#[from] MetainfoError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The torrent is already active.
    #[error("torrent already active")]
    AlreadyActive,
}

/// A BitTorrent client: activate torrents, serve inbound peers.
pub struct Client {
    config: Config,
    peer_id: PeerId,
    registry: Arc<Registry>,
    storage: StorageHandle,
}

impl Client {
    /// Builds a client and spawns its storage actor; call from within a
    /// tokio runtime.
    pub fn new(config: Config) -> Self {
        let storage = Storage::spawn(config.download_dir.clone());
        Self {
            config,
            peer_id: PeerId::generate(),
            registry: Registry::new(),
            storage,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    /// Binds the listen port and starts accepting inbound peers. Each
    /// accepted transport goes through the responder-side handshake and,
    /// on success, to the matching coordinator.
    pub async fn listen(&self) -> Result<(), ClientError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.listen_port)).await?;
        info!(port = self.config.listen_port, "listening for peers");
        let registry = self.registry.clone();
        let peer_id = self.peer_id;
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        debug!(%addr, "inbound connection");
                        tokio::spawn(handshaker::respond(stream, registry.clone(), peer_id));
                    }
                    Err(e) => {
                        debug!(error = %e, "accept failed");
                    }
                }
            }
        });
        Ok(())
    }

    /// Activates a torrent: storage first, then the coordinator and its
    /// announcer. Pieces already on disk are trusted and excluded from
    /// the download.
    pub async fn add_torrent(&self, metafile: &[u8]) -> Result<Torrent, ClientError> {
        let metainfo = Arc::new(Metainfo::from_bytes(metafile)?);
        let info_hash = metainfo.info_hash;
        if self.registry.is_active(&info_hash) {
            return Err(ClientError::AlreadyActive);
        }

        self.storage
            .activate(info_hash, metainfo.name.clone())
            .await?;
        let existing = self.storage.existing_pieces(info_hash).await?;

        let left: u64 = (0..metainfo.piece_count())
            .filter(|index| !existing.contains(index))
            .map(|index| metainfo.piece_size(index) as u64)
            .sum();
        let stats = Arc::new(SwarmStats::new(left));

        let (done_tx, done_rx) = oneshot::channel();
        let swarm = SwarmCoordinator::spawn(
            metainfo.clone(),
            self.peer_id,
            self.config.clone(),
            existing,
            self.storage.clone(),
            stats.clone(),
            self.registry.clone(),
            done_tx,
        );
        let announcer = Announcer::spawn(
            metainfo.announce.clone(),
            info_hash,
            self.peer_id,
            self.config.listen_port,
            self.config.numwant,
            stats.clone(),
            swarm.sender(),
        );

        info!(%info_hash, name = %metainfo.name, "torrent activated");
        Ok(Torrent {
            metainfo,
            swarm,
            announcer,
            stats,
            storage: self.storage.clone(),
            completion: done_rx,
        })
    }
}

/// One active torrent.
pub struct Torrent {
    metainfo: Arc<Metainfo>,
    swarm: SwarmHandle,
    announcer: AnnouncerHandle,
    stats: Arc<SwarmStats>,
    storage: StorageHandle,
    completion: oneshot::Receiver<()>,
}

impl Torrent {
    pub fn metainfo(&self) -> &Metainfo {
        &self.metainfo
    }

    pub fn stats(&self) -> &SwarmStats {
        &self.stats
    }

    /// Resolves when every piece has been downloaded and stored.
    pub async fn wait_complete(&mut self) -> bool {
        (&mut self.completion).await.is_ok()
    }

    /// Assembles the stored pieces into the torrent's file layout.
    pub async fn compose(&self) -> Result<PathBuf, StorageError> {
        self.storage
            .compose(self.metainfo.info_hash, self.metainfo.files.clone())
            .await
    }

    /// Orderly teardown: `stopped` announce, coordinator shutdown (which
    /// stops every session), storage deactivation.
    pub async fn stop(self) {
        self.announcer.stop().await;
        self.swarm.shutdown().await;
        self.storage.deactivate(self.metainfo.info_hash).await;
    }
}
