use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::TcpStream;

use crate::metainfo::{PeerId, PieceInfo};
use crate::peer::{Bitfield, Violation};
use crate::storage::StorageError;

/// How a peer entered the swarm: we dialed it, or it dialed us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerRole {
    Initiated,
    Accepted,
}

/// Everything a swarm coordinator reacts to. Each variant is one mailbox
/// message; senders never share state with the coordinator.
#[derive(Debug)]
pub enum SwarmEvent {
    /// A tracker announce produced candidate peer endpoints.
    PeersAnnounced(Vec<SocketAddr>),

    /// A handshake concluded and the transport is ours to own.
    HandshakeCompleted {
        stream: TcpStream,
        addr: SocketAddr,
        peer_id: PeerId,
        role: PeerRole,
    },

    /// A handshake attempt failed; the transport is already closed.
    HandshakeFailed { addr: SocketAddr },

    /// The remote started choking us.
    PeerChoked { addr: SocketAddr },

    /// The remote stopped choking us.
    PeerUnchoked { addr: SocketAddr },

    /// The remote announced one newly acquired piece.
    PeerHas { addr: SocketAddr, index: u32 },

    /// The remote sent its (first) bitfield.
    PeerBitfield { addr: SocketAddr, bitfield: Bitfield },

    /// The remote asked for a slice of a piece we announced.
    BlockRequested {
        addr: SocketAddr,
        index: u32,
        offset: u32,
        length: u32,
    },

    /// The remote cancelled a slice it had asked for.
    BlockRequestCancelled {
        addr: SocketAddr,
        index: u32,
        offset: u32,
        length: u32,
    },

    /// A session assembled and hash-validated a complete piece.
    PieceDownloaded {
        addr: SocketAddr,
        piece: PieceInfo,
        data: Bytes,
    },

    /// Storage finished (or failed) persisting a piece.
    PieceStored {
        index: u32,
        result: Result<(), StorageError>,
    },

    /// Storage finished (or failed) loading a piece body.
    PieceRetrieved {
        index: u32,
        result: Result<Bytes, StorageError>,
    },

    /// A session caught the remote breaking protocol rules.
    ProtocolViolation { addr: SocketAddr, violation: Violation },

    /// A session terminated for any reason.
    SessionClosed { addr: SocketAddr },

    /// Tear the torrent down: stop every session and exit.
    Shutdown,
}
