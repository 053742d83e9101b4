//! Handshake execution on fresh transports.
//!
//! One async call per transport, on either side of the 68-byte exchange.
//! Success hands the transport to a coordinator as a
//! [`SwarmEvent::HandshakeCompleted`]; any failure closes the transport
//! on drop and, for initiated dials, reports [`SwarmEvent::HandshakeFailed`]
//! so the coordinator can try the next candidate. Connect, send, and
//! receive each get their own timeout.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::constants::HANDSHAKE_TIMEOUT;
use crate::metainfo::{InfoHash, PeerId};
use crate::peer::PeerError;
use crate::pwp::{decode_handshake, encode_handshake, HANDSHAKE_LEN};
use crate::registry::Registry;
use crate::swarm::{PeerRole, SwarmEvent};

/// Dials `addr` and runs the handshake as initiator. The remote must
/// present our exact info-hash.
pub async fn initiate(
    addr: SocketAddr,
    info_hash: InfoHash,
    peer_id: PeerId,
    swarm: mpsc::Sender<SwarmEvent>,
) {
    match try_initiate(addr, info_hash, peer_id).await {
        Ok((stream, remote_id)) => {
            let _ = swarm
                .send(SwarmEvent::HandshakeCompleted {
                    stream,
                    addr,
                    peer_id: remote_id,
                    role: PeerRole::Initiated,
                })
                .await;
        }
        Err(e) => {
            debug!(%addr, error = %e, "outbound handshake failed");
            let _ = swarm.send(SwarmEvent::HandshakeFailed { addr }).await;
        }
    }
}

async fn try_initiate(
    addr: SocketAddr,
    info_hash: InfoHash,
    peer_id: PeerId,
) -> Result<(TcpStream, PeerId), PeerError> {
    let mut stream = timeout(HANDSHAKE_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| PeerError::Timeout)??;

    let outbound = encode_handshake(&info_hash, &peer_id);
    timeout(HANDSHAKE_TIMEOUT, stream.write_all(&outbound))
        .await
        .map_err(|_| PeerError::Timeout)??;

    let inbound = read_handshake(&mut stream).await?;
    let (remote_hash, remote_id) = decode_handshake(&inbound)?;
    if remote_hash != info_hash {
        return Err(PeerError::Codec(crate::pwp::CodecError::InvalidContent));
    }
    Ok((stream, remote_id))
}

/// Runs the handshake as responder on an accepted transport. The
/// presented info-hash is looked up in the registry; unknown torrents
/// close the connection. Success delivers the transport to the matching
/// coordinator.
pub async fn respond(mut stream: TcpStream, registry: Arc<Registry>, peer_id: PeerId) {
    let Ok(addr) = stream.peer_addr() else { return };

    let inbound = match read_handshake(&mut stream).await {
        Ok(inbound) => inbound,
        Err(e) => {
            trace!(%addr, error = %e, "inbound handshake failed");
            return;
        }
    };
    let Ok((info_hash, remote_id)) = decode_handshake(&inbound) else {
        trace!(%addr, "inbound handshake undecodable");
        return;
    };

    let Some(coordinator) = registry.coordinator(&info_hash) else {
        debug!(%addr, %info_hash, "handshake for unknown torrent");
        return;
    };

    let outbound = encode_handshake(&info_hash, &peer_id);
    let sent = timeout(HANDSHAKE_TIMEOUT, stream.write_all(&outbound)).await;
    if !matches!(sent, Ok(Ok(()))) {
        return;
    }

    let _ = coordinator
        .send(SwarmEvent::HandshakeCompleted {
            stream,
            addr,
            peer_id: remote_id,
            role: PeerRole::Accepted,
        })
        .await;
}

async fn read_handshake(stream: &mut TcpStream) -> Result<[u8; HANDSHAKE_LEN], PeerError> {
    let mut buf = [0u8; HANDSHAKE_LEN];
    timeout(HANDSHAKE_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .map_err(|_| PeerError::Timeout)??;
    Ok(buf)
}
