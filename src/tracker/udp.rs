use std::net::SocketAddr;
use std::time::Instant;

use rand::Rng as _;
use tokio::net::{lookup_host, UdpSocket};
use tokio::time::timeout;

use crate::constants::{
    UDP_ACTION_ANNOUNCE, UDP_ACTION_CONNECT, UDP_ACTION_ERROR, UDP_PROTOCOL_ID,
    UDP_TRACKER_RETRIES, UDP_TRACKER_TIMEOUT,
};

use super::error::TrackerError;
use super::response::{parse_compact_peers, AnnounceRequest, AnnounceResponse};

const CONNECT_RESPONSE_LEN: usize = 16;
const ANNOUNCE_RESPONSE_MIN_LEN: usize = 20;

// Connection ids expire server-side after a minute.
const CONNECTION_ID_TTL_SECS: u64 = 60;

/// A UDP tracker client: a connect step yields a connection id, which
/// authenticates the announce requests that follow.
pub struct UdpTracker {
    socket: UdpSocket,
    addr: SocketAddr,
    connection: Option<(u64, Instant)>,
}

impl UdpTracker {
    /// Resolves a `udp://host:port` URL and opens the announce socket.
    pub async fn connect(url: &str) -> Result<Self, TrackerError> {
        let addr = resolve_udp_url(url).await?;
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(TrackerError::FailedToOpenSocket)?;
        let mut tracker = Self {
            socket,
            addr,
            connection: None,
        };
        tracker.refresh_connection().await?;
        Ok(tracker)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn announce(
        &mut self,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        let connection_id = self.refresh_connection().await?;
        let transaction_id: u32 = rand::rng().random();
        let key: u32 = rand::rng().random();

        let mut packet = Vec::with_capacity(98);
        packet.extend_from_slice(&connection_id.to_be_bytes());
        packet.extend_from_slice(&UDP_ACTION_ANNOUNCE.to_be_bytes());
        packet.extend_from_slice(&transaction_id.to_be_bytes());
        packet.extend_from_slice(request.info_hash.as_bytes());
        packet.extend_from_slice(request.peer_id.as_bytes());
        packet.extend_from_slice(&request.downloaded.to_be_bytes());
        packet.extend_from_slice(&request.left.to_be_bytes());
        packet.extend_from_slice(&request.uploaded.to_be_bytes());
        packet.extend_from_slice(&request.event.as_udp_id().to_be_bytes());
        packet.extend_from_slice(&0u32.to_be_bytes()); // ip: tracker sees our source
        packet.extend_from_slice(&key.to_be_bytes());
        packet.extend_from_slice(&(request.numwant as i32).to_be_bytes());
        packet.extend_from_slice(&request.port.to_be_bytes());

        let response = self.exchange(&packet).await?;
        if response.len() < 8 {
            return Err(TrackerError::InvalidAnnounceResponse("truncated header"));
        }
        let action = read_u32(&response, 0);
        let echoed = read_u32(&response, 4);

        if action == UDP_ACTION_ERROR {
            let message = String::from_utf8_lossy(&response[8..]).into_owned();
            return Err(TrackerError::Failure(message));
        }
        if echoed != transaction_id {
            return Err(TrackerError::BadTransactionId);
        }
        if action != UDP_ACTION_ANNOUNCE || response.len() < ANNOUNCE_RESPONSE_MIN_LEN {
            return Err(TrackerError::InvalidAnnounceResponse("bad announce frame"));
        }

        Ok(AnnounceResponse {
            interval: read_u32(&response, 8),
            incomplete: Some(read_u32(&response, 12)),
            complete: Some(read_u32(&response, 16)),
            peers: parse_compact_peers(&response[ANNOUNCE_RESPONSE_MIN_LEN..]),
            tracker_id: None,
            warning_message: None,
        })
    }

    async fn refresh_connection(&mut self) -> Result<u64, TrackerError> {
        if let Some((id, at)) = self.connection {
            if at.elapsed().as_secs() < CONNECTION_ID_TTL_SECS {
                return Ok(id);
            }
        }

        let transaction_id: u32 = rand::rng().random();
        let mut packet = Vec::with_capacity(16);
        packet.extend_from_slice(&UDP_PROTOCOL_ID.to_be_bytes());
        packet.extend_from_slice(&UDP_ACTION_CONNECT.to_be_bytes());
        packet.extend_from_slice(&transaction_id.to_be_bytes());

        let response = self.exchange(&packet).await?;
        if response.len() < CONNECT_RESPONSE_LEN {
            return Err(TrackerError::BadConnectResponseLength(response.len()));
        }
        if read_u32(&response, 4) != transaction_id {
            return Err(TrackerError::BadTransactionId);
        }
        if read_u32(&response, 0) != UDP_ACTION_CONNECT {
            return Err(TrackerError::InvalidAnnounceResponse("bad connect action"));
        }

        let mut id_bytes = [0u8; 8];
        id_bytes.copy_from_slice(&response[8..16]);
        let id = u64::from_be_bytes(id_bytes);
        self.connection = Some((id, Instant::now()));
        Ok(id)
    }

    // One request/response exchange with retries; each retry doubles the
    // timeout. Datagrams from anyone but the tracker are a hard error.
    async fn exchange(&self, packet: &[u8]) -> Result<Vec<u8>, TrackerError> {
        let mut buf = vec![0u8; 2048];
        for attempt in 0..UDP_TRACKER_RETRIES {
            self.socket.send_to(packet, self.addr).await?;
            let wait = UDP_TRACKER_TIMEOUT * (1 << attempt);
            match timeout(wait, self.socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => {
                    if from != self.addr {
                        return Err(TrackerError::BadSender);
                    }
                    return Ok(buf[..len].to_vec());
                }
                Ok(Err(e)) => return Err(TrackerError::Io(e)),
                Err(_) => continue,
            }
        }
        Err(TrackerError::Timeout)
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

async fn resolve_udp_url(url: &str) -> Result<SocketAddr, TrackerError> {
    let rest = url
        .strip_prefix("udp://")
        .ok_or_else(|| TrackerError::InvalidUrl(url.to_string()))?;
    let authority = rest.split('/').next().unwrap_or(rest);
    lookup_host(authority)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| TrackerError::InvalidUrl(url.to_string()))
}
