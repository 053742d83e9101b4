use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::metainfo::{InfoHash, PeerId};

/// The torrent lifecycle moment an announce reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerEvent {
    /// Periodic re-announce; carries no event parameter.
    #[default]
    None,
    Started,
    Completed,
    Stopped,
}

impl TrackerEvent {
    /// HTTP query value; empty means the parameter is omitted.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerEvent::None => "",
            TrackerEvent::Started => "started",
            TrackerEvent::Completed => "completed",
            TrackerEvent::Stopped => "stopped",
        }
    }

    /// UDP protocol event id.
    pub fn as_udp_id(&self) -> u32 {
        match self {
            TrackerEvent::None => 0,
            TrackerEvent::Completed => 1,
            TrackerEvent::Started => 2,
            TrackerEvent::Stopped => 3,
        }
    }
}

/// One announce's parameters, identical across HTTP and UDP.
#[derive(Debug, Clone)]
pub struct AnnounceRequest {
    pub info_hash: InfoHash,
    pub peer_id: PeerId,
    pub port: u16,
    pub uploaded: u64,
    pub downloaded: u64,
    pub left: u64,
    pub event: TrackerEvent,
    pub numwant: u32,
    /// Echoed back when a previous response supplied one.
    pub tracker_id: Option<String>,
}

/// A successful announce.
#[derive(Debug, Clone, Default)]
pub struct AnnounceResponse {
    /// Seconds until the next periodic announce.
    pub interval: u32,
    /// Seeder count, when reported.
    pub complete: Option<u32>,
    /// Leecher count, when reported.
    pub incomplete: Option<u32>,
    pub peers: Vec<SocketAddr>,
    pub tracker_id: Option<String>,
    pub warning_message: Option<String>,
}

/// Parses the compact peer format: 6 bytes per peer, 4 of IPv4 address
/// and 2 of big-endian port. A trailing fragment is ignored.
pub fn parse_compact_peers(data: &[u8]) -> Vec<SocketAddr> {
    data.chunks_exact(6)
        .map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            SocketAddr::new(IpAddr::V4(ip), port)
        })
        .collect()
}
