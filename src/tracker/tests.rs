use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use crate::metainfo::{InfoHash, PeerId};
use crate::swarm::{SwarmEvent, SwarmStats};

use super::http::parse_announce_response;
use super::*;

// ---------------------------------------------------------------------------
// Events and responses
// ---------------------------------------------------------------------------

#[test]
fn udp_event_ids_follow_the_protocol() {
    assert_eq!(TrackerEvent::None.as_udp_id(), 0);
    assert_eq!(TrackerEvent::Completed.as_udp_id(), 1);
    assert_eq!(TrackerEvent::Started.as_udp_id(), 2);
    assert_eq!(TrackerEvent::Stopped.as_udp_id(), 3);
}

#[test]
fn http_event_strings_omit_the_regular_announce() {
    assert_eq!(TrackerEvent::None.as_str(), "");
    assert_eq!(TrackerEvent::Started.as_str(), "started");
    assert_eq!(TrackerEvent::Completed.as_str(), "completed");
    assert_eq!(TrackerEvent::Stopped.as_str(), "stopped");
}

#[test]
fn compact_peers_parse_in_six_byte_chunks() {
    let data = [192, 168, 0, 1, 0x1A, 0xE1, 10, 0, 0, 7, 0x04, 0xD2, 9, 9];
    let peers = parse_compact_peers(&data);
    assert_eq!(
        peers,
        vec![
            "192.168.0.1:6881".parse().unwrap(),
            "10.0.0.7:1234".parse().unwrap(),
        ]
    );
}

#[test]
fn announce_response_parses_compact_dictionaries() {
    let mut body = Vec::new();
    body.extend_from_slice(b"d8:completei5e10:incompletei12e8:intervali1800e5:peers6:");
    body.extend_from_slice(&[127, 0, 0, 1, 0x1A, 0xE1]);
    body.extend_from_slice(b"10:tracker id4:tid1e");

    let response = parse_announce_response(&body).unwrap();
    assert_eq!(response.interval, 1800);
    assert_eq!(response.complete, Some(5));
    assert_eq!(response.incomplete, Some(12));
    assert_eq!(response.peers, vec!["127.0.0.1:6881".parse().unwrap()]);
    assert_eq!(response.tracker_id.as_deref(), Some("tid1"));
}

#[test]
fn announce_response_surfaces_failure_reasons() {
    let body = b"d14:failure reason14:torrent absente";
    assert!(matches!(
        parse_announce_response(body),
        Err(TrackerError::Failure(reason)) if reason == "torrent absent"
    ));
}

#[test]
fn announce_response_requires_an_interval() {
    let body = b"d5:peers0:e";
    assert!(matches!(
        parse_announce_response(body),
        Err(TrackerError::InvalidAnnounceResponse(_))
    ));
}

// ---------------------------------------------------------------------------
// UDP announcer lifecycle against an in-process tracker
// ---------------------------------------------------------------------------

struct AnnounceRecord {
    event: u32,
    info_hash: [u8; 20],
    peer_id: [u8; 20],
    port: u16,
}

// Speaks just enough of the UDP tracker protocol: answers connects with
// a fixed connection id and announces with interval 1 and one peer.
async fn fake_udp_tracker(socket: UdpSocket, log: mpsc::UnboundedSender<AnnounceRecord>) {
    let mut buf = [0u8; 1024];
    loop {
        let Ok((len, from)) = socket.recv_from(&mut buf).await else {
            return;
        };
        if len == 16 {
            let mut response = Vec::with_capacity(16);
            response.extend_from_slice(&0u32.to_be_bytes());
            response.extend_from_slice(&buf[12..16]);
            response.extend_from_slice(&0xDEAD_BEEFu64.to_be_bytes());
            let _ = socket.send_to(&response, from).await;
        } else if len == 98 {
            let mut info_hash = [0u8; 20];
            info_hash.copy_from_slice(&buf[16..36]);
            let mut peer_id = [0u8; 20];
            peer_id.copy_from_slice(&buf[36..56]);
            let record = AnnounceRecord {
                event: u32::from_be_bytes([buf[80], buf[81], buf[82], buf[83]]),
                info_hash,
                peer_id,
                port: u16::from_be_bytes([buf[96], buf[97]]),
            };
            let _ = log.send(record);

            let mut response = Vec::with_capacity(26);
            response.extend_from_slice(&1u32.to_be_bytes());
            response.extend_from_slice(&buf[12..16]);
            response.extend_from_slice(&1u32.to_be_bytes()); // interval: 1 s
            response.extend_from_slice(&0u32.to_be_bytes()); // leechers
            response.extend_from_slice(&3u32.to_be_bytes()); // seeders
            response.extend_from_slice(&[127, 0, 0, 1, 0x1A, 0xE1]);
            let _ = socket.send_to(&response, from).await;
        }
    }
}

async fn next_record(rx: &mut mpsc::UnboundedReceiver<AnnounceRecord>) -> AnnounceRecord {
    timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("announce timeout")
        .expect("tracker log closed")
}

#[tokio::test]
async fn udp_announcer_lifecycle_is_started_regular_stopped() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let tracker_addr = socket.local_addr().unwrap();
    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    tokio::spawn(fake_udp_tracker(socket, log_tx));

    let info_hash = InfoHash([7; 20]);
    let peer_id = PeerId([9; 20]);
    let (swarm_tx, mut swarm_rx) = mpsc::channel(16);
    let handle = Announcer::spawn(
        format!("udp://{tracker_addr}"),
        info_hash,
        peer_id,
        6881,
        25,
        Arc::new(SwarmStats::new(4096)),
        swarm_tx,
    );

    let started = next_record(&mut log_rx).await;
    let regular = next_record(&mut log_rx).await;
    handle.stop().await;
    let stopped = next_record(&mut log_rx).await;

    assert_eq!(
        [started.event, regular.event, stopped.event],
        [2, 0, 3],
        "started, regular, stopped in order"
    );
    for record in [&started, &regular, &stopped] {
        assert_eq!(&record.info_hash, info_hash.as_bytes());
        assert_eq!(&record.peer_id, peer_id.as_bytes());
        assert_eq!(record.port, 6881);
    }

    // every successful announce fed the swarm its peer list
    match timeout(Duration::from_secs(2), swarm_rx.recv()).await {
        Ok(Some(SwarmEvent::PeersAnnounced(peers))) => {
            assert_eq!(peers, vec!["127.0.0.1:6881".parse().unwrap()]);
        }
        other => panic!("expected announced peers, got {other:?}"),
    }
}

#[tokio::test]
async fn udp_tracker_rejects_short_connect_responses() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let tracker_addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        if let Ok((_, from)) = socket.recv_from(&mut buf).await {
            // truncated connect response
            let mut response = Vec::new();
            response.extend_from_slice(&0u32.to_be_bytes());
            response.extend_from_slice(&buf[12..16]);
            let _ = socket.send_to(&response, from).await;
        }
    });

    let result = UdpTracker::connect(&format!("udp://{tracker_addr}")).await;
    assert!(matches!(
        result,
        Err(TrackerError::BadConnectResponseLength(8))
    ));
}

#[tokio::test]
async fn udp_tracker_rejects_foreign_transaction_ids() {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let tracker_addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        if let Ok((_, from)) = socket.recv_from(&mut buf).await {
            let mut response = Vec::new();
            response.extend_from_slice(&0u32.to_be_bytes());
            let wrong_tid = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]).wrapping_add(1);
            response.extend_from_slice(&wrong_tid.to_be_bytes());
            response.extend_from_slice(&1u64.to_be_bytes());
            let _ = socket.send_to(&response, from).await;
        }
    });

    let result = UdpTracker::connect(&format!("udp://{tracker_addr}")).await;
    assert!(matches!(result, Err(TrackerError::BadTransactionId)));
}

#[test]
fn tracker_urls_must_be_supported_schemes() {
    assert!(matches!(
        HttpTracker::new("udp://tracker:80"),
        Err(TrackerError::InvalidUrl(_))
    ));
}
