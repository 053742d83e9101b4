use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::peer::Bitfield;

use super::*;

fn addr(port: u16) -> SocketAddr {
    format!("10.0.0.1:{port}").parse().unwrap()
}

// ---------------------------------------------------------------------------
// PieceTracker
// ---------------------------------------------------------------------------

#[test]
fn tracker_merges_bitfields_and_indexes() {
    let mut tracker = PieceTracker::new(0..8);
    let peer = addr(1);

    assert!(!tracker.has_possession_info(&peer));
    tracker.update_with_bitfield(peer, &Bitfield::from_indexes(8, [1, 3, 5]));
    assert!(tracker.has_possession_info(&peer));
    assert_eq!(tracker.possession_count(3), 1);

    tracker.update_with_index(peer, 6);
    let mut held = tracker.missing_held_by(&peer);
    held.sort_unstable();
    assert_eq!(held, vec![1, 3, 5, 6]);
}

#[test]
fn tracker_storing_flow_returns_the_downloader() {
    let mut tracker = PieceTracker::new(0..3);
    let downloader = addr(1);

    tracker.mark_piece_as_storing(2, downloader);
    assert!(!tracker.is_missing(2));
    assert!(tracker.is_storing(2));
    assert!(!tracker.is_complete());

    assert_eq!(tracker.remove_storing_piece(2), Some(downloader));
    assert!(!tracker.is_storing(2));
    assert_eq!(tracker.missing_count(), 2);
}

#[test]
fn tracker_completion_requires_empty_missing_and_storing() {
    let mut tracker = PieceTracker::new(0..2);
    tracker.mark_piece_as_storing(0, addr(1));
    tracker.mark_piece_as_storing(1, addr(1));
    assert!(!tracker.is_complete());
    tracker.remove_storing_piece(0);
    tracker.remove_storing_piece(1);
    assert!(tracker.is_complete());
}

#[test]
fn tracker_removes_peers_cleanly() {
    let mut tracker = PieceTracker::new(0..8);
    let gone = addr(1);
    let stays = addr(2);
    tracker.update_with_bitfield(gone, &Bitfield::from_indexes(8, [1, 2]));
    tracker.update_with_bitfield(stays, &Bitfield::from_indexes(8, [2]));

    tracker.remove_peer(&gone);
    assert!(!tracker.has_possession_info(&gone));
    assert_eq!(tracker.possession_count(1), 0);
    assert_eq!(tracker.possession_count(2), 1);
}

// ---------------------------------------------------------------------------
// PieceAssigner
// ---------------------------------------------------------------------------

#[test]
fn assigner_honors_the_initial_batch_and_peer_cap() {
    let mut assigner = PieceAssigner::new(4, 2, 3);
    let peer = addr(1);

    let assigned = assigner.assign_initial(&[10, 11, 12, 13, 14], peer);
    assert_eq!(assigned, vec![10, 11, 12]);
    assert_eq!(assigner.assigned_count(&peer), 3);

    assert!(assigner.assign(13, peer));
    assert!(!assigner.assign(14, peer), "peer cap reached");
}

#[test]
fn assigner_honors_the_piece_spread_cap() {
    let mut assigner = PieceAssigner::new(8, 2, 8);
    assert!(assigner.assign(5, addr(1)));
    assert!(assigner.assign(5, addr(2)));
    assert!(!assigner.assign(5, addr(3)), "piece spread cap reached");
    assert!(!assigner.assign(5, addr(1)), "duplicate pair refused");

    let peers = assigner.peers_assigned(5);
    assert!(peers.contains(&addr(1)) && peers.contains(&addr(2)));
}

#[test]
fn assigner_releases_capacity_on_removal() {
    let mut assigner = PieceAssigner::new(8, 1, 8);
    assert!(assigner.assign(5, addr(1)));
    assert!(!assigner.assign(5, addr(2)));

    let freed = assigner.remove_peer(&addr(1));
    assert_eq!(freed, vec![5]);
    assert!(assigner.assign(5, addr(2)));

    assigner.remove_piece(5);
    assert_eq!(assigner.assigned_count(&addr(2)), 0);
}

// ---------------------------------------------------------------------------
// ActivePeersTracker
// ---------------------------------------------------------------------------

#[test]
fn active_tracker_counts_roles_and_refuses_duplicates() {
    let mut active = ActivePeersTracker::new(Duration::from_secs(60));
    assert!(active.add(addr(1), PeerRole::Initiated));
    assert!(active.add(addr(2), PeerRole::Accepted));
    assert!(!active.add(addr(1), PeerRole::Accepted), "same addr twice");

    assert_eq!(active.count(PeerRole::Initiated), 1);
    assert_eq!(active.count(PeerRole::Accepted), 1);
    assert!(active.has_recently_accepted());

    assert_eq!(active.remove(&addr(2)), Some(PeerRole::Accepted));
    assert_eq!(active.count(PeerRole::Accepted), 0);
}

#[test]
fn active_tracker_picks_eviction_candidates_from_accepted_only() {
    let mut active = ActivePeersTracker::new(Duration::from_secs(60));
    active.add(addr(1), PeerRole::Initiated);
    assert_eq!(active.random_accepted(), None);

    active.add(addr(2), PeerRole::Accepted);
    active.add(addr(3), PeerRole::Accepted);
    let victim = active.random_accepted().unwrap();
    assert!(victim == addr(2) || victim == addr(3));
}

#[test]
fn admission_window_expires() {
    let mut active = ActivePeersTracker::new(Duration::ZERO);
    active.add(addr(1), PeerRole::Accepted);
    assert!(!active.has_recently_accepted(), "zero window expires at once");
}

// ---------------------------------------------------------------------------
// AnnouncedPeersTracker
// ---------------------------------------------------------------------------

#[test]
fn announced_tracker_dedupes_and_hands_out_fifo() {
    let mut announced = AnnouncedPeersTracker::new();
    announced.extend([addr(1), addr(2), addr(1)]);
    assert_eq!(announced.len(), 2);

    assert_eq!(announced.pop(|_| false), Some(addr(1)));
    assert_eq!(announced.pop(|_| false), Some(addr(2)));
    assert_eq!(announced.pop(|_| false), None);
}

#[test]
fn announced_tracker_skips_active_peers() {
    let mut announced = AnnouncedPeersTracker::new();
    announced.extend([addr(1), addr(2), addr(3)]);

    let popped = announced.pop(|a| *a == addr(1) || *a == addr(3));
    assert_eq!(popped, Some(addr(2)));
    assert!(announced.is_empty());
}

// ---------------------------------------------------------------------------
// PieceCache
// ---------------------------------------------------------------------------

#[test]
fn cache_returns_what_was_added() {
    let mut cache = PieceCache::new(1024);
    cache.add(3, Bytes::from_static(b"piece three"));
    assert_eq!(cache.get(3), Some(Bytes::from_static(b"piece three")));
    assert_eq!(cache.get(4), None);
    assert_eq!(cache.size(), 11);
}

#[test]
fn cache_eviction_prefers_cold_entries() {
    // four 25-byte pieces exactly fill 100 bytes
    let mut cache = PieceCache::new(100);
    for index in 0..4u32 {
        cache.add(index, Bytes::from(vec![index as u8; 25]));
    }
    assert_eq!(cache.size(), 100);

    // touch 0: it becomes the hottest entry; 1 is now coldest
    cache.get(0);
    cache.add(4, Bytes::from(vec![4u8; 25]));

    assert!(cache.contains(0));
    assert!(!cache.contains(1), "coldest entry evicted");
    assert!(cache.size() <= cache.max_size());
}

#[test]
fn cache_insert_at_capacity_drops_below_max_first() {
    let mut cache = PieceCache::new(100);
    for index in 0..4u32 {
        cache.add(index, Bytes::from(vec![0u8; 25]));
    }
    cache.add(9, Bytes::from(vec![0u8; 10]));
    // a quarter of four entries is one: 75 stored + 10 new
    assert_eq!(cache.len(), 4);
    assert_eq!(cache.size(), 85);
}

#[test]
fn cache_replacing_an_entry_adjusts_size() {
    let mut cache = PieceCache::new(1024);
    cache.add(1, Bytes::from(vec![0u8; 10]));
    cache.add(1, Bytes::from(vec![0u8; 30]));
    assert_eq!(cache.size(), 30);
    assert_eq!(cache.len(), 1);
}

// ---------------------------------------------------------------------------
// HealthTracker
// ---------------------------------------------------------------------------

#[test]
fn health_tracker_flags_peers_that_never_unchoke() {
    let mut health = HealthTracker::new();
    let starved = addr(1);
    let friendly = addr(2);
    health.add_peer(starved);
    health.add_peer(friendly);
    health.record_unchoke(friendly);

    assert!(health.is_starving_us(&starved, Duration::ZERO));
    assert!(!health.is_starving_us(&friendly, Duration::ZERO));
    // too little history with a long patience window
    assert!(!health.is_starving_us(&starved, Duration::from_secs(3600)));
    // unknown peers get the benefit of the doubt
    assert!(!health.is_starving_us(&addr(9), Duration::ZERO));
}

#[test]
fn health_tracker_forgets_removed_peers() {
    let mut health = HealthTracker::new();
    health.add_peer(addr(1));
    health.remove_peer(&addr(1));
    assert!(!health.is_starving_us(&addr(1), Duration::ZERO));
}

// ---------------------------------------------------------------------------
// SwarmStats
// ---------------------------------------------------------------------------

#[test]
fn stats_track_transfer_totals() {
    let stats = SwarmStats::new(1000);
    stats.add_downloaded(300);
    stats.add_uploaded(50);
    assert_eq!(stats.downloaded(), 300);
    assert_eq!(stats.uploaded(), 50);
    assert_eq!(stats.left(), 700);

    stats.add_downloaded(800);
    assert_eq!(stats.left(), 0, "left saturates at zero");
}

// ---------------------------------------------------------------------------
// Coordinator end to end: admit a peer, download both pieces, store them
// ---------------------------------------------------------------------------

mod end_to_end {
    use std::sync::Arc;

    use bytes::{Bytes, BytesMut};
    use sha1::{Digest, Sha1};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;
    use tokio::time::{timeout, Duration};

    use crate::config::Config;
    use crate::metainfo::{File, InfoHash, Metainfo, PeerId};
    use crate::pwp::{drain_messages, Message};
    use crate::registry::Registry;
    use crate::storage::Storage;
    use crate::swarm::{PeerRole, SwarmCoordinator, SwarmEvent, SwarmStats};

    fn sha1(data: &[u8]) -> [u8; 20] {
        let mut hasher = Sha1::new();
        hasher.update(data);
        hasher.finalize().into()
    }

    fn two_piece_metainfo() -> Metainfo {
        Metainfo {
            announce: "http://unused/announce".into(),
            info_hash: InfoHash([0x42; 20]),
            name: "demo".into(),
            piece_length: 4,
            piece_hashes: vec![sha1(b"abcd"), sha1(b"ef")],
            files: vec![File {
                path: "demo".into(),
                length: 6,
            }],
            total_length: 6,
        }
    }

    struct RemotePeer {
        stream: TcpStream,
        buf: BytesMut,
        pending: std::collections::VecDeque<Message>,
    }

    impl RemotePeer {
        fn new(stream: TcpStream) -> Self {
            Self {
                stream,
                buf: BytesMut::new(),
                pending: std::collections::VecDeque::new(),
            }
        }

        async fn send(&mut self, message: Message) {
            self.stream.write_all(&message.encode()).await.unwrap();
        }

        async fn read_message(&mut self) -> Message {
            loop {
                if let Some(message) = self.pending.pop_front() {
                    return message;
                }
                let n = timeout(Duration::from_secs(5), self.stream.read_buf(&mut self.buf))
                    .await
                    .expect("read timeout")
                    .expect("read failed");
                assert!(n > 0, "peer stream closed early");
                self.pending
                    .extend(drain_messages(&mut self.buf).expect("clean frames"));
            }
        }
    }

    #[tokio::test]
    async fn remote_peer_feeds_the_swarm_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::spawn(dir.path().to_path_buf());
        let metainfo = Arc::new(two_piece_metainfo());
        let info_hash = metainfo.info_hash;
        storage.activate(info_hash, "demo".into()).await.unwrap();

        let registry = Registry::new();
        let stats = Arc::new(SwarmStats::new(6));
        let (done_tx, done_rx) = oneshot::channel();
        let handle = SwarmCoordinator::spawn(
            metainfo,
            PeerId::generate(),
            Config::default(),
            std::iter::empty(),
            storage.clone(),
            stats.clone(),
            registry.clone(),
            done_tx,
        );
        assert!(registry.is_active(&info_hash));

        // hand the coordinator one accepted transport
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let connected = TcpStream::connect(listener.local_addr().unwrap())
            .await
            .unwrap();
        let mut remote = RemotePeer::new(connected);
        let (stream, addr) = listener.accept().await.unwrap();
        handle
            .sender()
            .send(SwarmEvent::HandshakeCompleted {
                stream,
                addr,
                peer_id: PeerId([9; 20]),
                role: PeerRole::Accepted,
            })
            .await
            .unwrap();

        // session start: our (empty) bitfield, then the unchoke
        assert!(matches!(remote.read_message().await, Message::Bitfield(_)));
        assert!(matches!(remote.read_message().await, Message::Unchoke));

        // announce both pieces; the coordinator assigns them and the
        // session, still choked by the remote, declares interest
        remote
            .send(Message::Bitfield(Bytes::from_static(&[0xC0])))
            .await;
        assert!(matches!(remote.read_message().await, Message::Interested));

        // unchoke and serve the block requests as they come
        remote.send(Message::Unchoke).await;
        for _ in 0..2 {
            let request = remote.read_message().await;
            let Message::Request {
                index,
                offset,
                length,
            } = request
            else {
                panic!("expected request, got {request:?}");
            };
            assert_eq!(offset, 0);
            let data = match index {
                0 => {
                    assert_eq!(length, 4);
                    Bytes::from_static(b"abcd")
                }
                1 => {
                    assert_eq!(length, 2);
                    Bytes::from_static(b"ef")
                }
                other => panic!("unexpected piece {other}"),
            };
            remote
                .send(Message::Piece {
                    index,
                    offset: 0,
                    data,
                })
                .await;
        }

        // both pieces downloaded, validated, and stored
        timeout(Duration::from_secs(10), done_rx)
            .await
            .expect("download did not complete")
            .expect("coordinator dropped the completion channel");

        assert_eq!(
            std::fs::read(dir.path().join("demo").join("0.piece")).unwrap(),
            b"abcd"
        );
        assert_eq!(
            std::fs::read(dir.path().join("demo").join("1.piece")).unwrap(),
            b"ef"
        );
        assert_eq!(stats.downloaded(), 6);
        assert_eq!(stats.left(), 0);

        handle.shutdown().await;
    }
}
