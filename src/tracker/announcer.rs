use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::constants::ANNOUNCE_INTERVAL;
use crate::metainfo::{InfoHash, PeerId};
use crate::swarm::{SwarmEvent, SwarmStats};

use super::error::TrackerError;
use super::http::HttpTracker;
use super::response::{AnnounceRequest, AnnounceResponse, TrackerEvent};
use super::udp::UdpTracker;

enum TrackerClient {
    Http(HttpTracker),
    Udp(UdpTracker),
}

impl TrackerClient {
    async fn build(url: &str) -> Result<Self, TrackerError> {
        if url.starts_with("udp://") {
            Ok(TrackerClient::Udp(UdpTracker::connect(url).await?))
        } else {
            Ok(TrackerClient::Http(HttpTracker::new(url)?))
        }
    }

    async fn announce(
        &mut self,
        request: &AnnounceRequest,
    ) -> Result<AnnounceResponse, TrackerError> {
        match self {
            TrackerClient::Http(http) => http.announce(request).await,
            TrackerClient::Udp(udp) => udp.announce(request).await,
        }
    }
}

/// Stop grip on a running announcer.
pub struct AnnouncerHandle {
    stop: mpsc::Sender<()>,
}

impl AnnouncerHandle {
    /// Asks the announcer to send its `stopped` announce and exit.
    pub async fn stop(&self) {
        let _ = self.stop.send(()).await;
    }
}

/// Drives the announce lifecycle for one torrent against one tracker:
/// `started` at spawn, a periodic announce every tracker-chosen
/// interval, `stopped` on the way out. Peer lists land in the
/// coordinator's mailbox; statistics come from the shared counters. Any
/// tracker error logs and ends the announcer.
pub struct Announcer {
    url: String,
    info_hash: InfoHash,
    peer_id: PeerId,
    port: u16,
    numwant: u32,
    stats: Arc<SwarmStats>,
    swarm: mpsc::Sender<SwarmEvent>,
}

impl Announcer {
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        url: String,
        info_hash: InfoHash,
        peer_id: PeerId,
        port: u16,
        numwant: u32,
        stats: Arc<SwarmStats>,
        swarm: mpsc::Sender<SwarmEvent>,
    ) -> AnnouncerHandle {
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let announcer = Announcer {
            url,
            info_hash,
            peer_id,
            port,
            numwant,
            stats,
            swarm,
        };
        tokio::spawn(announcer.run(stop_rx));
        AnnouncerHandle { stop: stop_tx }
    }

    async fn run(self, mut stop: mpsc::Receiver<()>) {
        let mut client = match TrackerClient::build(&self.url).await {
            Ok(client) => client,
            Err(e) => {
                warn!(url = %self.url, error = %e, "tracker unreachable");
                return;
            }
        };

        let mut tracker_id: Option<String> = None;
        let mut event = TrackerEvent::Started;
        let mut interval = ANNOUNCE_INTERVAL;

        loop {
            let request = self.request(event, tracker_id.clone());
            match client.announce(&request).await {
                Ok(response) => {
                    if let Some(warning) = &response.warning_message {
                        warn!(url = %self.url, warning, "tracker warning");
                    }
                    if response.tracker_id.is_some() {
                        tracker_id = response.tracker_id.clone();
                    }
                    if response.interval > 0 {
                        interval = Duration::from_secs(response.interval as u64);
                    }
                    debug!(
                        url = %self.url,
                        peers = response.peers.len(),
                        seeders = ?response.complete,
                        leechers = ?response.incomplete,
                        "announce ok"
                    );
                    let _ = self
                        .swarm
                        .send(SwarmEvent::PeersAnnounced(response.peers))
                        .await;
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "announce failed, stopping announcer");
                    return;
                }
            }
            event = TrackerEvent::None;

            tokio::select! {
                _ = sleep(interval) => {}
                _ = stop.recv() => {
                    let request = self.request(TrackerEvent::Stopped, tracker_id);
                    if let Err(e) = client.announce(&request).await {
                        debug!(url = %self.url, error = %e, "stopped announce failed");
                    }
                    return;
                }
            }
        }
    }

    fn request(&self, event: TrackerEvent, tracker_id: Option<String>) -> AnnounceRequest {
        AnnounceRequest {
            info_hash: self.info_hash,
            peer_id: self.peer_id,
            port: self.port,
            uploaded: self.stats.uploaded(),
            downloaded: self.stats.downloaded(),
            left: self.stats.left(),
            event,
            numwant: self.numwant,
            tracker_id,
        }
    }
}
