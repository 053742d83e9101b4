use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use sha1::{Digest, Sha1};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::constants::{
    BLOCK_SIZE, INTERESTED_RESEND, KEEPALIVE_INTERVAL, REQUEST_BATCH, SESSION_MAILBOX,
};
use crate::metainfo::PieceInfo;
use crate::pwp::Message;
use crate::swarm::SwarmEvent;

use super::bitfield::Bitfield;
use super::channel::{Channel, ChannelEvent};
use super::planner::{Block, BlockPlanner, CompletedPiece};
use super::Violation;

/// What a coordinator may ask of a session.
#[derive(Debug)]
pub enum SessionCommand {
    /// Begin downloading an assigned piece.
    StartDownload(PieceInfo),
    /// Choke the remote: its requests become violations.
    Choke,
    /// Unchoke the remote.
    Unchoke,
    /// Tell the remote we now hold a piece.
    AnnounceHave(u32),
    /// Send our piece bitfield.
    SendBitfield(Bitfield),
    /// Abandon a piece, cancelling its in-flight requests on the wire.
    CancelPiece(u32),
    /// Answer a remote block request with data.
    ServeBlock {
        index: u32,
        offset: u32,
        data: Bytes,
    },
    /// Terminate the session.
    Stop,
}

/// One BitTorrent conversation over one transport.
///
/// Owns the channel and the block planner; holds the four choke/interest
/// booleans and the local bitfield snapshot. Inbound messages are checked
/// against protocol rules; anything of swarm-wide interest becomes an
/// event to the coordinator. The session never touches piece-level swarm
/// state itself.
pub struct PeerSession {
    addr: SocketAddr,
    swarm: mpsc::Sender<SwarmEvent>,
    channel: Channel,
    planner: BlockPlanner,
    bitfield: Bitfield,
    /// We choke the remote. Starts true per protocol.
    pub local_choke: bool,
    /// The remote chokes us. Starts true per protocol.
    pub remote_choke: bool,
    /// We want the remote's data.
    pub local_interested: bool,
    /// The remote wants ours.
    pub remote_interested: bool,
    bitfield_received: bool,
    last_interested: Option<Instant>,
}

impl PeerSession {
    /// Spawns the session actor over a post-handshake transport and
    /// returns its command mailbox. `bitfield` is the coordinator's
    /// snapshot at session start.
    pub fn spawn(
        stream: TcpStream,
        addr: SocketAddr,
        bitfield: Bitfield,
        swarm: mpsc::Sender<SwarmEvent>,
    ) -> mpsc::Sender<SessionCommand> {
        let (command_tx, command_rx) = mpsc::channel(SESSION_MAILBOX);
        let (channel_tx, channel_rx) = mpsc::channel(SESSION_MAILBOX);
        let session = PeerSession {
            addr,
            swarm,
            channel: Channel::start(stream, channel_tx),
            planner: BlockPlanner::new(BLOCK_SIZE),
            bitfield,
            local_choke: true,
            remote_choke: true,
            local_interested: false,
            remote_interested: false,
            bitfield_received: false,
            last_interested: None,
        };
        tokio::spawn(session.run(command_rx, channel_rx));
        command_tx
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut channel_events: mpsc::Receiver<ChannelEvent>,
    ) {
        let mut keepalive = interval(KEEPALIVE_INTERVAL);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        keepalive.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => break,
                },
                event = channel_events.recv() => match event {
                    Some(ChannelEvent::Message(message)) => {
                        if !self.handle_message(message).await {
                            break;
                        }
                    }
                    Some(ChannelEvent::Closed(reason)) => {
                        debug!(addr = %self.addr, ?reason, "channel closed");
                        break;
                    }
                    None => break,
                },
                _ = keepalive.tick() => {
                    if self.channel.send(&Message::KeepAlive).await.is_err() {
                        break;
                    }
                }
            }
        }

        let _ = self
            .swarm
            .send(SwarmEvent::SessionClosed { addr: self.addr })
            .await;
        self.channel.shutdown();
    }

    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::StartDownload(piece) => {
                trace!(addr = %self.addr, index = piece.index, "piece assigned");
                self.planner.add_piece(piece);
                self.advance_download().await
            }
            SessionCommand::Choke => {
                if !self.local_choke {
                    self.local_choke = true;
                    return self.send(Message::Choke).await;
                }
                true
            }
            SessionCommand::Unchoke => {
                if self.local_choke {
                    self.local_choke = false;
                    return self.send(Message::Unchoke).await;
                }
                true
            }
            SessionCommand::AnnounceHave(index) => {
                self.bitfield.set(index);
                self.send(Message::Have { index }).await
            }
            SessionCommand::SendBitfield(bitfield) => {
                self.bitfield = bitfield;
                self.send(Message::Bitfield(self.bitfield.to_bytes())).await
            }
            SessionCommand::CancelPiece(index) => {
                for request in self.planner.cancel_piece(index) {
                    let sent = self
                        .send(Message::Cancel {
                            index: request.index,
                            offset: request.offset,
                            length: request.length,
                        })
                        .await;
                    if !sent {
                        return false;
                    }
                }
                true
            }
            SessionCommand::ServeBlock {
                index,
                offset,
                data,
            } => {
                self.send(Message::Piece {
                    index,
                    offset,
                    data,
                })
                .await
            }
            SessionCommand::Stop => false,
        }
    }

    async fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::KeepAlive => true,
            Message::Choke => {
                if !self.remote_choke {
                    self.remote_choke = true;
                    return self.notify(SwarmEvent::PeerChoked { addr: self.addr }).await;
                }
                true
            }
            Message::Unchoke => {
                if self.remote_choke {
                    self.remote_choke = false;
                    if !self
                        .notify(SwarmEvent::PeerUnchoked { addr: self.addr })
                        .await
                    {
                        return false;
                    }
                    return self.advance_download().await;
                }
                true
            }
            Message::Interested => {
                self.remote_interested = true;
                true
            }
            Message::Uninterested => {
                self.remote_interested = false;
                true
            }
            Message::Have { index } => {
                self.notify(SwarmEvent::PeerHas {
                    addr: self.addr,
                    index,
                })
                .await
            }
            Message::Bitfield(bits) => {
                if self.bitfield_received {
                    return self.report_violation(Violation::BitfieldRepeat).await;
                }
                self.bitfield_received = true;
                let bitfield = Bitfield::from_bytes(&bits, self.bitfield.piece_count());
                self.notify(SwarmEvent::PeerBitfield {
                    addr: self.addr,
                    bitfield,
                })
                .await
            }
            Message::Request {
                index,
                offset,
                length,
            } => {
                if self.local_choke {
                    return self.report_violation(Violation::RequestWhileChoked).await;
                }
                if !self.bitfield.has(index) {
                    return self.report_violation(Violation::RequestUnannounced).await;
                }
                self.notify(SwarmEvent::BlockRequested {
                    addr: self.addr,
                    index,
                    offset,
                    length,
                })
                .await
            }
            Message::Piece {
                index,
                offset,
                data,
            } => self.handle_block(index, offset, data).await,
            Message::Cancel {
                index,
                offset,
                length,
            } => {
                self.notify(SwarmEvent::BlockRequestCancelled {
                    addr: self.addr,
                    index,
                    offset,
                    length,
                })
                .await
            }
        }
    }

    async fn handle_block(&mut self, index: u32, offset: u32, data: Bytes) -> bool {
        if data.is_empty() || data.len() > BLOCK_SIZE as usize {
            return self.report_violation(Violation::InvalidBlockSent).await;
        }
        let block = Block {
            index,
            offset,
            data,
        };
        match self.planner.add_downloaded_block(block) {
            Err(_) => self.report_violation(Violation::BlockNotRequested).await,
            Ok(None) => self.advance_download().await,
            Ok(Some(completed)) => {
                if !self.finish_piece(completed).await {
                    return false;
                }
                self.advance_download().await
            }
        }
    }

    async fn finish_piece(&mut self, completed: CompletedPiece) -> bool {
        let mut hasher = Sha1::new();
        hasher.update(&completed.data);
        let digest: [u8; 20] = hasher.finalize().into();
        if digest != completed.info.hash {
            return self.report_violation(Violation::InvalidPiece).await;
        }
        debug!(addr = %self.addr, index = completed.info.index, "piece downloaded");
        self.notify(SwarmEvent::PieceDownloaded {
            addr: self.addr,
            piece: completed.info,
            data: completed.data,
        })
        .await
    }

    // Drives the download forward: while choked, refresh `interested` at
    // most once per resend window; while unchoked, request the next batch
    // of blocks.
    async fn advance_download(&mut self) -> bool {
        if self.remote_choke {
            let due = self
                .last_interested
                .map_or(true, |at| at.elapsed() >= INTERESTED_RESEND);
            if due {
                self.local_interested = true;
                self.last_interested = Some(Instant::now());
                return self.send(Message::Interested).await;
            }
            return true;
        }

        for request in self.planner.schedule_blocks(REQUEST_BATCH) {
            let sent = self
                .send(Message::Request {
                    index: request.index,
                    offset: request.offset,
                    length: request.length,
                })
                .await;
            if !sent {
                return false;
            }
        }
        true
    }

    async fn send(&mut self, message: Message) -> bool {
        self.channel.send(&message).await.is_ok()
    }

    async fn notify(&self, event: SwarmEvent) -> bool {
        self.swarm.send(event).await.is_ok()
    }

    async fn report_violation(&self, violation: Violation) -> bool {
        debug!(addr = %self.addr, %violation, "protocol violation");
        let _ = self
            .swarm
            .send(SwarmEvent::ProtocolViolation {
                addr: self.addr,
                violation,
            })
            .await;
        false
    }
}
