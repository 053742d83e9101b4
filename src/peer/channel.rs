use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::constants::{MAX_FRAME_SIZE, WRITE_TIMEOUT};
use crate::pwp::{drain_messages, CodecError, Message};

use super::error::PeerError;

/// What the reader half of a channel reports to its session.
#[derive(Debug)]
pub enum ChannelEvent {
    /// One fully decoded inbound message.
    Message(Message),
    /// The stream ended: `None` for a clean close, `Some` for a decode or
    /// transport failure. Nothing follows this event.
    Closed(Option<PeerError>),
}

/// Owns a peer transport after the handshake.
///
/// The read half runs as its own task, buffering incoming bytes and
/// draining complete frames through the streaming decoder; every decoded
/// message lands in the session's mailbox. One decode error closes the
/// channel. Between reads the buffer holds at most one partial frame.
pub struct Channel {
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

impl Channel {
    pub fn start(stream: TcpStream, events: mpsc::Sender<ChannelEvent>) -> Self {
        let (read_half, writer) = stream.into_split();
        let reader = tokio::spawn(read_loop(read_half, events));
        Self { writer, reader }
    }

    /// Writes one framed message.
    pub async fn send(&mut self, message: &Message) -> Result<(), PeerError> {
        let frame = message.encode();
        timeout(WRITE_TIMEOUT, self.writer.write_all(&frame))
            .await
            .map_err(|_| PeerError::Timeout)??;
        Ok(())
    }

    /// Tears the channel down, closing the transport.
    pub fn shutdown(self) {
        self.reader.abort();
    }
}

async fn read_loop(mut read_half: OwnedReadHalf, events: mpsc::Sender<ChannelEvent>) {
    let mut buf = BytesMut::with_capacity(32 * 1024);
    loop {
        match read_half.read_buf(&mut buf).await {
            Ok(0) => {
                let _ = events.send(ChannelEvent::Closed(None)).await;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                let _ = events.send(ChannelEvent::Closed(Some(e.into()))).await;
                return;
            }
        }

        if frame_oversized(&buf) {
            let _ = events
                .send(ChannelEvent::Closed(Some(CodecError::InvalidLength.into())))
                .await;
            return;
        }

        match drain_messages(&mut buf) {
            Ok(messages) => {
                for message in messages {
                    if events.send(ChannelEvent::Message(message)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                let _ = events.send(ChannelEvent::Closed(Some(e.into()))).await;
                return;
            }
        }
    }
}

// A length prefix beyond any legitimate frame: refuse to buffer it.
fn frame_oversized(buf: &BytesMut) -> bool {
    if buf.len() < 4 {
        return false;
    }
    let advertised = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    advertised > MAX_FRAME_SIZE
}
