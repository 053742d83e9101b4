//! Protocol constants and tuning parameters.
//!
//! Timeouts, window sizes, and protocol values used throughout the swarm
//! engine. Scheduling windows follow common client defaults; the admission
//! caps are deliberately small since one coordinator drives one torrent.

use std::time::Duration;

// ============================================================================
// Client identification
// ============================================================================

/// Peer ID prefix (Azureus-style).
pub const CLIENT_PREFIX: &[u8] = b"-BS0001-";

// ============================================================================
// Ports
// ============================================================================

/// Default BitTorrent listen port.
pub const DEFAULT_PORT: u16 = 6881;

// ============================================================================
// Block and piece sizes
// ============================================================================

/// Standard block size (16 KiB). Consistent for the lifetime of a torrent.
pub const BLOCK_SIZE: u32 = 16384;

/// Largest frame the channel will buffer before giving up on the stream.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// Admission
// ============================================================================

/// Maximum peers we initiate connections to, per torrent.
pub const MAX_INITIATED_PEERS: usize = 10;

/// Maximum inbound peers we accept, per torrent.
pub const MAX_ACCEPTED_PEERS: usize = 10;

/// Window in which at most one accepted-peer eviction may happen.
pub const ADMISSION_WINDOW: Duration = Duration::from_secs(60);

// ============================================================================
// Block scheduling
// ============================================================================

/// Upper bound on the per-peer ready-to-request queue.
pub const MAX_QUEUE_LENGTH: usize = 100;

/// Upper bound on in-flight requests per peer.
pub const MAX_REQUESTED_SIZE: usize = 200;

/// Seconds after which an unanswered request may be rescheduled.
pub const SECONDS_UNTIL_STALE: u64 = 60;

/// Blocks requested per scheduling pass.
pub const REQUEST_BATCH: usize = 20;

/// Minimum delay between `interested` messages to a choking peer.
pub const INTERESTED_RESEND: Duration = Duration::from_secs(60);

// ============================================================================
// Serving
// ============================================================================

/// Window in which retrievals of the same piece are coalesced.
pub const RETRIEVAL_COALESCE: Duration = Duration::from_secs(3);

/// Byte capacity of the piece-body cache (50 MiB).
pub const PIECE_CACHE_CAPACITY: usize = 50 * 1024 * 1024;

// ============================================================================
// Assignment
// ============================================================================

/// Most pieces one peer may be assigned at a time.
pub const MAX_ASSIGNED_PER_PEER: usize = 8;

/// Most peers one piece may be assigned to at a time.
pub const MAX_PEERS_PER_PIECE: usize = 3;

/// Pieces handed out when a peer's bitfield first arrives.
pub const INITIAL_BATCH_PER_PEER: usize = 5;

// ============================================================================
// Timeouts
// ============================================================================

/// Handshake connect/send/receive timeout, each step.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outbound message write timeout.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

/// Keep-alive message interval.
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(120);

// ============================================================================
// Tracker
// ============================================================================

/// Fallback announce interval when a tracker does not supply one.
pub const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1800);

/// HTTP tracker request timeout.
pub const HTTP_TRACKER_TIMEOUT: Duration = Duration::from_secs(30);

/// UDP tracker request timeout, doubled per retry.
pub const UDP_TRACKER_TIMEOUT: Duration = Duration::from_secs(15);

/// UDP tracker retry attempts per request.
pub const UDP_TRACKER_RETRIES: u32 = 3;

/// Peers requested from a tracker per announce.
pub const NUMWANT: u32 = 50;

/// UDP tracker protocol magic.
pub const UDP_PROTOCOL_ID: u64 = 0x41727101980;

/// UDP tracker connect action.
pub const UDP_ACTION_CONNECT: u32 = 0;

/// UDP tracker announce action.
pub const UDP_ACTION_ANNOUNCE: u32 = 1;

/// UDP tracker error action.
pub const UDP_ACTION_ERROR: u32 = 3;

// ============================================================================
// Mailboxes
// ============================================================================

/// Coordinator mailbox capacity.
pub const SWARM_MAILBOX: usize = 1024;

/// Peer session mailbox capacity.
pub const SESSION_MAILBOX: usize = 256;

/// Storage actor mailbox capacity.
pub const STORAGE_MAILBOX: usize = 256;
