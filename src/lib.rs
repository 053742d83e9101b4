//! bitswarm - a BitTorrent peer-swarm engine
//!
//! Downloads torrents by locating peers through trackers, exchanging
//! fixed-size pieces over the peer wire protocol, and serving the pieces
//! it already holds. One coordinator actor per torrent owns all swarm
//! state; peers, trackers, and storage talk to it exclusively through
//! its mailbox.
//!
//! # Modules
//!
//! - [`bencode`] - the dictionary encoding used by metafiles and trackers
//! - [`metainfo`] - metafile parsing and torrent/peer identities
//! - [`pwp`] - peer wire protocol framing
//! - [`peer`] - per-peer sessions and block scheduling
//! - [`swarm`] - the per-torrent coordinator and its bookkeeping
//! - [`tracker`] - HTTP and UDP announces
//! - [`storage`] - the piece persistence actor
//! - [`client`] - torrent activation and teardown

pub mod bencode;
pub mod client;
pub mod config;
pub mod constants;
pub mod handshaker;
pub mod heap;
pub mod metainfo;
pub mod peer;
pub mod pwp;
pub mod registry;
pub mod storage;
pub mod swarm;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use client::{Client, ClientError, Torrent};
pub use config::Config;
pub use metainfo::{InfoHash, Metainfo, MetainfoError, PeerId, PieceInfo};
pub use peer::{Bitfield, Block, BlockPlanner, BlockRequest, PeerError, Violation};
pub use pwp::{CodecError, Message};
pub use registry::Registry;
pub use storage::{Storage, StorageError, StorageHandle};
pub use swarm::{SwarmCoordinator, SwarmEvent, SwarmHandle, SwarmStats};
pub use tracker::{Announcer, HttpTracker, TrackerError, UdpTracker};
