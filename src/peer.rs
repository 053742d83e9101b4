//! Peer sessions: one conversation per remote peer.
//!
//! A [`PeerSession`] owns the channel around one duplex transport and the
//! [`BlockPlanner`] that schedules block requests on it. The session
//! enforces the wire protocol's state rules and reports everything of
//! swarm-wide interest to its coordinator as events.

mod bitfield;
mod channel;
mod error;
mod planner;
mod session;

pub use bitfield::Bitfield;
pub use channel::{Channel, ChannelEvent};
pub use error::{PeerError, Violation};
pub use planner::{Block, BlockPlanner, BlockRequest, CompletedPiece, PlannerError};
pub use session::{PeerSession, SessionCommand};
