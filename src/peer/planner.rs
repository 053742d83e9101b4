use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::constants::{MAX_QUEUE_LENGTH, MAX_REQUESTED_SIZE, SECONDS_UNTIL_STALE};
use crate::metainfo::PieceInfo;

/// The identity of one block: piece index, byte offset, length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRequest {
    pub index: u32,
    pub offset: u32,
    pub length: u32,
}

/// A downloaded block of piece data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub index: u32,
    pub offset: u32,
    pub data: Bytes,
}

impl Block {
    /// The request key this block answers.
    pub fn key(&self) -> BlockRequest {
        BlockRequest {
            index: self.index,
            offset: self.offset,
            length: self.data.len() as u32,
        }
    }
}

/// A fully assembled piece, ready for hash validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPiece {
    pub info: PieceInfo,
    pub data: Bytes,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PlannerError {
    /// A block arrived that was never requested.
    #[error("block not requested")]
    BlockNotRequested,
}

#[derive(Debug)]
struct PieceProgress {
    info: PieceInfo,
    blocks_remaining: usize,
}

/// Per-peer block scheduling.
///
/// Splits assigned pieces into blocks, picks which blocks to request next,
/// bounds the in-flight request set, reclaims requests the peer never
/// answers, and assembles arriving blocks back into pieces.
///
/// Bookkeeping, keyed by [`BlockRequest`]:
///
/// - `missing` holds every block not yet downloaded, stamped with the time
///   it was last queued (0 = never). Entries stay put while requested, so
///   a stale request falls back to eligibility without copying.
/// - `queue` holds blocks picked for the next requests, oldest-queued
///   first.
/// - `requested` holds in-flight requests with their request time.
/// - `downloaded` collects arrived blocks per piece until assembly.
pub struct BlockPlanner {
    block_size: u32,
    pub(crate) queue: VecDeque<BlockRequest>,
    pub(crate) missing: HashMap<BlockRequest, u64>,
    pub(crate) requested: HashMap<BlockRequest, u64>,
    pub(crate) downloaded: HashMap<u32, Vec<Block>>,
    pieces: HashMap<u32, PieceProgress>,
}

impl BlockPlanner {
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size,
            queue: VecDeque::new(),
            missing: HashMap::new(),
            requested: HashMap::new(),
            downloaded: HashMap::new(),
            pieces: HashMap::new(),
        }
    }

    /// True when no piece is being worked on.
    pub fn is_idle(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn has_piece(&self, index: u32) -> bool {
        self.pieces.contains_key(&index)
    }

    /// Splits `piece` into blocks and tracks them all as missing. The
    /// final block carries the remainder when the piece length is not a
    /// block-size multiple.
    pub fn add_piece(&mut self, piece: PieceInfo) {
        if self.pieces.contains_key(&piece.index) {
            return;
        }
        let mut blocks = 0usize;
        let mut offset = 0u32;
        while offset < piece.length {
            let length = self.block_size.min(piece.length - offset);
            self.missing.insert(
                BlockRequest {
                    index: piece.index,
                    offset,
                    length,
                },
                0,
            );
            blocks += 1;
            offset += length;
        }
        self.pieces.insert(
            piece.index,
            PieceProgress {
                info: piece,
                blocks_remaining: blocks,
            },
        );
    }

    /// Picks up to `count` blocks to request now.
    pub fn schedule_blocks(&mut self, count: usize) -> Vec<BlockRequest> {
        self.schedule_blocks_at(count, unix_now())
    }

    pub(crate) fn schedule_blocks_at(&mut self, count: usize, now: u64) -> Vec<BlockRequest> {
        if self.requested.len() >= MAX_REQUESTED_SIZE {
            self.requested
                .retain(|_, stamp| now.saturating_sub(*stamp) < SECONDS_UNTIL_STALE);
        }

        let budget = count.min(MAX_REQUESTED_SIZE.saturating_sub(self.requested.len()));
        if self.queue.len() < budget {
            self.refill_queue(now);
        }

        let mut picked = Vec::with_capacity(budget);
        while picked.len() < budget {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            self.requested.insert(request, now);
            picked.push(request);
        }
        picked
    }

    // Tops the queue back up to its cap from the eligible part of
    // `missing`: blocks neither in flight, nor already queued, nor queued
    // within the stale window. A request that went stale was queued even
    // earlier, so it comes back automatically. Oldest-queued entries go
    // first.
    fn refill_queue(&mut self, now: u64) {
        let room = MAX_QUEUE_LENGTH.saturating_sub(self.queue.len());
        if room == 0 {
            return;
        }
        let mut eligible: Vec<(BlockRequest, u64)> = self
            .missing
            .iter()
            .map(|(request, stamp)| (*request, *stamp))
            .filter(|(request, stamp)| {
                now.saturating_sub(*stamp) >= SECONDS_UNTIL_STALE
                    && !self.requested.contains_key(request)
                    && !self.queue.contains(request)
            })
            .collect();
        eligible.sort_by_key(|(_, stamp)| *stamp);
        for (request, _) in eligible.into_iter().take(room) {
            self.missing.insert(request, now);
            self.queue.push_back(request);
        }
    }

    /// Accounts for a downloaded block. Returns the assembled piece once
    /// the final block of a piece lands; blocks that were never requested
    /// are rejected untouched.
    pub fn add_downloaded_block(
        &mut self,
        block: Block,
    ) -> Result<Option<CompletedPiece>, PlannerError> {
        let key = block.key();
        if !self.requested.contains_key(&key) || !self.pieces.contains_key(&block.index) {
            return Err(PlannerError::BlockNotRequested);
        }

        self.requested.remove(&key);
        self.missing.remove(&key);
        if let Some(pos) = self.queue.iter().position(|queued| *queued == key) {
            self.queue.remove(pos);
        }

        let index = block.index;
        let last_of_piece = self
            .pieces
            .get(&index)
            .is_some_and(|progress| progress.blocks_remaining == 1);

        if !last_of_piece {
            self.downloaded.entry(index).or_default().push(block);
            if let Some(progress) = self.pieces.get_mut(&index) {
                progress.blocks_remaining -= 1;
            }
            return Ok(None);
        }

        let Some(progress) = self.pieces.remove(&index) else {
            return Ok(None);
        };
        let mut blocks = self.downloaded.remove(&index).unwrap_or_default();
        blocks.push(block);
        blocks.sort_by_key(|b| b.offset);

        let mut data = BytesMut::with_capacity(progress.info.length as usize);
        for block in &blocks {
            data.extend_from_slice(&block.data);
        }
        Ok(Some(CompletedPiece {
            info: progress.info,
            data: data.freeze(),
        }))
    }

    /// Drops every trace of `index` and returns the request keys that were
    /// in flight, so the caller can send wire-level cancels for them.
    pub fn cancel_piece(&mut self, index: u32) -> Vec<BlockRequest> {
        let in_flight: Vec<BlockRequest> = self
            .requested
            .keys()
            .filter(|request| request.index == index)
            .copied()
            .collect();

        self.queue.retain(|request| request.index != index);
        self.missing.retain(|request, _| request.index != index);
        self.requested.retain(|request, _| request.index != index);
        self.downloaded.remove(&index);
        self.pieces.remove(&index);
        in_flight
    }

    #[cfg(test)]
    pub(crate) fn blocks_remaining(&self, index: u32) -> Option<usize> {
        self.pieces.get(&index).map(|p| p.blocks_remaining)
    }

    #[cfg(test)]
    pub(crate) fn piece_table_len(&self) -> usize {
        self.pieces.len()
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
