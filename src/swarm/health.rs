use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Per-peer choke timeline, the input to assignment heuristics.
///
/// Every choke and unchoke we observe is appended with its arrival time.
/// A peer that has been choking us for its entire recorded history is a
/// poor place to put new work.
#[derive(Debug, Default)]
pub struct HealthTracker {
    timelines: HashMap<SocketAddr, Vec<(Instant, bool)>>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a timeline for a fresh peer; peers start out choking us.
    pub fn add_peer(&mut self, addr: SocketAddr) {
        self.timelines
            .entry(addr)
            .or_insert_with(|| vec![(Instant::now(), true)]);
    }

    pub fn record_choke(&mut self, addr: SocketAddr) {
        self.record(addr, true);
    }

    pub fn record_unchoke(&mut self, addr: SocketAddr) {
        self.record(addr, false);
    }

    fn record(&mut self, addr: SocketAddr, choked: bool) {
        self.timelines
            .entry(addr)
            .or_default()
            .push((Instant::now(), choked));
    }

    /// Whether the peer has never unchoked us despite at least `patience`
    /// of observed history. Unknown peers are given the benefit of the
    /// doubt.
    pub fn is_starving_us(&self, addr: &SocketAddr, patience: Duration) -> bool {
        let Some(timeline) = self.timelines.get(addr) else {
            return false;
        };
        let observed_long_enough = timeline
            .first()
            .is_some_and(|(start, _)| start.elapsed() >= patience);
        observed_long_enough && timeline.iter().all(|&(_, choked)| choked)
    }

    /// Fraction of observed time the peer kept us choked, `None` until
    /// anything was recorded.
    pub fn choked_fraction(&self, addr: &SocketAddr) -> Option<f64> {
        let timeline = self.timelines.get(addr)?;
        let (first, _) = timeline.first()?;
        let total = first.elapsed();
        if total.is_zero() {
            return None;
        }
        let mut choked_for = Duration::ZERO;
        for window in timeline.windows(2) {
            if window[0].1 {
                choked_for += window[1].0.duration_since(window[0].0);
            }
        }
        if let Some(&(last_at, choked)) = timeline.last() {
            if choked {
                choked_for += last_at.elapsed();
            }
        }
        Some(choked_for.as_secs_f64() / total.as_secs_f64())
    }

    pub fn remove_peer(&mut self, addr: &SocketAddr) {
        self.timelines.remove(addr);
    }
}
