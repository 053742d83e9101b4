use std::sync::atomic::{AtomicU64, Ordering};

/// Transfer counters shared between the coordinator (writer) and the
/// announcer (reader). Plain atomics: the values are statistics, not
/// coordination state.
#[derive(Debug, Default)]
pub struct SwarmStats {
    downloaded: AtomicU64,
    uploaded: AtomicU64,
    left: AtomicU64,
}

impl SwarmStats {
    pub fn new(left: u64) -> Self {
        Self {
            downloaded: AtomicU64::new(0),
            uploaded: AtomicU64::new(0),
            left: AtomicU64::new(left),
        }
    }

    pub fn add_downloaded(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::Relaxed);
        let mut left = self.left.load(Ordering::Relaxed);
        loop {
            let next = left.saturating_sub(bytes);
            match self
                .left
                .compare_exchange_weak(left, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => left = current,
            }
        }
    }

    pub fn add_uploaded(&self, bytes: u64) {
        self.uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::Relaxed)
    }

    pub fn left(&self) -> u64 {
        self.left.load(Ordering::Relaxed)
    }
}
