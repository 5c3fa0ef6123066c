use std::sync::atomic::{AtomicU64, Ordering};

/// Successes between milestone log lines.
pub const MILESTONE_EVERY: u64 = 100;

/// Monotonic count shared by every request task.
#[derive(Debug, Default)]
pub struct SuccessCounter {
    count: AtomicU64,
}

impl SuccessCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one and return the count including this increment.
    ///
    /// Each caller observes a distinct value, so exactly one caller sees any
    /// given multiple of [`MILESTONE_EVERY`].
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

pub fn is_milestone(count: u64) -> bool {
    count != 0 && count % MILESTONE_EVERY == 0
}
