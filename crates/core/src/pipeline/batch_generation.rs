use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic batch counter. Starting a batch makes every earlier ticket
/// stale, so results of an upload that was replaced can be dropped.
#[derive(Clone, Debug, Default)]
pub struct BatchGeneration {
    current: Arc<AtomicU64>,
}

impl BatchGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> BatchTicket {
        let generation = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        BatchTicket {
            current: Arc::clone(&self.current),
            generation,
        }
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct BatchTicket {
    current: Arc<AtomicU64>,
    generation: u64,
}

impl BatchTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}
