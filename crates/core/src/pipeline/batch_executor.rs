use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::analysis::domain::analysis::PairOutcome;
use crate::transcript::domain::transcript_pair::TranscriptPair;

use super::batch_generation::BatchTicket;

/// Work applied to each pair. Must never panic on analyzer failure; errors
/// are returned as [`PairOutcome::Failure`].
pub type PairJob<'a> = &'a (dyn Fn(&TranscriptPair) -> PairOutcome + Sync);

/// Configuration for a batch execution run.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub ticket: BatchTicket,
    pub cancelled: Arc<AtomicBool>,
}

impl BatchConfig {
    pub fn new(ticket: BatchTicket) -> Self {
        Self {
            ticket,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// True once the batch was cancelled or a newer batch started.
    pub fn should_stop(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed) || !self.ticket.is_current()
    }
}

/// Abstracts how per-pair jobs of a batch are scheduled.
///
/// Implementations return the outcomes of every dispatched pair in input
/// order. Pairs that were never dispatched because the batch stopped are
/// left out, so a short result means the batch did not finish.
pub trait BatchExecutor: Send + Sync {
    /// Pairs that may be in flight at once.
    fn workers(&self) -> usize;

    fn execute(
        &self,
        pairs: &[TranscriptPair],
        job: PairJob<'_>,
        config: &BatchConfig,
    ) -> Vec<PairOutcome>;
}
