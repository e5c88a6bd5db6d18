use crate::analysis::domain::analysis::PairOutcome;
use crate::pipeline::batch_executor::{BatchConfig, BatchExecutor, PairJob};
use crate::transcript::domain::transcript_pair::TranscriptPair;

/// Runs every job on the calling thread, one pair at a time.
#[derive(Debug, Default)]
pub struct SequentialBatchExecutor;

impl SequentialBatchExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl BatchExecutor for SequentialBatchExecutor {
    fn workers(&self) -> usize {
        1
    }

    fn execute(
        &self,
        pairs: &[TranscriptPair],
        job: PairJob<'_>,
        config: &BatchConfig,
    ) -> Vec<PairOutcome> {
        let mut outcomes = Vec::with_capacity(pairs.len());
        for pair in pairs {
            if config.should_stop() {
                break;
            }
            outcomes.push(job(pair));
        }
        outcomes
    }
}
