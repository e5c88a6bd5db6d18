use std::thread;

use crate::analysis::domain::analysis::PairOutcome;
use crate::pipeline::batch_executor::{BatchConfig, BatchExecutor, PairJob};
use crate::shared::constants::DEFAULT_CONCURRENCY;
use crate::transcript::domain::transcript_pair::TranscriptPair;

/// Executes a batch on a fixed pool of worker threads.
///
/// Layout: `dispatcher → [bounded job queue] → N workers → collector`
///
/// The job queue holds at most one pending index per worker, so the
/// dispatcher blocks while every worker is busy. The collector (the calling
/// thread) restores input order.
pub struct ThreadedBatchExecutor {
    workers: usize,
}

impl ThreadedBatchExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }
}

impl Default for ThreadedBatchExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl BatchExecutor for ThreadedBatchExecutor {
    fn workers(&self) -> usize {
        self.workers
    }

    fn execute(
        &self,
        pairs: &[TranscriptPair],
        job: PairJob<'_>,
        config: &BatchConfig,
    ) -> Vec<PairOutcome> {
        let total = pairs.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = self.workers.min(total);

        let (job_tx, job_rx) = crossbeam_channel::bounded::<usize>(workers);
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<(usize, PairOutcome)>();

        let mut slots: Vec<Option<PairOutcome>> = Vec::with_capacity(total);
        slots.resize_with(total, || None);

        thread::scope(|s| {
            for _ in 0..workers {
                spawn_worker(s, pairs, job, config, job_rx.clone(), done_tx.clone());
            }
            drop(job_rx);
            drop(done_tx);

            s.spawn(move || {
                for index in 0..total {
                    if config.should_stop() {
                        break;
                    }
                    if job_tx.send(index).is_err() {
                        break;
                    }
                }
            });

            for (index, outcome) in done_rx {
                slots[index] = Some(outcome);
            }
        });

        slots.into_iter().flatten().collect()
    }
}

fn spawn_worker<'scope, 'env>(
    s: &'scope thread::Scope<'scope, 'env>,
    pairs: &'env [TranscriptPair],
    job: PairJob<'env>,
    config: &'env BatchConfig,
    job_rx: crossbeam_channel::Receiver<usize>,
    done_tx: crossbeam_channel::Sender<(usize, PairOutcome)>,
) {
    s.spawn(move || {
        for index in job_rx {
            if config.should_stop() {
                break;
            }
            let outcome = job(&pairs[index]);
            if done_tx.send((index, outcome)).is_err() {
                break;
            }
        }
    });
}
