use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use thiserror::Error;

use crate::analysis::domain::analyzer::{Analyzer, AnalyzerError, AnalyzerResult};
use crate::shared::constants::{
    CALL_THREADS_PER_WORKER, DEFAULT_CONCURRENCY, DEFAULT_QUEUE_TIMEOUT_MS,
};

#[derive(Error, Debug)]
pub enum CallError {
    #[error("analyzer call timed out after {0} ms")]
    TimedOut(u128),
    #[error("gave up waiting for the analyzer after {0} ms")]
    QueueTimedOut(u128),
    #[error("analyzer busy: {0} calls still running")]
    Saturated(usize),
    #[error("analyzer call panicked")]
    Panicked,
    #[error("{0}")]
    Analyzer(AnalyzerError),
}

const PENDING: u8 = 0;
const STARTED: u8 = 1;
const ABANDONED: u8 = 2;

enum CallEvent<T> {
    Started,
    Finished(AnalyzerResult<T>),
}

/// Releases a call thread's slot when the thread ends, even by panic.
struct ThreadSlot(Arc<AtomicUsize>);

impl Drop for ThreadSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs analyzer calls on their own threads with a deadline and, for
/// analyzers that are not reentrant, one lock shared by every clone.
///
/// The call deadline starts once the call holds the lock. Time spent queued
/// behind other calls is bounded separately by the queue timeout; a call
/// given up while queued never reaches the analyzer. A call that misses its
/// deadline keeps running (and holding the lock) until the analyzer
/// returns. At most `max_threads` call threads exist at once; beyond that
/// calls fail with [`CallError::Saturated`].
#[derive(Clone)]
pub struct CallGuard {
    lock: Option<Arc<Mutex<()>>>,
    call_timeout: Duration,
    queue_timeout: Duration,
    threads: Arc<AtomicUsize>,
    max_threads: usize,
}

impl CallGuard {
    pub fn new(call_timeout: Duration, serialized: bool) -> Self {
        Self {
            lock: serialized.then(|| Arc::new(Mutex::new(()))),
            call_timeout,
            queue_timeout: Duration::from_millis(DEFAULT_QUEUE_TIMEOUT_MS),
            threads: Arc::new(AtomicUsize::new(0)),
            max_threads: DEFAULT_CONCURRENCY * CALL_THREADS_PER_WORKER,
        }
    }

    pub fn with_queue_timeout(mut self, queue_timeout: Duration) -> Self {
        self.queue_timeout = queue_timeout;
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads.max(1);
        self
    }

    pub fn is_serialized(&self) -> bool {
        self.lock.is_some()
    }

    /// Call threads currently alive, including abandoned ones.
    pub fn threads_in_use(&self) -> usize {
        self.threads.load(Ordering::SeqCst)
    }

    pub fn call<T, F>(&self, analyzer: &Arc<dyn Analyzer>, f: F) -> Result<T, CallError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn Analyzer) -> AnalyzerResult<T> + Send + 'static,
    {
        let running = self.threads.fetch_add(1, Ordering::SeqCst);
        let slot = ThreadSlot(Arc::clone(&self.threads));
        if running >= self.max_threads {
            return Err(CallError::Saturated(running));
        }

        let (tx, rx) = crossbeam_channel::bounded(2);
        let state = Arc::new(AtomicU8::new(PENDING));
        let call_state = Arc::clone(&state);
        let analyzer = Arc::clone(analyzer);
        let lock = self.lock.clone();

        thread::spawn(move || {
            let _slot = slot;
            let _serialized = lock
                .as_ref()
                .map(|l| l.lock().unwrap_or_else(PoisonError::into_inner));
            if call_state
                .compare_exchange(PENDING, STARTED, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return;
            }
            let _ = tx.send(CallEvent::Started);
            let _ = tx.send(CallEvent::Finished(f(analyzer.as_ref())));
        });

        match rx.recv_timeout(self.queue_timeout) {
            Ok(CallEvent::Started) => {}
            Ok(CallEvent::Finished(result)) => return result.map_err(CallError::Analyzer),
            Err(RecvTimeoutError::Timeout) => {
                let gave_up = state
                    .compare_exchange(PENDING, ABANDONED, Ordering::SeqCst, Ordering::SeqCst)
                    .is_ok();
                if gave_up {
                    return Err(CallError::QueueTimedOut(self.queue_timeout.as_millis()));
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Err(CallError::Panicked),
        }

        let deadline = Instant::now() + self.call_timeout;
        loop {
            match rx.recv_deadline(deadline) {
                Ok(CallEvent::Started) => continue,
                Ok(CallEvent::Finished(result)) => return result.map_err(CallError::Analyzer),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(CallError::TimedOut(self.call_timeout.as_millis()))
                }
                Err(RecvTimeoutError::Disconnected) => return Err(CallError::Panicked),
            }
        }
    }
}
