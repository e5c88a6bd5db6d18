pub const DEFAULT_SYSTEM: &str = "hayes-ipa-arpabet";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8765";

/// Worker threads used when no concurrency limit is configured.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Upper bound for a single analyzer call before the pair is reported as failed.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;

pub const CSV_EXTENSION: &str = "csv";

/// Shown in place of a rate or count that does not apply.
pub const NOT_APPLICABLE: &str = "\u{2014}";

/// How long a call may wait for a non-reentrant analyzer to become free.
pub const DEFAULT_QUEUE_TIMEOUT_MS: u64 = 300_000;

/// Analyzer call threads allowed per batch worker, counting calls that were
/// given up on but are still running.
pub const CALL_THREADS_PER_WORKER: usize = 2;
