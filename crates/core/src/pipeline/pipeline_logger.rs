use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Cross-cutting logger for batch analysis events.
///
/// Keeps the adapter independent of where progress and timing end up
/// (log crate, a UI, nowhere).
pub trait PipelineLogger: Send {
    /// Called when a batch starts, before any of its events.
    fn begin_batch(&mut self, _generation: u64, _total: usize) {}

    fn progress(&mut self, current: usize, total: usize);

    /// Record how long one analyzer call of `stage` took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    /// Emit the summary of the current batch.
    fn summary(&self) {}
}

/// Discards everything.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct StageStats {
    calls: usize,
    total_ms: f64,
    max_ms: f64,
}

impl StageStats {
    fn record(&mut self, duration_ms: f64) {
        self.calls += 1;
        self.total_ms += duration_ms;
        self.max_ms = self.max_ms.max(duration_ms);
    }

    fn mean_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_ms / self.calls as f64
        }
    }
}

/// Writes batch events through the `log` crate and summarizes each batch
/// when it completes.
///
/// Stage timings and metrics cover the current batch only; they are cleared
/// by [`PipelineLogger::begin_batch`]. Progress lines are logged every
/// `progress_interval` utterances and on the last one.
pub struct LogPipelineLogger {
    progress_interval: usize,
    generation: u64,
    started: Instant,
    total: usize,
    completed: usize,
    stages: BTreeMap<String, StageStats>,
    metrics: BTreeMap<String, f64>,
}

impl LogPipelineLogger {
    pub fn new(progress_interval: usize) -> Self {
        Self {
            progress_interval: progress_interval.max(1),
            generation: 0,
            started: Instant::now(),
            total: 0,
            completed: 0,
            stages: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    /// The summary of the current batch, or `None` before anything was
    /// recorded in it.
    pub fn summary_string(&self) -> Option<String> {
        self.render_summary(self.started.elapsed())
    }

    fn render_summary(&self, elapsed: Duration) -> Option<String> {
        if self.stages.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let secs = elapsed.as_secs_f64();
        let mut lines = vec![format!(
            "Batch {} summary ({}/{} utterances in {secs:.1}s):",
            self.generation, self.completed, self.total
        )];
        for (stage, stats) in &self.stages {
            lines.push(format!(
                "  {stage:14} {:5} calls  mean {:7.1}ms  max {:7.1}ms",
                stats.calls,
                stats.mean_ms(),
                stats.max_ms
            ));
        }
        for (name, value) in &self.metrics {
            lines.push(format!("  {name}: {value}"));
        }
        if self.completed > 0 && secs > 0.0 {
            lines.push(format!(
                "  {:.1} utterances/s",
                self.completed as f64 / secs
            ));
        }
        Some(lines.join("\n"))
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(25)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn begin_batch(&mut self, generation: u64, total: usize) {
        self.generation = generation;
        self.started = Instant::now();
        self.total = total;
        self.completed = 0;
        self.stages.clear();
        self.metrics.clear();
    }

    fn progress(&mut self, current: usize, total: usize) {
        self.completed = self.completed.max(current);
        self.total = total;
        if total > 0 && (current % self.progress_interval == 0 || current == total) {
            log::info!(
                "Analyzed {current}/{total} utterances ({:.1}%)",
                current as f64 / total as f64 * 100.0
            );
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.stages
            .entry(stage.to_string())
            .or_default()
            .record(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n{text}");
        }
    }
}
