use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::analysis::domain::analysis::{Analysis, AnalysisException, PairOutcome};
use crate::analysis::domain::analysis_collection::AnalysisCollection;
use crate::analysis::domain::analysis_detail::AnalysisDetail;
use crate::analysis::domain::analyzer::{Analyzer, AnalyzerFactory};
use crate::analysis::domain::feature_delta::FeatureDelta;
use crate::shared::constants::{CALL_THREADS_PER_WORKER, DEFAULT_QUEUE_TIMEOUT_MS};
use crate::transcript::domain::transcript_pair::TranscriptPair;

use super::batch_executor::{BatchConfig, BatchExecutor};
use super::batch_generation::BatchGeneration;
use super::call_guard::CallGuard;
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("analyzer unavailable: {0}")]
    AnalyzerUnavailable(String),
    #[error("batch {generation} was superseded by a newer batch")]
    Superseded { generation: u64 },
    #[error("batch {generation} was cancelled after {completed} of {total} pairs")]
    Cancelled {
        generation: u64,
        completed: usize,
        total: usize,
    },
    #[error("feature deltas for '{left}' / '{right}' failed: {message}")]
    Deltas {
        left: String,
        right: String,
        message: String,
    },
}

/// Progress callback: `(completed, total)`. Returning `false` cancels the
/// batch.
pub type ProgressFn = Box<dyn Fn(usize, usize) -> bool + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DiffKind {
    Feature,
    Phoneme,
}

impl DiffKind {
    fn stage(self) -> &'static str {
        match self {
            DiffKind::Feature => "feature_diff",
            DiffKind::Phoneme => "phoneme_diff",
        }
    }

    fn label(self) -> &'static str {
        match self {
            DiffKind::Feature => "feature diff",
            DiffKind::Phoneme => "phoneme diff",
        }
    }
}

/// Runs transcript pairs through the analyzer and collects the results.
///
/// Owns the analyzer: it is built from the factory on first use and reused
/// for the adapter's lifetime, together with the [`CallGuard`] every call to
/// it goes through. A pair whose analyzer call fails, times out
/// or returns a malformed diff becomes an [`AnalysisException`]; the rest of
/// the batch carries on. Starting a batch supersedes any batch still in
/// flight on the same adapter.
pub struct AnalyzerAdapter {
    factory: AnalyzerFactory,
    analyzer: Mutex<Option<(Arc<dyn Analyzer>, CallGuard)>>,
    executor: Box<dyn BatchExecutor>,
    call_timeout: Duration,
    queue_timeout: Duration,
    generations: BatchGeneration,
    logger: Mutex<Box<dyn PipelineLogger>>,
}

impl AnalyzerAdapter {
    pub fn new(
        factory: AnalyzerFactory,
        executor: Box<dyn BatchExecutor>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            factory,
            analyzer: Mutex::new(None),
            executor,
            call_timeout,
            queue_timeout: Duration::from_millis(DEFAULT_QUEUE_TIMEOUT_MS),
            generations: BatchGeneration::new(),
            logger: Mutex::new(Box::new(NullPipelineLogger)),
        }
    }

    /// Bounds how long a call may wait for a non-reentrant analyzer that is
    /// busy with other calls.
    pub fn with_queue_timeout(mut self, queue_timeout: Duration) -> Self {
        self.queue_timeout = queue_timeout;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = Mutex::new(logger);
        self
    }

    /// Whether the analyzer has been built yet.
    pub fn is_initialized(&self) -> bool {
        self.analyzer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn current_generation(&self) -> u64 {
        self.generations.current()
    }

    /// Analyzes every pair and returns the collection for this batch.
    ///
    /// Fails only when the analyzer cannot be built, when the batch was
    /// cancelled through `on_progress`, or when a newer batch started before
    /// this one finished.
    pub fn analyze_all(
        &self,
        pairs: &[TranscriptPair],
        on_progress: Option<ProgressFn>,
    ) -> Result<AnalysisCollection, AnalysisError> {
        let ticket = self.generations.begin();
        let generation = ticket.generation();
        let (analyzer, guard) = self.analyzer()?;
        let total = pairs.len();

        self.log(|l| {
            l.begin_batch(generation, total);
            l.info(&format!(
                "Analyzing {total} transcript pairs (batch {generation}, {} analyzer calls)",
                if guard.is_serialized() {
                    "serialized"
                } else {
                    "concurrent"
                }
            ))
        });

        let config = BatchConfig::new(ticket.clone());
        let completed = AtomicUsize::new(0);
        let job = |pair: &TranscriptPair| {
            let outcome = self.analyze_with(&analyzer, &guard, pair);
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            self.log(|l| l.progress(done, total));
            if let Some(callback) = &on_progress {
                if !callback(done, total) {
                    config.cancelled.store(true, Ordering::Relaxed);
                }
            }
            outcome
        };

        let outcomes = self.executor.execute(pairs, &job, &config);

        if !ticket.is_current() {
            log::info!("Discarding results of superseded batch {generation}");
            return Err(AnalysisError::Superseded { generation });
        }
        if outcomes.len() < total {
            return Err(AnalysisError::Cancelled {
                generation,
                completed: outcomes.len(),
                total,
            });
        }

        let collection = AnalysisCollection::from_outcomes(outcomes);
        self.log(|l| {
            l.metric("failed_pairs", collection.exceptions().len() as f64);
            l.summary();
        });
        log::info!(
            "Batch {generation}: {} analyzed, {} failed, FER {}, PER {}",
            collection.analyses().len(),
            collection.exceptions().len(),
            collection.fer(),
            collection.per()
        );

        Ok(collection)
    }

    /// Analyzes a single pair outside of any batch.
    pub fn analyze_pair(&self, pair: &TranscriptPair) -> Result<PairOutcome, AnalysisError> {
        let (analyzer, guard) = self.analyzer()?;
        Ok(self.analyze_with(&analyzer, &guard, pair))
    }

    /// Fetches feature deltas for one substitution step. Returns nothing
    /// without calling the analyzer when either side is empty.
    pub fn get_deltas(&self, left: &str, right: &str) -> Result<Vec<FeatureDelta>, AnalysisError> {
        if left.trim().is_empty() || right.trim().is_empty() {
            return Ok(Vec::new());
        }

        let deltas_error = |message: String| AnalysisError::Deltas {
            left: left.to_string(),
            right: right.to_string(),
            message,
        };

        let (analyzer, guard) = self.analyzer()?;
        let (lhs, rhs) = (left.to_string(), right.to_string());
        let start = Instant::now();
        let raw = guard
            .call(&analyzer, move |a| a.feature_deltas(&lhs, &rhs))
            .map_err(|e| deltas_error(e.to_string()))?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.log(|l| l.timing("feature_deltas", elapsed_ms));

        raw.deltas
            .into_iter()
            .map(FeatureDelta::from_raw)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| deltas_error(e.to_string()))
    }

    fn analyze_with(
        &self,
        analyzer: &Arc<dyn Analyzer>,
        guard: &CallGuard,
        pair: &TranscriptPair,
    ) -> PairOutcome {
        let result = self
            .diff(analyzer, guard, DiffKind::Feature, pair)
            .and_then(|features| {
                let phonemes = self.diff(analyzer, guard, DiffKind::Phoneme, pair)?;
                Ok((features, phonemes))
            });

        match result {
            Ok((features, phonemes)) => {
                PairOutcome::Success(Analysis::new(pair.clone(), features, phonemes))
            }
            Err(message) => {
                log::warn!("Analysis of '{}' failed: {message}", pair.id);
                PairOutcome::Failure(AnalysisException::new(&pair.id, message))
            }
        }
    }

    fn diff(
        &self,
        analyzer: &Arc<dyn Analyzer>,
        guard: &CallGuard,
        kind: DiffKind,
        pair: &TranscriptPair,
    ) -> Result<AnalysisDetail, String> {
        let (left, right) = (pair.left.clone(), pair.right.clone());
        let start = Instant::now();
        let raw = guard
            .call(analyzer, move |a| match kind {
                DiffKind::Feature => a.feature_diff(&left, &right),
                DiffKind::Phoneme => a.phoneme_diff(&left, &right),
            })
            .map_err(|e| format!("{}: {e}", kind.label()))?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        self.log(|l| l.timing(kind.stage(), elapsed_ms));

        AnalysisDetail::from_raw(raw).map_err(|e| format!("{}: {e}", kind.label()))
    }

    fn analyzer(&self) -> Result<(Arc<dyn Analyzer>, CallGuard), AnalysisError> {
        let mut slot = self.analyzer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((analyzer, guard)) = slot.as_ref() {
            return Ok((Arc::clone(analyzer), guard.clone()));
        }

        log::info!("Constructing analyzer");
        let analyzer =
            (self.factory)().map_err(|e| AnalysisError::AnalyzerUnavailable(e.to_string()))?;
        let guard = CallGuard::new(self.call_timeout, !analyzer.is_reentrant())
            .with_queue_timeout(self.queue_timeout)
            .with_max_threads(self.executor.workers() * CALL_THREADS_PER_WORKER);
        *slot = Some((Arc::clone(&analyzer), guard.clone()));
        Ok((analyzer, guard))
    }

    fn log(&self, f: impl FnOnce(&mut dyn PipelineLogger)) {
        let mut logger = self.logger.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut **logger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::analyzer::{
        AnalyzerResult, RawDelta, RawDeltas, RawDiff, RawStep,
    };
    use crate::analysis::domain::diff_step::DiffAction;
    use crate::analysis::domain::error_rate::ErrorRate;
    use crate::analysis::domain::feature_delta::FeatureValue;
    use crate::pipeline::infrastructure::sequential_batch_executor::SequentialBatchExecutor;
    use crate::pipeline::infrastructure::threaded_batch_executor::ThreadedBatchExecutor;
    use approx::assert_relative_eq;
    use crossbeam_channel::{Receiver, Sender};
    use std::thread;

    const FEATURES_PER_PHONEME: f64 = 24.0;
    const FEATURE_SUB_COST: f64 = 5.0;

    // --- Stubs ---

    /// Aligns tokens position by position. `ERR` tokens make every call fail
    /// and `HANG` tokens make calls sleep for 600 ms.
    struct StubAnalyzer {
        reentrant: bool,
        delay: Duration,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl StubAnalyzer {
        fn new(reentrant: bool) -> Self {
            Self {
                reentrant,
                delay: Duration::from_millis(2),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn positional(
            &self,
            left: &str,
            right: &str,
            sub_cost: f64,
            indel_cost: f64,
            unit: f64,
        ) -> AnalyzerResult<RawDiff> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            let result = positional_diff(left, right, sub_cost, indel_cost, unit);
            if left.contains("HANG") {
                thread::sleep(Duration::from_millis(600));
            } else {
                thread::sleep(self.delay);
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    fn positional_diff(
        left: &str,
        right: &str,
        sub_cost: f64,
        indel_cost: f64,
        unit: f64,
    ) -> AnalyzerResult<RawDiff> {
        let l: Vec<&str> = left.split_whitespace().collect();
        let r: Vec<&str> = right.split_whitespace().collect();
        if l.contains(&"ERR") || r.contains(&"ERR") {
            return Err("unknown symbol ERR".into());
        }

        let steps: Vec<RawStep> = (0..l.len().max(r.len()))
            .map(|i| {
                let (action, cost) = match (l.get(i), r.get(i)) {
                    (Some(a), Some(b)) if a == b => ("EQ", 0.0),
                    (Some(_), Some(_)) => ("SUB", sub_cost),
                    (Some(_), None) => ("DEL", indel_cost),
                    _ => ("INS", indel_cost),
                };
                RawStep {
                    action: action.to_string(),
                    left: Some(l.get(i).copied().unwrap_or("").to_string()),
                    right: Some(r.get(i).copied().unwrap_or("").to_string()),
                    cost,
                }
            })
            .collect();
        let cost: f64 = steps.iter().map(|s| s.cost).sum();
        let length = l.len() as f64 * unit;
        Ok(RawDiff {
            cost,
            length,
            error_rate: Some(if length > 0.0 { cost / length } else { 0.0 }),
            steps,
        })
    }

    impl Analyzer for StubAnalyzer {
        fn feature_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff> {
            self.positional(
                left,
                right,
                FEATURE_SUB_COST,
                FEATURES_PER_PHONEME,
                FEATURES_PER_PHONEME,
            )
        }

        fn phoneme_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff> {
            self.positional(left, right, 1.0, 1.0, 1.0)
        }

        fn feature_deltas(&self, left: &str, _right: &str) -> AnalyzerResult<RawDeltas> {
            if left == "ERR" {
                return Err("unknown symbol ERR".into());
            }
            Ok(RawDeltas {
                deltas: vec![RawDelta {
                    name: "voice".to_string(),
                    left: Some("-".to_string()),
                    right: Some("+".to_string()),
                    cost: FEATURE_SUB_COST,
                }],
            })
        }

        fn is_reentrant(&self) -> bool {
            self.reentrant
        }
    }

    /// Blocks feature diffs of `WAIT` until released.
    struct GateAnalyzer {
        started: Sender<()>,
        release: Receiver<()>,
    }

    impl Analyzer for GateAnalyzer {
        fn feature_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff> {
            if left == "WAIT" {
                let _ = self.started.send(());
                let _ = self.release.recv_timeout(Duration::from_secs(5));
            }
            positional_diff(left, right, 1.0, 1.0, 1.0)
        }

        fn phoneme_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff> {
            positional_diff(left, right, 1.0, 1.0, 1.0)
        }

        fn feature_deltas(&self, _left: &str, _right: &str) -> AnalyzerResult<RawDeltas> {
            Ok(RawDeltas::default())
        }

        fn is_reentrant(&self) -> bool {
            true
        }
    }

    /// Returns a step that breaks the EQ cost rule.
    struct MalformedAnalyzer;

    impl Analyzer for MalformedAnalyzer {
        fn feature_diff(&self, _left: &str, _right: &str) -> AnalyzerResult<RawDiff> {
            Ok(RawDiff {
                cost: 1.0,
                length: 1.0,
                error_rate: Some(1.0),
                steps: vec![RawStep {
                    action: "EQ".to_string(),
                    left: Some("K".to_string()),
                    right: Some("K".to_string()),
                    cost: 1.0,
                }],
            })
        }

        fn phoneme_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff> {
            positional_diff(left, right, 1.0, 1.0, 1.0)
        }

        fn feature_deltas(&self, _left: &str, _right: &str) -> AnalyzerResult<RawDeltas> {
            Ok(RawDeltas::default())
        }
    }

    struct RecordingLogger {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl PipelineLogger for RecordingLogger {
        fn begin_batch(&mut self, generation: u64, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("begin {generation}/{total}"));
        }
        fn progress(&mut self, current: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("progress {current}/{total}"));
        }
        fn timing(&mut self, stage: &str, _duration_ms: f64) {
            self.events.lock().unwrap().push(format!("timing {stage}"));
        }
        fn metric(&mut self, name: &str, value: f64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("metric {name}={value}"));
        }
        fn info(&mut self, _message: &str) {}
    }

    // --- Helpers ---

    fn factory_for(analyzer: Arc<dyn Analyzer>, built: Arc<AtomicUsize>) -> AnalyzerFactory {
        Box::new(move || {
            built.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::clone(&analyzer))
        })
    }

    fn adapter_with(analyzer: Arc<dyn Analyzer>, executor: Box<dyn BatchExecutor>) -> AnalyzerAdapter {
        AnalyzerAdapter::new(
            factory_for(analyzer, Arc::new(AtomicUsize::new(0))),
            executor,
            Duration::from_secs(5),
        )
    }

    fn stub_adapter() -> AnalyzerAdapter {
        adapter_with(
            Arc::new(StubAnalyzer::new(false)),
            Box::new(SequentialBatchExecutor::new()),
        )
    }

    fn pair(id: &str, left: &str, right: &str) -> TranscriptPair {
        TranscriptPair::new(id, left, right)
    }

    fn success(outcome: PairOutcome) -> Analysis {
        match outcome {
            PairOutcome::Success(a) => a,
            PairOutcome::Failure(e) => panic!("unexpected failure: {}", e.message),
        }
    }

    // --- Single pairs ---

    #[test]
    fn test_identity_pair_is_all_equal() {
        let adapter = stub_adapter();

        let analysis = success(adapter.analyze_pair(&pair("u1", "K AE T", "K AE T")).unwrap());

        for detail in [&analysis.features, &analysis.phonemes] {
            assert!(detail.steps().iter().all(|s| s.action() == DiffAction::Eq));
            assert!(detail.steps().iter().all(|s| s.cost() == 0.0));
            assert_eq!(detail.distance(), 0.0);
            assert_eq!(detail.error_rate(), ErrorRate::Defined(0.0));
        }
        assert_eq!(analysis.fer, ErrorRate::Defined(0.0));
        assert_eq!(analysis.per, ErrorRate::Defined(0.0));
    }

    #[test]
    fn test_substitution_pair_has_one_sub_step() {
        let adapter = stub_adapter();

        let analysis = success(adapter.analyze_pair(&pair("u1", "K AE T", "B AE T")).unwrap());

        for detail in [&analysis.features, &analysis.phonemes] {
            let subs: Vec<_> = detail
                .steps()
                .iter()
                .filter(|s| s.action() == DiffAction::Sub)
                .collect();
            assert_eq!(subs.len(), 1);
            assert_eq!(subs[0].left(), Some("K"));
            assert_eq!(subs[0].right(), Some("B"));
            assert!(subs[0].cost() > 0.0);

            let rest = detail.steps().iter().filter(|s| s.action() != DiffAction::Sub);
            for step in rest {
                assert_eq!(step.action(), DiffAction::Eq);
                assert_eq!(step.cost(), 0.0);
            }
        }
        assert_relative_eq!(analysis.per.value().unwrap(), 1.0 / 3.0);
        assert_relative_eq!(
            analysis.fer.value().unwrap(),
            FEATURE_SUB_COST / (3.0 * FEATURES_PER_PHONEME)
        );
    }

    #[test]
    fn test_deletion_and_insertion_sides() {
        let adapter = stub_adapter();

        let shorter = success(adapter.analyze_pair(&pair("d", "K AE T", "K AE")).unwrap());
        let del = shorter.phonemes.steps().last().unwrap();
        assert_eq!(del.action(), DiffAction::Del);
        assert_eq!((del.left(), del.right()), (Some("T"), None));

        let longer = success(adapter.analyze_pair(&pair("i", "K AE", "K AE T")).unwrap());
        let ins = longer.phonemes.steps().last().unwrap();
        assert_eq!(ins.action(), DiffAction::Ins);
        assert_eq!((ins.left(), ins.right()), (None, Some("T")));
    }

    #[test]
    fn test_empty_reference_has_undefined_rate() {
        let adapter = stub_adapter();
        let analysis = success(adapter.analyze_pair(&pair("u1", "", "K")).unwrap());
        assert_eq!(analysis.per, ErrorRate::Undefined);
        assert_eq!(analysis.per.as_percent(), "\u{2014}");
    }

    #[test]
    fn test_malformed_diff_becomes_exception() {
        let adapter = adapter_with(
            Arc::new(MalformedAnalyzer),
            Box::new(SequentialBatchExecutor::new()),
        );

        let outcome = adapter.analyze_pair(&pair("u1", "K", "K")).unwrap();

        match outcome {
            PairOutcome::Failure(e) => {
                assert_eq!(e.id, "u1");
                assert!(e.message.starts_with("feature diff: EQ step must have cost 0"));
            }
            PairOutcome::Success(_) => panic!("expected failure"),
        }
    }

    // --- Batches ---

    #[rstest::rstest]
    #[case::sequential(Box::new(SequentialBatchExecutor::new()) as Box<dyn BatchExecutor>)]
    #[case::threaded(Box::new(ThreadedBatchExecutor::new(4)) as Box<dyn BatchExecutor>)]
    fn test_partial_failure_is_isolated(#[case] executor: Box<dyn BatchExecutor>) {
        let adapter = adapter_with(Arc::new(StubAnalyzer::new(true)), executor);
        let pairs = vec![
            pair("u1", "K AE T", "B AE T"),
            pair("u2", "K ERR T", "K AE T"),
            pair("u3", "S IY", "S IY"),
        ];

        let collection = adapter.analyze_all(&pairs, None).unwrap();

        assert_eq!(collection.analyses().len(), 2);
        assert_eq!(collection.exceptions().len(), 1);
        assert_eq!(collection.exceptions()[0].id, "u2");
        assert!(collection.exceptions()[0].message.contains("unknown symbol ERR"));

        // Pairs 1 and 3 only: phoneme distance 1 over 3 + 2 tokens.
        assert_relative_eq!(collection.per().value().unwrap(), 1.0 / 5.0);
        assert_relative_eq!(
            collection.fer().value().unwrap(),
            FEATURE_SUB_COST / (5.0 * FEATURES_PER_PHONEME)
        );
    }

    #[test]
    fn test_batch_preserves_order_with_threads() {
        let adapter = adapter_with(
            Arc::new(StubAnalyzer::new(true)),
            Box::new(ThreadedBatchExecutor::new(3)),
        );
        let pairs: Vec<_> = (0..12)
            .map(|i| pair(&format!("u{i:02}"), "K AE T", "K AE T"))
            .collect();

        let collection = adapter.analyze_all(&pairs, None).unwrap();

        let ids: Vec<_> = collection.analyses().iter().map(|a| a.id.clone()).collect();
        let expected: Vec<_> = pairs.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_empty_batch_has_undefined_aggregates() {
        let collection = stub_adapter().analyze_all(&[], None).unwrap();
        assert!(collection.is_empty());
        assert_eq!(collection.fer(), ErrorRate::Undefined);
    }

    #[test]
    fn test_analyzer_built_once_and_lazily() {
        let built = Arc::new(AtomicUsize::new(0));
        let adapter = AnalyzerAdapter::new(
            factory_for(Arc::new(StubAnalyzer::new(true)), built.clone()),
            Box::new(SequentialBatchExecutor::new()),
            Duration::from_secs(5),
        );
        assert!(!adapter.is_initialized());
        assert_eq!(built.load(Ordering::SeqCst), 0);

        adapter.analyze_all(&[pair("a", "K", "K")], None).unwrap();
        adapter.analyze_all(&[pair("b", "K", "B")], None).unwrap();
        adapter.get_deltas("K", "B").unwrap();

        assert!(adapter.is_initialized());
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_factory_failure_fails_batch() {
        let adapter = AnalyzerAdapter::new(
            Box::new(|| Err("unknown system 'klingon'".into())),
            Box::new(SequentialBatchExecutor::new()),
            Duration::from_secs(5),
        );

        let err = adapter.analyze_all(&[pair("a", "K", "K")], None).unwrap_err();

        assert!(matches!(err, AnalysisError::AnalyzerUnavailable(_)));
        assert!(err.to_string().contains("klingon"));
        assert!(!adapter.is_initialized());
    }

    #[test]
    fn test_timeout_becomes_exception() {
        let adapter = AnalyzerAdapter::new(
            factory_for(
                Arc::new(StubAnalyzer::new(true)),
                Arc::new(AtomicUsize::new(0)),
            ),
            Box::new(ThreadedBatchExecutor::new(2)),
            Duration::from_millis(100),
        );
        let pairs = vec![pair("slow", "HANG", "HANG"), pair("fast", "K", "K")];

        let collection = adapter.analyze_all(&pairs, None).unwrap();

        assert_eq!(collection.analyses().len(), 1);
        assert_eq!(collection.analyses()[0].id, "fast");
        assert_eq!(collection.exceptions()[0].id, "slow");
        assert_eq!(
            collection.exceptions()[0].message,
            "feature diff: analyzer call timed out after 100 ms"
        );
    }

    #[test]
    fn test_non_reentrant_analyzer_calls_are_serialized() {
        let stub = Arc::new(StubAnalyzer::new(false));
        let adapter = adapter_with(stub.clone(), Box::new(ThreadedBatchExecutor::new(4)));
        let pairs: Vec<_> = (0..8).map(|i| pair(&format!("u{i}"), "K", "B")).collect();

        adapter.analyze_all(&pairs, None).unwrap();

        assert_eq!(stub.max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_waiting_for_serialized_analyzer_is_not_a_timeout() {
        let stub = Arc::new(StubAnalyzer::new(false).with_delay(Duration::from_millis(60)));
        let adapter = AnalyzerAdapter::new(
            factory_for(stub.clone(), Arc::new(AtomicUsize::new(0))),
            Box::new(ThreadedBatchExecutor::new(4)),
            Duration::from_millis(150),
        );
        let pairs: Vec<_> = (0..8).map(|i| pair(&format!("u{i}"), "K", "B")).collect();

        let collection = adapter.analyze_all(&pairs, None).unwrap();

        assert_eq!(collection.analyses().len(), 8);
        assert!(collection.exceptions().is_empty());
        assert_eq!(stub.max_active.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hung_call_fails_only_its_own_pair() {
        let adapter = AnalyzerAdapter::new(
            factory_for(
                Arc::new(StubAnalyzer::new(false)),
                Arc::new(AtomicUsize::new(0)),
            ),
            Box::new(ThreadedBatchExecutor::new(4)),
            Duration::from_millis(100),
        );
        let pairs = vec![
            pair("slow", "HANG", "HANG"),
            pair("a", "K", "K"),
            pair("b", "K", "B"),
            pair("c", "B", "K"),
        ];

        let collection = adapter.analyze_all(&pairs, None).unwrap();

        assert_eq!(collection.analyses().len(), 3);
        assert_eq!(collection.exceptions().len(), 1);
        assert_eq!(collection.exceptions()[0].id, "slow");
        assert_eq!(
            collection.exceptions()[0].message,
            "feature diff: analyzer call timed out after 100 ms"
        );
    }

    #[test]
    fn test_queue_timeout_is_reported_separately() {
        let adapter = AnalyzerAdapter::new(
            factory_for(
                Arc::new(StubAnalyzer::new(false)),
                Arc::new(AtomicUsize::new(0)),
            ),
            Box::new(SequentialBatchExecutor::new()),
            Duration::from_millis(100),
        )
        .with_queue_timeout(Duration::from_millis(50));
        let pairs = vec![pair("slow", "HANG", "HANG"), pair("next", "K", "K")];

        let collection = adapter.analyze_all(&pairs, None).unwrap();

        assert_eq!(collection.exceptions().len(), 2);
        assert_eq!(
            collection.exceptions()[0].message,
            "feature diff: analyzer call timed out after 100 ms"
        );
        assert_eq!(collection.exceptions()[1].id, "next");
        assert_eq!(
            collection.exceptions()[1].message,
            "feature diff: gave up waiting for the analyzer after 50 ms"
        );
    }

    #[test]
    fn test_newer_batch_supersedes_running_one() {
        let (started_tx, started_rx) = crossbeam_channel::bounded(1);
        let (release_tx, release_rx) = crossbeam_channel::bounded(1);
        let adapter = Arc::new(adapter_with(
            Arc::new(GateAnalyzer {
                started: started_tx,
                release: release_rx,
            }),
            Box::new(ThreadedBatchExecutor::new(2)),
        ));

        let first = {
            let adapter = Arc::clone(&adapter);
            thread::spawn(move || adapter.analyze_all(&[pair("old", "WAIT", "WAIT")], None))
        };
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let second = adapter.analyze_all(&[pair("new", "K", "K")], None).unwrap();
        release_tx.send(()).unwrap();
        let first = first.join().unwrap();

        assert!(matches!(
            first,
            Err(AnalysisError::Superseded { generation: 1 })
        ));
        assert_eq!(second.analyses()[0].id, "new");
        assert_eq!(adapter.current_generation(), 2);
    }

    #[test]
    fn test_progress_callback_can_cancel() {
        let adapter = stub_adapter();
        let pairs: Vec<_> = (0..5).map(|i| pair(&format!("u{i}"), "K", "K")).collect();
        let progress: ProgressFn = Box::new(|done, _total| done < 2);

        let err = adapter.analyze_all(&pairs, Some(progress)).unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::Cancelled {
                completed: 2,
                total: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_progress_and_timings_are_logged() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let adapter = stub_adapter().with_logger(Box::new(RecordingLogger {
            events: events.clone(),
        }));

        adapter
            .analyze_all(&[pair("a", "K", "K"), pair("b", "ERR", "K")], None)
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events[0], "begin 1/2");
        assert!(events.contains(&"progress 2/2".to_string()));
        assert!(events.contains(&"timing feature_diff".to_string()));
        assert!(events.contains(&"timing phoneme_diff".to_string()));
        assert!(events.contains(&"metric failed_pairs=1".to_string()));
    }

    // --- Deltas ---

    #[test]
    fn test_get_deltas_maps_values() {
        let deltas = stub_adapter().get_deltas("K", "B").unwrap();

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].name, "voice");
        assert_eq!(deltas[0].left, Some(FeatureValue::Minus));
        assert_eq!(deltas[0].right, Some(FeatureValue::Plus));
    }

    #[rstest::rstest]
    #[case::empty_left("", "B")]
    #[case::empty_right("K", "")]
    #[case::blank_left("  ", "B")]
    fn test_get_deltas_empty_side_skips_analyzer(#[case] left: &str, #[case] right: &str) {
        let adapter = stub_adapter();

        assert!(adapter.get_deltas(left, right).unwrap().is_empty());
        assert!(!adapter.is_initialized());
    }

    #[test]
    fn test_get_deltas_error_names_pair() {
        let err = stub_adapter().get_deltas("ERR", "B").unwrap_err();
        assert!(matches!(err, AnalysisError::Deltas { .. }));
        assert!(err.to_string().contains("'ERR' / 'B'"));
    }
}
