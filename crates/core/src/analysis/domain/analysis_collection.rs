use serde::Serialize;

use super::aggregation::{aggregate, Aggregate};
use super::analysis::{Analysis, AnalysisException, PairOutcome};
use super::error_rate::ErrorRate;

/// Analyses of one upload, the pairs that failed, and corpus-level rates.
///
/// Built once from per-pair outcomes and read-only afterwards. Aggregates
/// cover the successful analyses only.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisCollection {
    analyses: Vec<Analysis>,
    exceptions: Vec<AnalysisException>,
    aggregate_features: Aggregate,
    aggregate_phonemes: Aggregate,
}

impl AnalysisCollection {
    pub fn empty() -> Self {
        Self::from_outcomes(Vec::new())
    }

    /// Splits outcomes into analyses and exceptions, keeping input order
    /// within each, and computes the aggregates.
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = PairOutcome>,
    {
        let mut analyses = Vec::new();
        let mut exceptions = Vec::new();
        for outcome in outcomes {
            match outcome {
                PairOutcome::Success(a) => analyses.push(a),
                PairOutcome::Failure(e) => exceptions.push(e),
            }
        }

        let aggregate_features = aggregate(analyses.iter().map(|a| &a.features));
        let aggregate_phonemes = aggregate(analyses.iter().map(|a| &a.phonemes));

        Self {
            analyses,
            exceptions,
            aggregate_features,
            aggregate_phonemes,
        }
    }

    pub fn analyses(&self) -> &[Analysis] {
        &self.analyses
    }

    pub fn exceptions(&self) -> &[AnalysisException] {
        &self.exceptions
    }

    pub fn aggregate_features(&self) -> &Aggregate {
        &self.aggregate_features
    }

    pub fn aggregate_phonemes(&self) -> &Aggregate {
        &self.aggregate_phonemes
    }

    pub fn fer(&self) -> ErrorRate {
        self.aggregate_features.rate
    }

    pub fn per(&self) -> ErrorRate {
        self.aggregate_phonemes.rate
    }

    pub fn get(&self, id: &str) -> Option<&Analysis> {
        self.analyses.iter().find(|a| a.id == id)
    }

    /// Number of pairs, successful or not.
    pub fn total(&self) -> usize {
        self.analyses.len() + self.exceptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl Default for AnalysisCollection {
    fn default() -> Self {
        Self::empty()
    }
}
