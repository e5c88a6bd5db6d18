use serde::Serialize;

use super::analysis_detail::AnalysisDetail;
use super::error_rate::ErrorRate;
use crate::transcript::domain::transcript_pair::TranscriptPair;

/// Successful analysis of one transcript pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Analysis {
    pub id: String,
    pub pair: TranscriptPair,
    pub features: AnalysisDetail,
    pub phonemes: AnalysisDetail,
    pub fer: ErrorRate,
    pub per: ErrorRate,
}

impl Analysis {
    pub fn new(pair: TranscriptPair, features: AnalysisDetail, phonemes: AnalysisDetail) -> Self {
        Self {
            id: pair.id.clone(),
            fer: features.error_rate(),
            per: phonemes.error_rate(),
            pair,
            features,
            phonemes,
        }
    }
}

/// A pair whose analyzer call failed. Carries no analysis detail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnalysisException {
    pub id: String,
    pub message: String,
}

impl AnalysisException {
    pub fn new(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
        }
    }
}

/// Result of analyzing a single pair.
#[derive(Clone, Debug, PartialEq)]
pub enum PairOutcome {
    Success(Analysis),
    Failure(AnalysisException),
}

impl PairOutcome {
    pub fn id(&self) -> &str {
        match self {
            PairOutcome::Success(a) => &a.id,
            PairOutcome::Failure(e) => &e.id,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PairOutcome::Success(_))
    }
}
