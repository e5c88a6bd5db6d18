use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub type AnalyzerError = Box<dyn std::error::Error + Send + Sync>;
pub type AnalyzerResult<T> = Result<T, AnalyzerError>;

/// Builds the analyzer on first use. Called at most once per adapter.
pub type AnalyzerFactory = Box<dyn Fn() -> AnalyzerResult<Arc<dyn Analyzer>> + Send + Sync>;

/// Diff result as returned by the analyzer, before normalization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDiff {
    pub cost: f64,
    pub length: f64,
    #[serde(default)]
    pub error_rate: Option<f64>,
    #[serde(default)]
    pub steps: Vec<RawStep>,
}

/// Alignment step as returned by the analyzer. An absent side may arrive
/// either as a missing field or as an empty string.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawStep {
    pub action: String,
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub right: Option<String>,
    pub cost: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDeltas {
    #[serde(default)]
    pub deltas: Vec<RawDelta>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDelta {
    pub name: String,
    #[serde(default)]
    pub left: Option<String>,
    #[serde(default)]
    pub right: Option<String>,
    pub cost: f64,
}

/// Domain interface for the external phonological distance analyzer.
///
/// The analyzer is opaque: it owns tokenization, the feature system and the
/// edit-distance computation. Inputs are space-separated phoneme strings.
pub trait Analyzer: Send + Sync {
    fn feature_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff>;

    fn phoneme_diff(&self, left: &str, right: &str) -> AnalyzerResult<RawDiff>;

    /// Feature-by-feature deltas between two single phonemes.
    fn feature_deltas(&self, left: &str, right: &str) -> AnalyzerResult<RawDeltas>;

    /// Whether one instance may be called from several threads at once.
    /// When false, callers serialize every call.
    fn is_reentrant(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_diff_decodes_camel_case() {
        let json = r#"{
            "cost": 1.0, "length": 3.0, "errorRate": 0.3333,
            "steps": [
                {"action": "SUB", "left": "K", "right": "B", "cost": 1.0},
                {"action": "EQ", "left": "AE", "right": "AE", "cost": 0.0}
            ]
        }"#;

        let diff: RawDiff = serde_json::from_str(json).unwrap();

        assert_eq!(diff.error_rate, Some(0.3333));
        assert_eq!(diff.steps.len(), 2);
        assert_eq!(diff.steps[0].left.as_deref(), Some("K"));
    }

    #[test]
    fn test_raw_step_missing_side_defaults_to_none() {
        let step: RawStep = serde_json::from_str(r#"{"action": "INS", "right": "S", "cost": 1}"#)
            .unwrap();
        assert_eq!(step.left, None);
    }

    #[test]
    fn test_raw_diff_null_error_rate() {
        let diff: RawDiff =
            serde_json::from_str(r#"{"cost": 0, "length": 0, "errorRate": null}"#).unwrap();
        assert_eq!(diff.error_rate, None);
        assert!(diff.steps.is_empty());
    }

    #[test]
    fn test_raw_deltas_decode() {
        let json = r#"{"deltas": [{"name": "voice", "left": "-", "right": "+", "cost": 0.25}]}"#;
        let deltas: RawDeltas = serde_json::from_str(json).unwrap();
        assert_eq!(deltas.deltas[0].name, "voice");
    }
}
