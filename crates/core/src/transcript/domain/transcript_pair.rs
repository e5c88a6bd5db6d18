use serde::{Deserialize, Serialize};

/// One utterance: a reference transcript and the transcript compared to it.
///
/// `left` and `right` hold space-separated phoneme tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptPair {
    pub id: String,
    pub left: String,
    pub right: String,
}

impl TranscriptPair {
    pub fn new(id: impl Into<String>, left: impl Into<String>, right: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            left: left.into(),
            right: right.into(),
        }
    }
}

/// A parsed upload: the two column labels and the rows in file order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TranscriptCollection {
    pub filename: String,
    pub labels: [String; 2],
    pub rows: Vec<TranscriptPair>,
}

impl TranscriptCollection {
    pub fn label_left(&self) -> &str {
        &self.labels[0]
    }

    pub fn label_right(&self) -> &str {
        &self.labels[1]
    }
}
