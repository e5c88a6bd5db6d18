use serde::Serialize;

use super::analysis_detail::{counts_label, AnalysisDetail};
use super::error_rate::ErrorRate;

/// Corpus-level totals for one diff kind.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Aggregate {
    pub distance: f64,
    pub length: f64,
    pub rate: ErrorRate,
}

impl Aggregate {
    pub fn empty() -> Self {
        Self {
            distance: 0.0,
            length: 0.0,
            rate: ErrorRate::Undefined,
        }
    }

    pub fn counts_label(&self) -> String {
        counts_label(self.distance, self.length)
    }
}

/// Sums distances and expected lengths, then divides once.
///
/// The result is length-weighted, not a mean of per-utterance rates. An
/// empty input or a zero total length gives an undefined rate.
pub fn aggregate<'a, I>(details: I) -> Aggregate
where
    I: IntoIterator<Item = &'a AnalysisDetail>,
{
    let (distance, length) = details
        .into_iter()
        .fold((0.0, 0.0), |(d, l), detail| {
            (d + detail.distance(), l + detail.expected_length())
        });

    Aggregate {
        distance,
        length,
        rate: ErrorRate::from_counts(distance, length),
    }
}
