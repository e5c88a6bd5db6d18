use std::collections::BTreeMap;

use serde::Serialize;

use super::aggregation::aggregate;
use super::analysis::Analysis;
use super::analysis_collection::AnalysisCollection;
use super::error_rate::ErrorRate;

/// How utterances are grouped in a report. Utterance ids are expected to
/// look like `<session>-<prompt>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GroupBy {
    Utterance,
    Session,
    Prompt,
}

impl GroupBy {
    pub const ALL: &'static [GroupBy] = &[GroupBy::Utterance, GroupBy::Session, GroupBy::Prompt];

    pub fn label(self) -> &'static str {
        match self {
            GroupBy::Utterance => "Utterance",
            GroupBy::Session => "Session",
            GroupBy::Prompt => "Prompt",
        }
    }

    pub fn file_suffix(self) -> &'static str {
        match self {
            GroupBy::Utterance => "utterance",
            GroupBy::Session => "session",
            GroupBy::Prompt => "prompt",
        }
    }

    /// Group key for an utterance id. Ids without `-` are their own
    /// session and prompt.
    pub fn key(self, id: &str) -> &str {
        match (self, id.split_once('-')) {
            (GroupBy::Session, Some((session, _))) => session,
            (GroupBy::Prompt, Some((_, prompt))) => prompt,
            _ => id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupRow {
    pub key: String,
    pub fer: ErrorRate,
    pub per: ErrorRate,
    pub per_over_fer: Option<f64>,
    pub normalized_per_over_fer: Option<f64>,
}

/// Length-weighted FER and PER per group, ordered by group key.
pub fn group_report(collection: &AnalysisCollection, by: GroupBy) -> Vec<GroupRow> {
    let mut groups: BTreeMap<&str, Vec<&Analysis>> = BTreeMap::new();
    for analysis in collection.analyses() {
        groups.entry(by.key(&analysis.id)).or_default().push(analysis);
    }

    groups
        .into_iter()
        .map(|(key, items)| {
            let features = aggregate(items.iter().map(|a| &a.features));
            let phonemes = aggregate(items.iter().map(|a| &a.phonemes));
            let ratio = match (features.rate, phonemes.rate) {
                (ErrorRate::Defined(fer), ErrorRate::Defined(per)) if fer != 0.0 => {
                    Some(per / fer)
                }
                _ => None,
            };
            let normalized = ratio.filter(|_| phonemes.length > 0.0).map(|r| r / phonemes.length);
            GroupRow {
                key: key.to_string(),
                fer: features.rate,
                per: phonemes.rate,
                per_over_fer: ratio,
                normalized_per_over_fer: normalized,
            }
        })
        .collect()
}

/// Spread of the defined rates in a report.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct RateStatistics {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation; needs at least two values.
    pub std: Option<f64>,
}

impl RateStatistics {
    /// Returns `None` when no rate is defined.
    pub fn from_rates<I>(rates: I) -> Option<Self>
    where
        I: IntoIterator<Item = ErrorRate>,
    {
        let mut values: Vec<f64> = rates.into_iter().filter_map(ErrorRate::value).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let median = if count % 2 == 1 {
            values[count / 2]
        } else {
            (values[count / 2 - 1] + values[count / 2]) / 2.0
        };
        let std = (count > 1).then(|| {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        });

        Some(Self {
            count,
            mean,
            median,
            std,
        })
    }
}
