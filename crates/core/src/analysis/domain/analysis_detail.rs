use serde::Serialize;

use super::analyzer::RawDiff;
use super::diff_step::{DiffStep, StepError};
use super::error_rate::ErrorRate;

/// Relative tolerance when checking an analyzer-reported rate against the
/// recomputed one.
const RATE_TOLERANCE: f64 = 1e-9;

/// Distance, expected length and alignment for one diff kind of one pair.
///
/// `error_rate` is always `distance / expected_length`, or undefined when
/// the expected length is zero.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDetail {
    distance: f64,
    expected_length: f64,
    steps: Vec<DiffStep>,
    error_rate: ErrorRate,
}

impl AnalysisDetail {
    pub fn new(distance: f64, expected_length: f64, steps: Vec<DiffStep>) -> Self {
        Self {
            distance,
            expected_length,
            steps,
            error_rate: ErrorRate::from_counts(distance, expected_length),
        }
    }

    pub fn from_raw(raw: RawDiff) -> Result<Self, StepError> {
        let valid = |v: f64| v.is_finite() && v >= 0.0;
        if !valid(raw.cost) || !valid(raw.length) {
            return Err(StepError::InvalidTotals {
                cost: raw.cost,
                length: raw.length,
            });
        }

        let steps = raw
            .steps
            .into_iter()
            .map(DiffStep::from_raw)
            .collect::<Result<Vec<_>, _>>()?;
        let detail = Self::new(raw.cost, raw.length, steps);

        if let (Some(reported), ErrorRate::Defined(computed)) = (raw.error_rate, detail.error_rate)
        {
            if (reported - computed).abs() > RATE_TOLERANCE * computed.abs().max(1.0) {
                log::warn!(
                    "Analyzer reported error rate {reported} but {}/{} = {computed}; using the latter",
                    detail.distance,
                    detail.expected_length
                );
            }
        }

        Ok(detail)
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn expected_length(&self) -> f64 {
        self.expected_length
    }

    pub fn steps(&self) -> &[DiffStep] {
        &self.steps
    }

    pub fn error_rate(&self) -> ErrorRate {
        self.error_rate
    }

    /// `distance / length` as shown in the error count columns.
    pub fn counts_label(&self) -> String {
        counts_label(self.distance, self.expected_length)
    }
}

/// Formats a distance and length as `"1 / 3"`, trimming trailing zeros.
pub fn counts_label(distance: f64, length: f64) -> String {
    format!("{} / {}", trim_number(distance), trim_number(length))
}

fn trim_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        let text = format!("{value:.3}");
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
