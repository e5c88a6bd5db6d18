use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use super::analyzer::RawDelta;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown feature value '{0}'")]
pub struct FeatureValueError(pub String);

/// Value of one phonological feature, including the contour values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FeatureValue {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "+-")]
    PlusMinus,
    #[serde(rename = "0")]
    Zero,
    #[serde(rename = "-+")]
    MinusPlus,
    #[serde(rename = "-")]
    Minus,
}

impl FeatureValue {
    pub fn symbol(self) -> &'static str {
        match self {
            FeatureValue::Plus => "+",
            FeatureValue::PlusMinus => "+-",
            FeatureValue::Zero => "0",
            FeatureValue::MinusPlus => "-+",
            FeatureValue::Minus => "-",
        }
    }

    /// Display form with a typographic minus (en dash).
    pub fn display_symbol(self) -> &'static str {
        match self {
            FeatureValue::Plus => "+",
            FeatureValue::PlusMinus => "+\u{2013}",
            FeatureValue::Zero => "0",
            FeatureValue::MinusPlus => "\u{2013}+",
            FeatureValue::Minus => "\u{2013}",
        }
    }
}

impl FromStr for FeatureValue {
    type Err = FeatureValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "+" => Ok(FeatureValue::Plus),
            "+-" => Ok(FeatureValue::PlusMinus),
            "0" => Ok(FeatureValue::Zero),
            "-+" => Ok(FeatureValue::MinusPlus),
            "-" => Ok(FeatureValue::Minus),
            other => Err(FeatureValueError(other.to_string())),
        }
    }
}

/// Difference in one named feature between the two sides of a substitution.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureDelta {
    pub name: String,
    pub left: Option<FeatureValue>,
    pub right: Option<FeatureValue>,
    pub cost: f64,
}

impl FeatureDelta {
    pub fn from_raw(raw: RawDelta) -> Result<Self, FeatureValueError> {
        Ok(Self {
            name: raw.name,
            left: parse_side(raw.left)?,
            right: parse_side(raw.right)?,
            cost: raw.cost,
        })
    }
}

fn parse_side(side: Option<String>) -> Result<Option<FeatureValue>, FeatureValueError> {
    match side {
        Some(s) if !s.trim().is_empty() => s.parse().map(Some),
        _ => Ok(None),
    }
}

impl fmt::Display for FeatureDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: FeatureValue| format!("{}{}", v.display_symbol(), self.name);
        match (self.left, self.right) {
            (Some(l), Some(r)) => write!(f, "{} \u{2192} {}", side(l), side(r)),
            (Some(l), None) => f.write_str(&side(l)),
            (None, Some(r)) => f.write_str(&side(r)),
            (None, None) => f.write_str(&self.name),
        }
    }
}
