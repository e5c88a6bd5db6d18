use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::shared::constants::NOT_APPLICABLE;

/// A distance-over-length rate that is explicitly undefined when the length
/// is zero, so it never shows up as `NaN%`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ErrorRate {
    Defined(f64),
    Undefined,
}

impl ErrorRate {
    pub fn from_counts(distance: f64, length: f64) -> Self {
        if length > 0.0 && distance.is_finite() && length.is_finite() {
            ErrorRate::Defined(distance / length)
        } else {
            ErrorRate::Undefined
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            ErrorRate::Defined(v) => Some(v),
            ErrorRate::Undefined => None,
        }
    }

    pub fn is_defined(self) -> bool {
        matches!(self, ErrorRate::Defined(_))
    }

    /// `12.3%` style with one decimal, or an em dash when undefined.
    pub fn as_percent(self) -> String {
        match self {
            ErrorRate::Defined(v) => format!("{:.1}%", v * 100.0),
            ErrorRate::Undefined => NOT_APPLICABLE.to_string(),
        }
    }
}

impl fmt::Display for ErrorRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_percent())
    }
}

impl Serialize for ErrorRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ErrorRate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<f64>::deserialize(deserializer)? {
            Some(v) => ErrorRate::Defined(v),
            None => ErrorRate::Undefined,
        })
    }
}
