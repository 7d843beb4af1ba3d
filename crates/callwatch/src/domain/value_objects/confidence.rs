//! Confidence - Provider-supplied certainty for an extracted answer

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const UNSCORED: &str = "unscored";

/// Confidence attached to an extracted answer
///
/// Serialized as a number in `[0, 1]`, or the string `"unscored"` when the
/// provider did not score the answer. A number is never invented.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Confidence {
    Scored(f64),
    #[default]
    Unscored,
}

impl Confidence {
    /// Build from an optional provider score, clamping into `[0, 1]`.
    ///
    /// Non-finite scores count as unscored.
    pub fn from_score(score: Option<f64>) -> Self {
        match score {
            Some(value) if value.is_finite() => Confidence::Scored(value.clamp(0.0, 1.0)),
            _ => Confidence::Unscored,
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Confidence::Scored(value) => Some(*value),
            Confidence::Unscored => None,
        }
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Confidence::Scored(value) => serializer.serialize_f64(*value),
            Confidence::Unscored => serializer.serialize_str(UNSCORED),
        }
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(value) => Ok(Confidence::from_score(Some(value))),
            Raw::Text(text) if text == UNSCORED => Ok(Confidence::Unscored),
            Raw::Text(text) => text
                .parse::<f64>()
                .map(|v| Confidence::from_score(Some(v)))
                .map_err(|_| serde::de::Error::custom(format!("invalid confidence: {}", text))),
        }
    }
}
