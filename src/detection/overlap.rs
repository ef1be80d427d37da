//! Overlap between successive processing windows
//!
//! Channels are shifted by their pick offsets before correlations are summed
//! (delay-and-stack), so a true arrival near a window edge is only fully
//! summed if windows overlap by at least the largest offset in any template
//! searched for in that window.

use crate::error::MatchFilterError;
use crate::template::Template;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Overlap policy
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Overlap {
    /// No overlap; detections near window boundaries may be missed
    None,
    /// Largest channel offset across the group
    #[default]
    Calculate,
    /// Fixed overlap in seconds
    Seconds(f64),
}

impl Overlap {
    /// Overlap in seconds required for a group of templates
    pub fn required_overlap(&self, group: &[&Template]) -> f64 {
        match self {
            Overlap::None => 0.0,
            Overlap::Seconds(seconds) => *seconds,
            Overlap::Calculate => calculate_overlap(group),
        }
    }
}

/// Maximum, across the group, of each template's largest channel offset
pub fn calculate_overlap(group: &[&Template]) -> f64 {
    group
        .iter()
        .map(|template| template.max_offset())
        .fold(0.0, f64::max)
}

impl fmt::Display for Overlap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Overlap::None => f.write_str("none"),
            Overlap::Calculate => f.write_str("calculate"),
            Overlap::Seconds(seconds) => write!(f, "{}", seconds),
        }
    }
}

impl FromStr for Overlap {
    type Err = MatchFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Overlap::None),
            "calculate" => Ok(Overlap::Calculate),
            other => other.parse::<f64>().map(Overlap::Seconds).map_err(|_| {
                MatchFilterError::invalid_parameter(
                    "overlap",
                    format!("'{}' is not none, calculate or a number of seconds", s),
                )
            }),
        }
    }
}

impl Serialize for Overlap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Overlap::None => serializer.serialize_none(),
            Overlap::Calculate => serializer.serialize_str("calculate"),
            Overlap::Seconds(seconds) => serializer.serialize_f64(*seconds),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OverlapRepr {
    Seconds(f64),
    Keyword(String),
}

impl<'de> Deserialize<'de> for Overlap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Option::<OverlapRepr>::deserialize(deserializer)? {
            None => Ok(Overlap::None),
            Some(OverlapRepr::Seconds(seconds)) => Ok(Overlap::Seconds(seconds)),
            Some(OverlapRepr::Keyword(keyword)) => {
                keyword.parse().map_err(serde::de::Error::custom)
            }
        }
    }
}
