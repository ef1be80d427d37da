//! Threshold interpretation for correlation sums
//!
//! Turns a `(threshold_type, threshold)` pair into a cutoff for one
//! template's correlation sum in one processing window. Samples that fall in
//! data gaps are `None` and take no part in any statistic.

use crate::error::MatchFilterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a threshold value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdType {
    /// Multiple of the median absolute correlation sum
    #[serde(rename = "MAD", alias = "mad")]
    Mad,
    /// Raw correlation-sum value
    #[serde(rename = "absolute")]
    Absolute,
    /// Average single-channel correlation, scaled by contributing channels
    #[serde(rename = "av_chan_corr")]
    AvChanCorr,
}

impl fmt::Display for ThresholdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ThresholdType::Mad => "MAD",
            ThresholdType::Absolute => "absolute",
            ThresholdType::AvChanCorr => "av_chan_corr",
        };
        f.write_str(name)
    }
}

impl FromStr for ThresholdType {
    type Err = MatchFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MAD" | "mad" => Ok(ThresholdType::Mad),
            "absolute" => Ok(ThresholdType::Absolute),
            "av_chan_corr" => Ok(ThresholdType::AvChanCorr),
            other => Err(MatchFilterError::invalid_parameter(
                "threshold_type",
                format!("'{}' is not one of MAD, absolute, av_chan_corr", other),
            )),
        }
    }
}

/// Cutoff applied to a correlation sum
#[derive(Debug, Clone, PartialEq)]
pub enum Cutoff {
    /// One value for every sample
    Uniform(f64),
    /// One value per sample; `None` where the sample is undefined
    PerSample(Vec<Option<f64>>),
}

impl Cutoff {
    /// Cutoff at a sample index
    pub fn at(&self, index: usize) -> Option<f64> {
        match self {
            Cutoff::Uniform(value) => Some(*value),
            Cutoff::PerSample(values) => values.get(index).copied().flatten(),
        }
    }

    /// Representative value for reporting (the largest per-sample cutoff)
    pub fn representative(&self) -> f64 {
        match self {
            Cutoff::Uniform(value) => *value,
            Cutoff::PerSample(values) => values
                .iter()
                .flatten()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Median of a slice; mean of the two central values for even lengths
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Median of |x| over the defined samples
pub fn median_absolute(series: &[Option<f64>]) -> Option<f64> {
    let magnitudes: Vec<f64> = series.iter().flatten().map(|value| value.abs()).collect();
    median(&magnitudes)
}

/// Compute the cutoff for one correlation sum.
///
/// `channel_counts[i]` is the number of channels that contributed real data
/// to `series[i]`; it only matters for `AvChanCorr`.
pub fn compute_cutoff(
    threshold_type: ThresholdType,
    threshold: f64,
    series: &[Option<f64>],
    channel_counts: &[usize],
) -> Cutoff {
    match threshold_type {
        ThresholdType::Absolute => Cutoff::Uniform(threshold),
        ThresholdType::Mad => {
            // An all-gap window has no statistic; nothing can exceed infinity
            let mad = median_absolute(series).unwrap_or(f64::INFINITY);
            Cutoff::Uniform(threshold * mad)
        }
        ThresholdType::AvChanCorr => Cutoff::PerSample(
            series
                .iter()
                .enumerate()
                .map(|(i, value)| {
                    let channels = channel_counts.get(i).copied().unwrap_or(0);
                    match value {
                        Some(_) if channels > 0 => Some(threshold * channels as f64),
                        _ => None,
                    }
                })
                .collect(),
        ),
    }
}

/// Whether a value passes a cutoff (compared on magnitude)
pub fn exceeds(value: f64, cutoff: f64) -> bool {
    value.abs() > cutoff
}

/// Indices of defined samples whose magnitude exceeds the cutoff
pub fn flagged_indices(series: &[Option<f64>], cutoff: &Cutoff) -> Vec<usize> {
    series
        .iter()
        .enumerate()
        .filter_map(|(i, value)| match (value, cutoff.at(i)) {
            (Some(value), Some(limit)) if exceeds(*value, limit) => Some(i),
            _ => None,
        })
        .collect()
}
