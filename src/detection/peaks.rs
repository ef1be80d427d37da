//! Peak finding and trigger-interval deduplication
//!
//! Non-maximum suppression over a 1-D correlation sum: candidates are visited
//! from the largest magnitude down and kept only if no kept peak lies within
//! the exclusion radius. Within any radius-wide window the largest sample
//! therefore always survives, and no two peaks closer than the radius are
//! ever returned.

use super::threshold::{Cutoff, exceeds};
use tracing::debug;

/// A retained correlation peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    pub index: usize,
    pub value: f64,
}

/// Trigger interval in samples
pub fn exclusion_radius(trig_int_seconds: f64, sample_rate: f64) -> usize {
    (trig_int_seconds * sample_rate).round().max(0.0) as usize
}

/// Every defined sample whose magnitude exceeds the cutoff
fn threshold_candidates(series: &[Option<f64>], cutoff: &Cutoff) -> Vec<Peak> {
    series
        .iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let value = (*value)?;
            let limit = cutoff.at(index)?;
            exceeds(value, limit).then_some(Peak { index, value })
        })
        .collect()
}

/// Local maxima of |series| that exceed the cutoff.
///
/// A flat top counts once, at its first sample. Undefined samples break
/// neighbourhoods.
fn local_maxima_candidates(series: &[Option<f64>], cutoff: &Cutoff) -> Vec<Peak> {
    let magnitude = |i: usize| series[i].map(f64::abs);
    let mut peaks = Vec::new();
    let mut i = 0;
    while i < series.len() {
        let Some(current) = magnitude(i) else {
            i += 1;
            continue;
        };

        // Extend across a plateau of equal magnitude
        let mut end = i;
        while end + 1 < series.len() && magnitude(end + 1) == Some(current) {
            end += 1;
        }

        let left_lower = i == 0 || magnitude(i - 1).is_none_or(|left| left < current);
        let right_lower =
            end + 1 >= series.len() || magnitude(end + 1).is_none_or(|right| right < current);

        if left_lower && right_lower {
            if let (Some(value), Some(limit)) = (series[i], cutoff.at(i)) {
                if exceeds(value, limit) {
                    peaks.push(Peak { index: i, value });
                }
            }
        }
        i = end + 1;
    }
    peaks
}

/// Keep the largest candidates, suppressing any closer than `radius` samples
/// to a kept one. Ties go to the earliest sample. Output is ordered by index.
pub fn suppress_non_maxima(mut candidates: Vec<Peak>, radius: usize) -> Vec<Peak> {
    candidates.sort_by(|a, b| {
        b.value
            .abs()
            .total_cmp(&a.value.abs())
            .then_with(|| a.index.cmp(&b.index))
    });

    let mut kept: Vec<Peak> = Vec::new();
    for candidate in candidates {
        let clashes = kept
            .iter()
            .any(|peak| peak.index.abs_diff(candidate.index) < radius);
        if !clashes {
            kept.push(candidate);
        }
    }

    kept.sort_by_key(|peak| peak.index);
    kept
}

/// Find deduplicated detections in a correlation sum.
///
/// `series` holds `None` for samples masked by data gaps; those never become
/// detections. With `full_peaks` only local maxima are considered, so a broad
/// supra-threshold plateau yields its true peak rather than edge samples.
pub fn deduplicate(
    series: &[Option<f64>],
    cutoff: &Cutoff,
    trig_int_seconds: f64,
    sample_rate: f64,
    full_peaks: bool,
) -> Vec<Peak> {
    let candidates = if full_peaks {
        local_maxima_candidates(series, cutoff)
    } else {
        threshold_candidates(series, cutoff)
    };
    let candidate_count = candidates.len();
    let radius = exclusion_radius(trig_int_seconds, sample_rate);
    let peaks = suppress_non_maxima(candidates, radius);

    debug!(
        "Kept {} of {} candidate peaks (exclusion radius {} samples)",
        peaks.len(),
        candidate_count,
        radius
    );
    peaks
}

/// Convenience wrapper for fully defined series and a scalar cutoff
pub fn find_peaks(
    series: &[f64],
    cutoff: f64,
    trig_int_seconds: f64,
    sample_rate: f64,
    full_peaks: bool,
) -> Vec<Peak> {
    let defined: Vec<Option<f64>> = series.iter().copied().map(Some).collect();
    deduplicate(
        &defined,
        &Cutoff::Uniform(cutoff),
        trig_int_seconds,
        sample_rate,
        full_peaks,
    )
}
