//! Gap handling around cross-correlation
//!
//! Gaps are zero-filled so the correlation kernel sees a defined signal, then
//! every correlation output whose data window touched a gap is masked again.
//! Masked outputs never register as detections and never count towards MAD
//! or contributing-channel statistics.

use crate::models::Trace;

/// Data with masked samples replaced by zero
pub fn zero_fill(trace: &Trace) -> Vec<f64> {
    match &trace.mask {
        Some(mask) => trace
            .data
            .iter()
            .zip(mask)
            .map(|(&value, &gap)| if gap { 0.0 } else { value })
            .collect(),
        None => trace.data.clone(),
    }
}

/// For each correlation lag, whether its `template_len`-sample data window is gap free
pub fn valid_windows(mask: Option<&[bool]>, data_len: usize, template_len: usize) -> Vec<bool> {
    if template_len == 0 || template_len > data_len {
        return Vec::new();
    }
    let lags = data_len - template_len + 1;
    let Some(mask) = mask else {
        return vec![true; lags];
    };

    // Prefix count of masked samples
    let mut prefix = Vec::with_capacity(data_len + 1);
    prefix.push(0usize);
    for &gap in mask.iter().take(data_len) {
        let last = prefix.last().copied().unwrap_or(0);
        prefix.push(last + usize::from(gap));
    }

    (0..lags)
        .map(|lag| prefix[lag + template_len] - prefix[lag] == 0)
        .collect()
}

/// Re-mask correlation outputs computed over gap-filled data
pub fn mask_correlation(correlation: Vec<f64>, valid: &[bool]) -> Vec<Option<f64>> {
    correlation
        .into_iter()
        .zip(valid)
        .map(|(value, &ok)| ok.then_some(value))
        .collect()
}
