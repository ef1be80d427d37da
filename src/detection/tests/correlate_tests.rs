use crate::detection::correlate::*;
use crate::detection::tests::white_noise;
use crate::template::tests::synthetic_data;

#[test]
fn test_output_length() {
    let template = vec![1.0, 2.0, 3.0];
    assert_eq!(NormalizedCorrelator.correlate(&template, &[0.0; 10]).len(), 8);
    assert!(NormalizedCorrelator.correlate(&template, &[0.0; 2]).is_empty());
    assert!(NormalizedCorrelator.correlate(&[], &[0.0; 2]).is_empty());
}

#[test]
fn test_exact_copy_correlates_to_one() {
    let template = synthetic_data(50, 0.0);
    let mut data = white_noise(500, 7, 0.5);
    data[200..250].copy_from_slice(&template);

    let cc = NormalizedCorrelator.correlate(&template, &data);
    assert!((cc[200] - 1.0).abs() < 1e-9);

    let best = cc
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(index, _)| index);
    assert_eq!(best, Some(200));
}

#[test]
fn test_scaled_and_inverted_copies() {
    let template = synthetic_data(40, 1.0);
    let data: Vec<f64> = template.iter().map(|value| -3.0 * value + 10.0).collect();

    let cc = NormalizedCorrelator.correlate(&template, &data);
    assert_eq!(cc.len(), 1);
    assert!((cc[0] + 1.0).abs() < 1e-9);
}

#[test]
fn test_flat_data_correlates_to_zero() {
    let template = synthetic_data(20, 0.0);
    let cc = NormalizedCorrelator.correlate(&template, &[0.0; 100]);
    assert!(cc.iter().all(|&value| value == 0.0));

    let cc = NormalizedCorrelator.correlate(&template, &[5.0; 100]);
    assert!(cc.iter().all(|&value| value == 0.0));
}

#[test]
fn test_values_stay_in_range_on_long_series() {
    let template = synthetic_data(64, 0.5);
    let data = white_noise(20_000, 11, 1.0);

    let cc = NormalizedCorrelator.correlate(&template, &data);
    assert_eq!(cc.len(), 20_000 - 64 + 1);
    assert!(cc.iter().all(|value| (-1.0..=1.0).contains(value)));
}

#[test]
fn test_small_amplitude_data_is_not_flattened() {
    let template = synthetic_data(30, 0.0);
    let data: Vec<f64> = template.iter().map(|value| value * 1e-9).collect();

    let cc = NormalizedCorrelator.correlate(&template, &data);
    assert!((cc[0] - 1.0).abs() < 1e-6);
}
