//! Cross-correlation backends
//!
//! The numeric kernel is an external seam: anything implementing
//! [`CorrelationBackend`] can be plugged into the engine. A straightforward
//! time-domain normalised correlator is provided as the reference backend.

/// Lags between exact recomputations of the running window sums
const RESUM_INTERVAL: usize = 4096;

/// Normalised cross-correlation of a template against continuous data.
///
/// Output has `data.len() - template.len() + 1` values (none when the data
/// are shorter than the template). Value `k` correlates the template with
/// `data[k..k + template.len()]` and lies in `[-1, 1]`.
pub trait CorrelationBackend: Send + Sync {
    fn correlate(&self, template: &[f64], data: &[f64]) -> Vec<f64>;
}

/// Time-domain normalised cross-correlation.
///
/// Windows with zero variance (flat or zero-filled data) correlate to zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedCorrelator;

impl CorrelationBackend for NormalizedCorrelator {
    fn correlate(&self, template: &[f64], data: &[f64]) -> Vec<f64> {
        let m = template.len();
        if m == 0 || data.len() < m {
            return Vec::new();
        }

        let t_mean = template.iter().sum::<f64>() / m as f64;
        let centred: Vec<f64> = template.iter().map(|value| value - t_mean).collect();
        let t_norm = centred.iter().map(|value| value * value).sum::<f64>().sqrt();
        let lags = data.len() - m + 1;
        if t_norm == 0.0 {
            return vec![0.0; lags];
        }

        // Running window sums for the data mean and energy
        let mut sum: f64 = data[..m].iter().sum();
        let mut sum_sq: f64 = data[..m].iter().map(|value| value * value).sum();

        let mut out = Vec::with_capacity(lags);
        for k in 0..lags {
            if k > 0 && k % RESUM_INTERVAL == 0 {
                let window = &data[k..k + m];
                sum = window.iter().sum();
                sum_sq = window.iter().map(|value| value * value).sum();
            } else if k > 0 {
                let leaving = data[k - 1];
                let entering = data[k + m - 1];
                sum += entering - leaving;
                sum_sq += entering * entering - leaving * leaving;
            }

            let variance = sum_sq - sum * sum / m as f64;
            // Relative guard against drift in the running sums
            if variance <= 1e-12 * sum_sq {
                out.push(0.0);
                continue;
            }

            let numerator: f64 = centred
                .iter()
                .zip(&data[k..k + m])
                .map(|(t, d)| t * d)
                .sum();
            let value = numerator / (t_norm * variance.sqrt());
            out.push(value.clamp(-1.0, 1.0));
        }
        out
    }
}
