//! Matched-filter detection
//!
//! This module defines the detection contract applied when templates are
//! correlated against continuous data, and an engine that drives a
//! correlation backend under that contract.
//!
//! # Architecture
//!
//! - [`threshold`] - threshold types and cutoff computation
//! - [`overlap`] - overlap between successive processing windows
//! - [`peaks`] - trigger-interval deduplication of correlation peaks
//! - [`gaps`] - zero-filling and re-masking around data gaps
//! - [`correlate`] - the correlation backend seam and a reference kernel
//! - [`engine`] - grouping, windowing, worker pool and result aggregation
//!
//! # Processing Pipeline
//!
//! 1. **Grouping**: templates are partitioned by processing parameters
//! 2. **Windowing**: continuous data are cut into overlapping windows per group
//! 3. **Correlation**: per-channel jobs run on the worker pool
//! 4. **Stacking**: channel correlations are summed in fixed channel order,
//!    each shifted by its offset within the template
//! 5. **Detection**: thresholding and peak deduplication per template and window

pub mod correlate;
pub mod engine;
pub mod gaps;
pub mod overlap;
pub mod peaks;
pub mod threshold;

#[cfg(test)]
pub mod tests;

pub use correlate::{CorrelationBackend, NormalizedCorrelator};
pub use engine::MatchFilter;
pub use overlap::{Overlap, calculate_overlap};
pub use peaks::{Peak, deduplicate, find_peaks};
pub use threshold::{Cutoff, ThresholdType, compute_cutoff, flagged_indices};

use crate::models::{TraceId, seconds_between};
use crate::template::Template;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One detection of a template in continuous data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub template_name: String,
    /// Time of the template's earliest channel at the peak
    pub detect_time: DateTime<Utc>,
    /// Index of the peak within its window's correlation sum
    pub sample_index: usize,
    /// Correlation sum at the peak
    pub detect_val: f64,
    /// Cutoff the correlation sum was compared against
    pub threshold: f64,
    pub threshold_type: ThresholdType,
    /// Threshold value as configured
    pub threshold_input: f64,
    /// Number of channels contributing at the peak
    pub no_chans: usize,
    pub chans: Vec<TraceId>,
}

/// Detections of a single template
#[derive(Debug, Clone)]
pub struct Family {
    pub template: Template,
    pub detections: Vec<Detection>,
}

impl Family {
    pub fn new(template: Template) -> Self {
        Self {
            template,
            detections: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    /// Remove detections closer than `trig_int` seconds to a larger one.
    ///
    /// Overlapping windows can report the same peak twice; this collapses
    /// them and restores time order.
    pub fn decluster(&mut self, trig_int: f64) {
        let mut candidates = std::mem::take(&mut self.detections);
        candidates.sort_by(|a, b| {
            b.detect_val
                .abs()
                .total_cmp(&a.detect_val.abs())
                .then_with(|| a.detect_time.cmp(&b.detect_time))
        });

        let mut kept: Vec<Detection> = Vec::new();
        for candidate in candidates {
            let clashes = kept.iter().any(|detection| {
                detection.detect_time == candidate.detect_time
                    || seconds_between(detection.detect_time, candidate.detect_time).abs()
                        < trig_int
            });
            if !clashes {
                kept.push(candidate);
            }
        }

        kept.sort_by_key(|detection| detection.detect_time);
        self.detections = kept;
    }
}

/// Families for every template searched, in input order
#[derive(Debug, Clone, Default)]
pub struct Party {
    pub families: Vec<Family>,
}

impl Party {
    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Total detections across all families
    pub fn detection_count(&self) -> usize {
        self.families.iter().map(Family::len).sum()
    }

    /// Family for a template name
    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families
            .iter()
            .find(|family| family.template.name.as_deref() == Some(name))
    }
}
