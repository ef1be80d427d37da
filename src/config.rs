//! Configuration management and validation.
//!
//! Provides the detection configuration (threshold semantics, trigger
//! interval, overlap policy, worker pool) and system profiling used to size
//! the worker pool.

use crate::constants::{DEFAULT_THRESHOLD, DEFAULT_TRIG_INT};
use crate::detection::{Overlap, ThresholdType};
use crate::error::{MatchFilterError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

/// System profiling information for sizing the worker pool
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// Number of CPU cores available
    pub cpu_cores: usize,
}

impl SystemProfile {
    /// Auto-detect system capabilities
    pub fn detect() -> Self {
        Self {
            cpu_cores: num_cpus::get(),
        }
    }
}

/// How correlation jobs are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Concurrency {
    /// Run every job on the calling task
    Sequential,
    /// Run jobs on the blocking thread pool
    Multithread,
}

/// Detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// Threshold value, interpreted according to `threshold_type`
    pub threshold: f64,

    /// How the threshold is turned into a cutoff
    pub threshold_type: ThresholdType,

    /// Minimum separation between detections of one template (seconds)
    pub trig_int: f64,

    /// Overlap between successive processing windows
    pub overlap: Overlap,

    /// Consider every local maximum rather than every supra-threshold sample
    pub full_peaks: bool,

    /// Skip the check that each channel has enough data in a window
    pub ignore_length: bool,

    /// Number of workers (0 = auto-detect)
    pub workers: usize,

    /// Execution model for correlation jobs
    pub concurrency: Concurrency,

    /// Plot requested by the caller; plotting itself happens outside this crate
    pub plot: bool,

    /// Deprecated alias for `workers`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<usize>,

    /// Deprecated alias for `plot`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plotvar: Option<bool>,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            threshold_type: ThresholdType::Mad,
            trig_int: DEFAULT_TRIG_INT,
            overlap: Overlap::Calculate,
            full_peaks: false,
            ignore_length: false,
            workers: 0,
            concurrency: Concurrency::Multithread,
            plot: false,
            cores: None,
            plotvar: None,
        }
    }
}

impl DetectConfig {
    /// Create configuration with a threshold
    pub fn with_threshold(mut self, threshold: f64, threshold_type: ThresholdType) -> Self {
        self.threshold = threshold;
        self.threshold_type = threshold_type;
        self
    }

    /// Create configuration with a trigger interval
    pub fn with_trig_int(mut self, trig_int: f64) -> Self {
        self.trig_int = trig_int;
        self
    }

    /// Create configuration with an overlap policy
    pub fn with_overlap(mut self, overlap: Overlap) -> Self {
        self.overlap = overlap;
        self
    }

    /// Enable full peak search
    pub fn with_full_peaks(mut self) -> Self {
        self.full_peaks = true;
        self
    }

    /// Disable the data length check
    pub fn with_ignore_length(mut self) -> Self {
        self.ignore_length = true;
        self
    }

    /// Create configuration with custom worker count
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the execution model
    pub fn with_concurrency(mut self, concurrency: Concurrency) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: DetectConfig = serde_json::from_reader(reader)?;
        debug!("Loaded detection configuration from {}", path.display());
        Ok(config)
    }

    /// Fold deprecated parameters into their replacements.
    ///
    /// The old value is honoured and a warning emitted; this never fails.
    pub fn resolve_deprecated(mut self) -> Self {
        if let Some(cores) = self.cores.take() {
            warn!("cores is deprecated, use workers instead");
            self.workers = cores;
        }
        if let Some(plotvar) = self.plotvar.take() {
            warn!("plotvar is deprecated, use plot instead");
            self.plot = plotvar;
        }
        self
    }

    /// Validate parameter ranges
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(MatchFilterError::invalid_parameter(
                "threshold",
                "must be a finite number",
            ));
        }
        if !self.trig_int.is_finite() || self.trig_int < 0.0 {
            return Err(MatchFilterError::invalid_parameter(
                "trig_int",
                "must be a non-negative number of seconds",
            ));
        }
        if let Overlap::Seconds(seconds) = self.overlap {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(MatchFilterError::invalid_parameter(
                    "overlap",
                    "must be a non-negative number of seconds",
                ));
            }
        }
        Ok(())
    }

    /// Number of workers for a job set with `independent_units` units.
    ///
    /// Auto-detection uses whichever is smaller: available cores or the
    /// number of independent units.
    pub fn resolve_workers(&self, independent_units: usize) -> usize {
        let workers = if self.workers > 0 {
            self.workers
        } else {
            SystemProfile::detect().cpu_cores.min(independent_units)
        };
        workers.max(1)
    }
}
