//! Matched-Filter Template Library
//!
//! A Rust library for matched-filter detection of seismic templates in
//! continuous waveform data.
//!
//! This library provides tools for:
//! - Building validated templates with their processing parameters and source event
//! - Comparing templates field by field and grouping them by processing parameters
//! - Reading and writing template archives
//! - Interpreting MAD, absolute and average-channel-correlation thresholds
//! - Delay-and-stack correlation sums with gap masking
//! - Trigger-interval deduplication of correlation peaks
//! - Parallel correlation on a bounded worker pool with cancellation

pub mod config;
pub mod constants;
pub mod detection;
pub mod error;
pub mod event;
pub mod models;
pub mod template;
pub mod tribe;

// CLI modules
pub mod cli {
    pub mod args;
    pub mod commands;
}

// Re-export commonly used types
pub use config::{Concurrency, DetectConfig};
pub use detection::{
    CorrelationBackend, Detection, Family, MatchFilter, NormalizedCorrelator, Overlap, Party,
    ThresholdType,
};
pub use error::{MatchFilterError, Result};
pub use event::Event;
pub use models::{Stream, Trace, TraceId};
pub use template::{Template, TemplateBuilder};
pub use tribe::Tribe;
