//! Application constants for the matched-filter core
//!
//! This module contains naming rules, default detection parameters and
//! data-quality limits used throughout the crate.

// =============================================================================
// Template Naming and Provenance
// =============================================================================

/// Pattern every template name must satisfy
pub const TEMPLATE_NAME_PATTERN: &str = r"^[-A-Za-z_0-9]+$";

/// Name used in provenance tags for templates built without a name
pub const UNNAMED_TEMPLATE: &str = "unnamed";

/// Prefix of the provenance tag attached to a template's source event
pub const PROVENANCE_PREFIX: &str = "generated from template ";

// =============================================================================
// Detection Defaults
// =============================================================================

/// Default threshold value (multiple of the MAD)
pub const DEFAULT_THRESHOLD: f64 = 8.0;

/// Default minimum separation between detections in seconds
pub const DEFAULT_TRIG_INT: f64 = 6.0;

/// Fraction of samples that must be present per channel in a processing window
pub const MIN_DATA_FRACTION: f64 = 0.8;

/// Smallest positive value representable at half precision.
///
/// Channels whose samples all fall below this magnitude are treated as missing
/// data when templates are constructed.
pub const HALF_PRECISION_MIN_POSITIVE: f64 = 5.960_464_477_539_063e-8;

// =============================================================================
// Logging
// =============================================================================

/// Log target used by the binary's default filter
pub const LOG_TARGET: &str = "matched_filter";
