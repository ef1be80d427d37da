//! Template records for matched-filter detection
//!
//! A [`Template`] holds a short multichannel reference waveform together with
//! the processing parameters that produced it and, optionally, the source
//! event it was cut from.
//!
//! # Architecture
//!
//! - [`equality`] - explicit field-list comparators (`equals`, `same_processing`)
//! - [`grouping`] - partitioning of template collections by processing parameters
//! - [`construct`] - construction through an external template generator
//!
//! Templates are only ever built through [`TemplateBuilder`] (or loaded from an
//! archive and re-validated), so a failed construction leaves nothing usable
//! behind. Grouping and detection never mutate a template; `clone()` gives a
//! fully independent deep copy.
//!
//! # Example Usage
//!
//! ```rust
//! use matched_filter::template::Template;
//!
//! # fn example() -> matched_filter::Result<()> {
//! let template = Template::builder()
//!     .name("kaik_eq")
//!     .lowcut(2.0)
//!     .highcut(8.0)
//!     .samp_rate(100.0)
//!     .filt_order(4)
//!     .process_length(3600.0)
//!     .prepick(0.5)
//!     .build()?;
//!
//! assert!(template.same_processing(&template.clone()));
//! # Ok(())
//! # }
//! ```

pub mod construct;
pub mod equality;
pub mod grouping;

#[cfg(test)]
pub mod tests;

pub use construct::{ConstructParams, ConstructionMethod, GeneratedTemplate, TemplateGenerator};
pub use equality::{EqualityOptions, events_similar, same_processing, templates_equal};
pub use grouping::{group_indices, group_templates};

use crate::config::DetectConfig;
use crate::constants::{TEMPLATE_NAME_PATTERN, UNNAMED_TEMPLATE};
use crate::detection::{Family, MatchFilter, NormalizedCorrelator};
use crate::error::{MatchFilterError, Result};
use crate::event::Event;
use crate::models::{Stream, Trace, TraceId, seconds_between};
use crate::tribe::Tribe;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(TEMPLATE_NAME_PATTERN).expect("template name pattern is a valid regex")
});

/// Check a template name against the identifier pattern
pub fn validate_name(name: &str) -> Result<()> {
    if NAME_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(MatchFilterError::InvalidName {
            name: name.to_string(),
            pattern: TEMPLATE_NAME_PATTERN.to_string(),
        })
    }
}

/// Waveform held by a template: normally a stream, occasionally a bare trace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Waveform {
    Stream(Stream),
    Single(Trace),
}

impl Waveform {
    /// All traces regardless of representation
    pub fn traces(&self) -> Vec<&Trace> {
        match self {
            Waveform::Stream(stream) => stream.iter().collect(),
            Waveform::Single(trace) => vec![trace],
        }
    }

    pub fn channel_count(&self) -> usize {
        match self {
            Waveform::Stream(stream) => stream.len(),
            Waveform::Single(_) => 1,
        }
    }
}

impl From<Stream> for Waveform {
    fn from(stream: Stream) -> Self {
        Waveform::Stream(stream)
    }
}

/// One matched-filter template
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Template {
    pub name: Option<String>,
    pub st: Option<Waveform>,
    /// Low-cut filter corner (Hz); `None` when no high-pass was applied
    pub lowcut: Option<f64>,
    /// High-cut filter corner (Hz); `None` when no low-pass was applied
    pub highcut: Option<f64>,
    pub samp_rate: Option<f64>,
    /// Number of filter corners
    pub filt_order: Option<u32>,
    /// Seconds of data processed before the template was cut
    pub process_length: Option<f64>,
    /// Seconds before the pick at which the waveform starts
    pub prepick: Option<f64>,
    pub event: Option<Event>,
}

impl Template {
    pub fn builder() -> TemplateBuilder {
        TemplateBuilder::default()
    }

    /// Name, or the placeholder used for unnamed templates
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNNAMED_TEMPLATE)
    }

    pub fn channel_count(&self) -> usize {
        self.st.as_ref().map_or(0, Waveform::channel_count)
    }

    /// Check the construction invariants on an existing record
    pub fn validate(&self) -> Result<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        let parameters = [
            ("lowcut", self.lowcut),
            ("highcut", self.highcut),
            ("samp_rate", self.samp_rate),
            ("process_length", self.process_length),
            ("prepick", self.prepick),
        ];
        for (parameter, value) in parameters {
            if let Some(value) = value.filter(|value| !value.is_finite()) {
                return Err(MatchFilterError::invalid_parameter(
                    parameter,
                    format!("must be finite, got {}", value),
                ));
            }
        }
        if let (Some(waveform), Some(samp_rate)) = (&self.st, self.samp_rate) {
            for trace in waveform.traces() {
                if trace.stats.sampling_rate != samp_rate {
                    return Err(MatchFilterError::SamplingRateMismatch {
                        channel: trace.id().to_string(),
                        expected: samp_rate,
                        found: trace.stats.sampling_rate,
                    });
                }
            }
        }
        Ok(())
    }

    /// Start offset of every channel relative to the earliest channel, in seconds.
    ///
    /// These are the delay-and-stack lags applied when correlation traces
    /// are summed.
    pub fn channel_offsets(&self) -> Vec<(TraceId, f64)> {
        let Some(waveform) = &self.st else {
            return Vec::new();
        };
        let traces = waveform.traces();
        let Some(earliest) = traces.iter().map(|trace| trace.stats.starttime).min() else {
            return Vec::new();
        };
        traces
            .iter()
            .map(|trace| {
                (
                    trace.id().clone(),
                    seconds_between(earliest, trace.stats.starttime),
                )
            })
            .collect()
    }

    /// Largest channel start offset within this template
    pub fn max_offset(&self) -> f64 {
        self.channel_offsets()
            .into_iter()
            .map(|(_, offset)| offset)
            .fold(0.0, f64::max)
    }

    /// Full equality with explicit options
    pub fn equals_with(&self, other: &Template, options: EqualityOptions) -> bool {
        templates_equal(self, other, options)
    }

    /// Whether two templates were processed identically
    pub fn same_processing(&self, other: &Template) -> bool {
        same_processing(self, other)
    }

    /// Write this template to an archive, appending to an existing one
    pub fn write(&self, path: &Path) -> Result<&Self> {
        let mut tribe = if path.exists() {
            Tribe::read(path)?
        } else {
            Tribe::default()
        };
        tribe.push(self.clone());
        tribe.write(path)?;
        Ok(self)
    }

    /// Load a single template from an archive
    pub fn read(path: &Path) -> Result<Template> {
        let tribe = Tribe::read(path)?;
        if tribe.len() > 1 {
            return Err(MatchFilterError::ArchiveCardinality {
                path: path.to_path_buf(),
                count: tribe.len(),
            });
        }
        tribe.into_iter().next().ok_or_else(|| {
            MatchFilterError::invalid_parameter("path", format!("{} holds no templates", path.display()))
        })
    }

    /// Detect with this template alone in a continuous stream
    pub async fn detect(&self, stream: &Stream, config: &DetectConfig) -> Result<Family> {
        let engine = MatchFilter::new(config.clone(), Arc::new(NormalizedCorrelator));
        let party = engine
            .detect(
                std::slice::from_ref(self),
                stream,
                &CancellationToken::new(),
            )
            .await?;
        party.families.into_iter().next().ok_or_else(|| {
            MatchFilterError::invalid_parameter("template", "detection returned no family")
        })
    }
}

/// Read a template from an archive
pub fn read_template(path: &Path) -> Result<Template> {
    Template::read(path)
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        templates_equal(self, other, EqualityOptions::default())
    }
}

fn fmt_opt<T: fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "None".to_string(),
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(name) = &self.name else {
            return write!(f, "Template()");
        };
        write!(
            f,
            "Template {}: \n\t {} channels;\n\t lowcut: {} Hz;\n\t highcut: {} Hz;\n\t sampling rate {} Hz;\n\t filter order: {}; \n\t process length: {} s",
            name,
            self.channel_count(),
            fmt_opt(&self.lowcut),
            fmt_opt(&self.highcut),
            fmt_opt(&self.samp_rate),
            fmt_opt(&self.filt_order),
            fmt_opt(&self.process_length),
        )
    }
}

/// Validating builder for [`Template`]
#[derive(Debug, Clone, Default)]
pub struct TemplateBuilder {
    name: Option<String>,
    st: Option<Waveform>,
    lowcut: Option<f64>,
    highcut: Option<f64>,
    samp_rate: Option<f64>,
    filt_order: Option<u32>,
    process_length: Option<f64>,
    prepick: Option<f64>,
    event: Option<Event>,
}

impl TemplateBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn stream(mut self, stream: Stream) -> Self {
        self.st = Some(Waveform::Stream(stream));
        self
    }

    pub fn waveform(mut self, waveform: Waveform) -> Self {
        self.st = Some(waveform);
        self
    }

    pub fn lowcut(mut self, lowcut: f64) -> Self {
        self.lowcut = Some(lowcut);
        self
    }

    pub fn highcut(mut self, highcut: f64) -> Self {
        self.highcut = Some(highcut);
        self
    }

    pub fn samp_rate(mut self, samp_rate: f64) -> Self {
        self.samp_rate = Some(samp_rate);
        self
    }

    pub fn filt_order(mut self, filt_order: u32) -> Self {
        self.filt_order = Some(filt_order);
        self
    }

    pub fn process_length(mut self, process_length: f64) -> Self {
        self.process_length = Some(process_length);
        self
    }

    pub fn prepick(mut self, prepick: f64) -> Self {
        self.prepick = Some(prepick);
        self
    }

    pub fn event(mut self, event: Event) -> Self {
        self.event = Some(event);
        self
    }

    /// Validate and build the template, tagging the event's provenance
    pub fn build(self) -> Result<Template> {
        let mut template = Template {
            name: self.name,
            st: self.st,
            lowcut: self.lowcut,
            highcut: self.highcut,
            samp_rate: self.samp_rate,
            filt_order: self.filt_order,
            process_length: self.process_length,
            prepick: self.prepick,
            event: None,
        };
        template.validate()?;

        if let Some(mut event) = self.event {
            let tag_name = template.display_name().to_string();
            event.tag_provenance(&tag_name);
            template.event = Some(event);
        }

        Ok(template)
    }
}
