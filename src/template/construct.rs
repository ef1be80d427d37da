//! Template construction through an external generator
//!
//! Cutting templates out of raw station data around picks is the job of a
//! [`TemplateGenerator`] implementation. This module routes construction
//! requests to it, enforces which methods a single template may use, and
//! drops channels that hold no usable data.

use super::{Template, Waveform};
use crate::constants::HALF_PRECISION_MIN_POSITIVE;
use crate::error::{MatchFilterError, Result};
use crate::event::Event;
use crate::models::{Stream, Trace};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Ways of building templates from source data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionMethod {
    FromSac,
    FromMetaFile,
    FromSeishub,
    FromClient,
    MultiTemplateGen,
}

impl ConstructionMethod {
    /// Whether the method can build a lone template (others need a tribe)
    pub fn supports_single(&self) -> bool {
        matches!(self, ConstructionMethod::FromSac)
    }
}

impl fmt::Display for ConstructionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstructionMethod::FromSac => "from_sac",
            ConstructionMethod::FromMetaFile => "from_meta_file",
            ConstructionMethod::FromSeishub => "from_seishub",
            ConstructionMethod::FromClient => "from_client",
            ConstructionMethod::MultiTemplateGen => "multi_template_gen",
        };
        f.write_str(name)
    }
}

/// Processing parameters requested for new templates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructParams {
    pub lowcut: Option<f64>,
    pub highcut: Option<f64>,
    pub samp_rate: f64,
    pub filt_order: u32,
    /// Template length in seconds
    pub length: f64,
    pub prepick: f64,
    /// Seconds of data to process around each event
    pub process_len: f64,
}

/// One waveform/event pair produced by a generator
#[derive(Debug, Clone)]
pub struct GeneratedTemplate {
    pub stream: Stream,
    pub event: Option<Event>,
    pub process_length: f64,
}

/// External collaborator that cuts template waveforms from source data
pub trait TemplateGenerator {
    fn generate(
        &self,
        method: ConstructionMethod,
        params: &ConstructParams,
    ) -> Result<Vec<GeneratedTemplate>>;
}

/// Channels whose every sample vanishes at half precision carry no data
pub(crate) fn is_effectively_empty(trace: &Trace) -> bool {
    trace
        .data
        .iter()
        .all(|value| value.abs() < HALF_PRECISION_MIN_POSITIVE)
}

/// Remove channels without usable data, logging each one dropped
pub(crate) fn drop_empty_channels(stream: Stream) -> Stream {
    stream
        .traces
        .into_iter()
        .filter(|trace| {
            let empty = is_effectively_empty(trace);
            if empty {
                warn!(
                    "Data are zero in half precision, missing data, will not use: {}",
                    trace.id()
                );
            }
            !empty
        })
        .collect()
}

/// Build a template record from generator output
pub(crate) fn template_from_generated(
    name: &str,
    params: &ConstructParams,
    generated: GeneratedTemplate,
) -> Result<Template> {
    let stream = drop_empty_channels(generated.stream);

    let mut builder = Template::builder()
        .name(name)
        .waveform(Waveform::Stream(stream))
        .samp_rate(params.samp_rate)
        .filt_order(params.filt_order)
        .process_length(generated.process_length)
        .prepick(params.prepick);
    if let Some(lowcut) = params.lowcut {
        builder = builder.lowcut(lowcut);
    }
    if let Some(highcut) = params.highcut {
        builder = builder.highcut(highcut);
    }
    if let Some(event) = generated.event {
        builder = builder.event(event);
    }
    builder.build()
}

impl Template {
    /// Construct a single template with the given method.
    ///
    /// Only `FromSac` can build a lone template; every other method is a
    /// collection-level operation and must go through `Tribe::construct`.
    pub fn construct(
        method: ConstructionMethod,
        name: &str,
        params: &ConstructParams,
        generator: &dyn TemplateGenerator,
    ) -> Result<Template> {
        if !method.supports_single() {
            return Err(MatchFilterError::UnsupportedConstruction {
                method: method.to_string(),
            });
        }
        super::validate_name(name)?;

        let generated = generator
            .generate(method, params)?
            .into_iter()
            .next()
            .ok_or_else(|| MatchFilterError::Generation {
                reason: format!("{} produced no templates", method),
            })?;

        let template = template_from_generated(name, params, generated)?;
        info!(
            "Constructed template {} with {} channels",
            name,
            template.channel_count()
        );
        Ok(template)
    }
}
