//! Source-event metadata attached to templates.
//!
//! Events carry origins, magnitudes, picks and free-form comments. Every
//! sub-object has a `resource_id` that archive readers regenerate on load, so
//! similarity checks ignore them (see `template::equality`).

use crate::constants::PROVENANCE_PREFIX;
use crate::models::TraceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationInfo {
    pub agency: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Origin {
    pub resource_id: String,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Depth in metres
    pub depth: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Magnitude {
    pub resource_id: String,
    pub mag: f64,
    pub magnitude_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub resource_id: String,
    pub waveform_id: TraceId,
    pub time: DateTime<Utc>,
    pub phase_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub resource_id: String,
    pub text: String,
    pub creation_info: Option<CreationInfo>,
}

/// Seismic source event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub resource_id: String,
    #[serde(default)]
    pub origins: Vec<Origin>,
    #[serde(default)]
    pub magnitudes: Vec<Magnitude>,
    #[serde(default)]
    pub picks: Vec<Pick>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Provenance tags recording which templates were generated from this event
    #[serde(default)]
    pub provenance: BTreeSet<String>,
}

impl Event {
    pub fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            ..Default::default()
        }
    }

    /// Provenance tag for a template name
    pub fn provenance_tag(template_name: &str) -> String {
        format!("{}{}", PROVENANCE_PREFIX, template_name)
    }

    /// Record that a template was generated from this event.
    ///
    /// Returns `true` if the tag was newly added; tagging twice under the
    /// same name leaves the event unchanged.
    pub fn tag_provenance(&mut self, template_name: &str) -> bool {
        self.provenance.insert(Self::provenance_tag(template_name))
    }

    pub fn has_provenance(&self, template_name: &str) -> bool {
        self.provenance
            .contains(&Self::provenance_tag(template_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_provenance_is_idempotent() {
        let mut event = Event::new("smi:local/event/1");
        assert!(event.tag_provenance("kaik_eq"));
        assert!(!event.tag_provenance("kaik_eq"));
        assert_eq!(event.provenance.len(), 1);
        assert!(event.has_provenance("kaik_eq"));
        assert!(
            event
                .provenance
                .contains("generated from template kaik_eq")
        );
    }

    #[test]
    fn test_distinct_names_get_distinct_tags() {
        let mut event = Event::new("smi:local/event/1");
        event.tag_provenance("a");
        event.tag_provenance("b");
        assert_eq!(event.provenance.len(), 2);
    }
}
