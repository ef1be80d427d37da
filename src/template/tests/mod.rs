//! Tests for the template module
//!
//! Shared fixtures for equality, grouping and construction tests.

pub mod construct_tests;
pub mod template_tests;

use crate::event::{Comment, CreationInfo, Event, Magnitude, Origin, Pick};
use crate::models::{Stream, Trace, TraceId, offset_time};
use crate::template::Template;
use chrono::{DateTime, TimeZone, Utc};

pub fn test_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2009, 8, 24, 0, 20, 3).unwrap()
}

/// Deterministic waveform samples
pub fn synthetic_data(npts: usize, phase: f64) -> Vec<f64> {
    (0..npts)
        .map(|i| ((i as f64) * 0.3 + phase).sin() * (1.0 + (i as f64 * 0.05).cos()))
        .collect()
}

/// Three-component stream with channels starting at the given offsets
pub fn test_stream_with_offsets(offsets: &[f64], samp_rate: f64, npts: usize) -> Stream {
    let channels = ["EHZ", "EHN", "EHE", "EH1", "EH2"];
    offsets
        .iter()
        .enumerate()
        .map(|(i, &offset)| {
            Trace::new(
                TraceId::new("BW", "RJOB", "", channels[i % channels.len()]),
                offset_time(test_start(), offset),
                samp_rate,
                synthetic_data(npts, i as f64),
            )
        })
        .collect()
}

pub fn test_stream() -> Stream {
    test_stream_with_offsets(&[0.0, 0.0, 0.0], 100.0, 200)
}

/// Template with the standard test processing and the given filter corners
pub fn create_test_template(name: &str, lowcut: f64, highcut: f64) -> Template {
    Template::builder()
        .name(name)
        .stream(test_stream())
        .lowcut(lowcut)
        .highcut(highcut)
        .samp_rate(100.0)
        .filt_order(4)
        .process_length(3600.0)
        .prepick(0.5)
        .build()
        .unwrap()
}

pub fn test_event() -> Event {
    let mut event = Event::new("smi:local/event/2016p858000");
    event.origins.push(Origin {
        resource_id: "smi:local/origin/1".to_string(),
        time: test_start(),
        latitude: -42.69,
        longitude: 173.02,
        depth: Some(15_000.0),
    });
    event.magnitudes.push(Magnitude {
        resource_id: "smi:local/magnitude/1".to_string(),
        mag: 3.4,
        magnitude_type: Some("ML".to_string()),
    });
    event.picks.push(Pick {
        resource_id: "smi:local/pick/1".to_string(),
        waveform_id: TraceId::new("BW", "RJOB", "", "EHZ"),
        time: offset_time(test_start(), 0.5),
        phase_hint: Some("P".to_string()),
    });
    event.comments.push(Comment {
        resource_id: "smi:local/comment/1".to_string(),
        text: "manually reviewed".to_string(),
        creation_info: Some(CreationInfo {
            agency: Some("GNS".to_string()),
            author: None,
        }),
    });
    event
}
