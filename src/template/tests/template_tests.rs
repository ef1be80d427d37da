//! Tests for template construction invariants and display

use super::*;
use crate::error::MatchFilterError;
use crate::template::{Waveform, validate_name};

#[test]
fn test_valid_names_pass() {
    for name in ["a", "kaik_eq-01", "TEMPLATE_2016p858000", "-_-"] {
        assert!(validate_name(name).is_ok(), "{} should be valid", name);
    }
}

#[test]
fn test_invalid_names_fail_construction() {
    for name in ["", "has space", "dot.name", "slash/name", "ünïcode"] {
        let result = Template::builder().name(name).build();
        assert!(
            matches!(result, Err(MatchFilterError::InvalidName { .. })),
            "{:?} should be rejected",
            name
        );
    }
}

#[test]
fn test_unnamed_template_builds() {
    let template = Template::builder().build().unwrap();
    assert!(template.name.is_none());
    assert_eq!(template.display_name(), "unnamed");
    assert_eq!(template.to_string(), "Template()");
}

#[test]
fn test_sampling_rate_mismatch_fails_construction() {
    let result = Template::builder()
        .name("a")
        .stream(test_stream())
        .samp_rate(50.0)
        .build();

    match result {
        Err(MatchFilterError::SamplingRateMismatch {
            expected, found, ..
        }) => {
            assert_eq!(expected, 50.0);
            assert_eq!(found, 100.0);
        }
        other => panic!("expected sampling rate mismatch, got {:?}", other),
    }
}

#[test]
fn test_single_trace_waveform_is_validated() {
    let trace = test_stream().traces[0].clone();
    let result = Template::builder()
        .name("a")
        .waveform(Waveform::Single(trace))
        .samp_rate(20.0)
        .build();
    assert!(matches!(
        result,
        Err(MatchFilterError::SamplingRateMismatch { .. })
    ));
}

#[test]
fn test_waveform_without_samp_rate_is_accepted() {
    let template = Template::builder()
        .name("a")
        .stream(test_stream())
        .build()
        .unwrap();
    assert_eq!(template.channel_count(), 3);
}

#[test]
fn test_event_is_tagged_once() {
    let mut event = test_event();
    event.tag_provenance("a");
    let template = Template::builder()
        .name("a")
        .event(event)
        .build()
        .unwrap();

    let event = template.event.as_ref().unwrap();
    assert_eq!(event.provenance.len(), 1);
    assert!(event.has_provenance("a"));
}

#[test]
fn test_unnamed_event_tag() {
    let template = Template::builder().event(test_event()).build().unwrap();
    assert!(template.event.unwrap().has_provenance("unnamed"));
}

#[test]
fn test_display() {
    let template = create_test_template("a", 2.0, 8.0);
    assert_eq!(
        template.to_string(),
        "Template a: \n\t 3 channels;\n\t lowcut: 2 Hz;\n\t highcut: 8 Hz;\n\t sampling rate 100 Hz;\n\t filter order: 4; \n\t process length: 3600 s"
    );
}

#[test]
fn test_channel_offsets() {
    let template = Template::builder()
        .name("offsets")
        .stream(test_stream_with_offsets(&[1.0, 3.3, 3.3], 100.0, 50))
        .samp_rate(100.0)
        .build()
        .unwrap();

    let offsets = template.channel_offsets();
    assert_eq!(offsets.len(), 3);
    assert_eq!(offsets[0].1, 0.0);
    assert!((offsets[1].1 - 2.3).abs() < 1e-9);
    assert!((template.max_offset() - 2.3).abs() < 1e-9);
}

#[test]
fn test_channel_offsets_without_waveform() {
    let template = Template::builder().name("empty").build().unwrap();
    assert!(template.channel_offsets().is_empty());
    assert_eq!(template.max_offset(), 0.0);
}

#[test]
fn test_non_finite_parameters_fail_construction() {
    let builders = [
        Template::builder().lowcut(f64::NAN),
        Template::builder().highcut(f64::INFINITY),
        Template::builder().samp_rate(f64::NAN),
        Template::builder().process_length(f64::NEG_INFINITY),
        Template::builder().prepick(f64::NAN),
    ];
    for builder in builders {
        assert!(matches!(
            builder.name("a").build(),
            Err(MatchFilterError::InvalidParameter { .. })
        ));
    }
}

#[test]
fn test_built_template_equals_itself() {
    let template = Template::builder()
        .name("a")
        .lowcut(2.0)
        .highcut(8.0)
        .samp_rate(100.0)
        .process_length(3600.0)
        .prepick(0.1)
        .build()
        .unwrap();

    assert_eq!(template, template.clone());
    assert!(template.same_processing(&template));
}
