//! Tests for construction through a template generator

use super::*;
use crate::error::{MatchFilterError, Result};
use crate::template::{
    ConstructParams, ConstructionMethod, GeneratedTemplate, TemplateGenerator,
};
use crate::tribe::Tribe;

/// Generator returning fixed streams, one per requested event
struct FixedGenerator {
    events: usize,
    zero_channel: bool,
}

impl TemplateGenerator for FixedGenerator {
    fn generate(
        &self,
        _method: ConstructionMethod,
        _params: &ConstructParams,
    ) -> Result<Vec<GeneratedTemplate>> {
        Ok((0..self.events)
            .map(|_| {
                let mut stream = test_stream();
                if self.zero_channel {
                    stream.traces[1].data = vec![1e-9; 200];
                }
                GeneratedTemplate {
                    stream,
                    event: Some(test_event()),
                    process_length: 300.0,
                }
            })
            .collect())
    }
}

fn params() -> ConstructParams {
    ConstructParams {
        lowcut: Some(2.0),
        highcut: Some(8.0),
        samp_rate: 100.0,
        filt_order: 4,
        length: 2.0,
        prepick: 0.1,
        process_len: 86400.0,
    }
}

#[test]
fn test_construct_from_sac() {
    let generator = FixedGenerator {
        events: 1,
        zero_channel: false,
    };
    let template =
        Template::construct(ConstructionMethod::FromSac, "test", &params(), &generator).unwrap();

    assert_eq!(template.name.as_deref(), Some("test"));
    assert_eq!(template.channel_count(), 3);
    assert_eq!(template.process_length, Some(300.0));
    assert_eq!(template.prepick, Some(0.1));
    assert!(template.event.unwrap().has_provenance("test"));
}

#[test]
fn test_construct_drops_empty_channels() {
    let generator = FixedGenerator {
        events: 1,
        zero_channel: true,
    };
    let template =
        Template::construct(ConstructionMethod::FromSac, "test", &params(), &generator).unwrap();
    assert_eq!(template.channel_count(), 2);
}

#[test]
fn test_collection_methods_are_rejected_for_single_templates() {
    let generator = FixedGenerator {
        events: 1,
        zero_channel: false,
    };
    for method in [
        ConstructionMethod::FromMetaFile,
        ConstructionMethod::FromSeishub,
        ConstructionMethod::FromClient,
        ConstructionMethod::MultiTemplateGen,
    ] {
        let result = Template::construct(method, "test", &params(), &generator);
        match result {
            Err(err @ MatchFilterError::UnsupportedConstruction { .. }) => {
                assert!(err.to_string().contains("Tribe::construct"));
            }
            other => panic!("expected unsupported construction, got {:?}", other),
        }
    }
}

#[test]
fn test_construct_rejects_invalid_name() {
    let generator = FixedGenerator {
        events: 1,
        zero_channel: false,
    };
    let result = Template::construct(ConstructionMethod::FromSac, "bad name", &params(), &generator);
    assert!(matches!(result, Err(MatchFilterError::InvalidName { .. })));
}

#[test]
fn test_tribe_construct_accepts_collection_methods() {
    let generator = FixedGenerator {
        events: 3,
        zero_channel: false,
    };
    let tribe =
        Tribe::construct(ConstructionMethod::FromClient, "kaik", &params(), &generator).unwrap();
    assert_eq!(tribe.len(), 3);
    assert!(tribe.get("kaik_2").is_some());
    assert_eq!(tribe.group().len(), 1);
}

#[test]
fn test_empty_generation_is_an_error() {
    let generator = FixedGenerator {
        events: 0,
        zero_channel: false,
    };
    assert!(matches!(
        Template::construct(ConstructionMethod::FromSac, "test", &params(), &generator),
        Err(MatchFilterError::Generation { .. })
    ));
}
