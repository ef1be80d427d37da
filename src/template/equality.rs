//! Explicit comparators for templates, waveforms and events
//!
//! Every field of [`Template`] is listed here by name, so adding a field means
//! deciding how it compares. Resource identifiers on events are regenerated
//! whenever an archive is read and are never compared.

use super::{Template, Waveform};
use crate::event::{Comment, Event, Magnitude, Origin, Pick};
use crate::models::{Stream, Trace};
use tracing::debug;

/// Options for full template equality
#[derive(Debug, Clone, Copy, Default)]
pub struct EqualityOptions {
    /// Compare only origins and picks of the attached events
    pub shallow_event_check: bool,
    /// Log the first difference found at debug level
    pub verbose: bool,
}

/// Full equality of two templates
pub fn templates_equal(a: &Template, b: &Template, options: EqualityOptions) -> bool {
    let report = |field: &str| {
        if options.verbose {
            debug!(
                "Templates {} and {} differ on {}",
                a.display_name(),
                b.display_name(),
                field
            );
        }
        false
    };

    if a.name != b.name {
        return report("name");
    }
    if !waveforms_equal(a.st.as_ref(), b.st.as_ref(), options.verbose) {
        return report("st");
    }
    if a.lowcut != b.lowcut {
        return report("lowcut");
    }
    if a.highcut != b.highcut {
        return report("highcut");
    }
    if a.samp_rate != b.samp_rate {
        return report("samp_rate");
    }
    if a.filt_order != b.filt_order {
        return report("filt_order");
    }
    if a.process_length != b.process_length {
        return report("process_length");
    }
    if a.prepick != b.prepick {
        return report("prepick");
    }
    let events_match = match (&a.event, &b.event) {
        (Some(ea), Some(eb)) => events_similar(ea, eb, options.shallow_event_check),
        (None, None) => true,
        _ => false,
    };
    if !events_match {
        return report("event");
    }
    true
}

/// Whether two templates share lowcut, highcut, samp_rate, filt_order and process_length.
///
/// Name, waveform, prepick and event are not compared.
pub fn same_processing(a: &Template, b: &Template) -> bool {
    a.lowcut == b.lowcut
        && a.highcut == b.highcut
        && a.samp_rate == b.samp_rate
        && a.filt_order == b.filt_order
        && a.process_length == b.process_length
}

fn waveforms_equal(a: Option<&Waveform>, b: Option<&Waveform>, verbose: bool) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Waveform::Stream(sa)), Some(Waveform::Stream(sb))) => streams_equal(sa, sb, verbose),
        (Some(Waveform::Single(ta)), Some(Waveform::Single(tb))) => traces_equal(ta, tb, verbose),
        _ => false,
    }
}

/// Channel-by-channel equality after sorting both streams by id
pub fn streams_equal(a: &Stream, b: &Stream, verbose: bool) -> bool {
    if a.len() != b.len() {
        if verbose {
            debug!("Streams hold {} and {} channels", a.len(), b.len());
        }
        return false;
    }
    let (a, b) = (a.sorted(), b.sorted());
    a.iter().zip(b.iter()).all(|(ta, tb)| traces_equal(ta, tb, verbose))
}

/// Exact sample equality plus agreement on every header field
pub fn traces_equal(a: &Trace, b: &Trace, verbose: bool) -> bool {
    let mismatch = if a.data != b.data {
        Some("data")
    } else if a.stats.id.network != b.stats.id.network {
        Some("network")
    } else if a.stats.id.station != b.stats.id.station {
        Some("station")
    } else if a.stats.id.channel != b.stats.id.channel {
        Some("channel")
    } else if a.stats.id.location != b.stats.id.location {
        Some("location")
    } else if a.stats.starttime != b.stats.starttime {
        Some("starttime")
    } else if a.endtime() != b.endtime() {
        Some("endtime")
    } else if a.stats.sampling_rate != b.stats.sampling_rate {
        Some("sampling_rate")
    } else if a.stats.delta() != b.stats.delta() {
        Some("delta")
    } else if a.npts() != b.npts() {
        Some("npts")
    } else if a.stats.calib != b.stats.calib {
        Some("calib")
    } else {
        None
    };

    match mismatch {
        Some(field) => {
            if verbose {
                debug!("Template traces differ on {} for {}", field, a.id());
            }
            false
        }
        None => true,
    }
}

/// Event similarity ignoring resource identifiers.
///
/// The shallow check compares origins and picks only; the full check adds
/// magnitudes, comments and provenance tags.
pub fn events_similar(a: &Event, b: &Event, shallow: bool) -> bool {
    let core = lists_match(&a.origins, &b.origins, origins_similar)
        && lists_match(&a.picks, &b.picks, picks_similar);
    if !core {
        return false;
    }
    if shallow {
        return true;
    }
    lists_match(&a.magnitudes, &b.magnitudes, magnitudes_similar)
        && lists_match(&a.comments, &b.comments, comments_similar)
        && a.provenance == b.provenance
}

fn lists_match<T>(a: &[T], b: &[T], similar: fn(&T, &T) -> bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| similar(x, y))
}

fn origins_similar(a: &Origin, b: &Origin) -> bool {
    a.time == b.time && a.latitude == b.latitude && a.longitude == b.longitude && a.depth == b.depth
}

fn picks_similar(a: &Pick, b: &Pick) -> bool {
    a.waveform_id == b.waveform_id && a.time == b.time && a.phase_hint == b.phase_hint
}

fn magnitudes_similar(a: &Magnitude, b: &Magnitude) -> bool {
    a.mag == b.mag && a.magnitude_type == b.magnitude_type
}

fn comments_similar(a: &Comment, b: &Comment) -> bool {
    a.text == b.text && a.creation_info == b.creation_info
}
