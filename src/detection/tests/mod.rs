//! Tests for the detection module
//!
//! Shared fixtures: a three-channel template with staggered channel starts
//! and continuous data built from white noise with copies of the template
//! embedded at known samples.

pub mod correlate_tests;

use crate::models::{Stream, Trace, TraceId, offset_time};
use crate::template::Template;
use crate::template::tests::{synthetic_data, test_start};
use chrono::{DateTime, TimeZone, Utc};
use std::ops::Range;

pub const SAMP_RATE: f64 = 100.0;
pub const TEMPLATE_NPTS: usize = 100;
pub const DATA_NPTS: usize = 3000;
pub const EVENT_SAMPLE: usize = 1200;
pub const CHANNEL_OFFSETS: [f64; 3] = [0.0, 0.2, 0.5];

pub fn channel_ids() -> Vec<TraceId> {
    ["EHZ", "EHN", "EHE"]
        .into_iter()
        .map(|channel| TraceId::new("BW", "RJOB", "", channel))
        .collect()
}

pub fn data_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2009, 8, 24, 1, 0, 0).unwrap()
}

/// Uniform white noise in `[-amplitude, amplitude)` from a fixed seed
pub fn white_noise(npts: usize, seed: u64, amplitude: f64) -> Vec<f64> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..npts)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            amplitude * (2.0 * unit - 1.0)
        })
        .collect()
}

fn channel_waveform(channel: usize) -> Vec<f64> {
    synthetic_data(TEMPLATE_NPTS, channel as f64)
}

fn channel_lag(channel: usize) -> usize {
    (CHANNEL_OFFSETS[channel] * SAMP_RATE).round() as usize
}

/// Three-channel template with channels starting 0, 0.2 and 0.5 s apart
pub fn detection_template(name: &str, highcut: f64) -> Template {
    let stream: Stream = channel_ids()
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            Trace::new(
                id,
                offset_time(test_start(), CHANNEL_OFFSETS[i]),
                SAMP_RATE,
                channel_waveform(i),
            )
        })
        .collect();

    Template::builder()
        .name(name)
        .stream(stream)
        .lowcut(2.0)
        .highcut(highcut)
        .samp_rate(SAMP_RATE)
        .filt_order(4)
        .process_length(3600.0)
        .prepick(0.1)
        .build()
        .unwrap()
}

/// Noisy continuous data with the template embedded at each event sample
pub fn continuous_data(events: &[usize]) -> Stream {
    channel_ids()
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let mut data = white_noise(DATA_NPTS, i as u64 + 1, 0.1);
            for &event in events {
                let first = event + channel_lag(i);
                for (k, value) in channel_waveform(i).into_iter().enumerate() {
                    data[first + k] += value;
                }
            }
            Trace::new(id, data_start(), SAMP_RATE, data)
        })
        .collect()
}

/// Mark samples of one channel as missing
pub fn mask_samples(stream: &mut Stream, channel: &str, range: Range<usize>) {
    for trace in stream
        .traces
        .iter_mut()
        .filter(|trace| trace.stats.id.channel == channel)
    {
        let npts = trace.npts();
        let mask = trace.mask.get_or_insert_with(|| vec![false; npts]);
        for index in range.clone() {
            mask[index] = true;
        }
    }
}

/// Expected detection time for an event sample
pub fn event_time(event: usize) -> DateTime<Utc> {
    offset_time(data_start(), event as f64 / SAMP_RATE)
}
