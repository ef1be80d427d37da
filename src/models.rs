//! Core waveform data structures.
//!
//! Defines channel identifiers, per-channel traces (optionally masked where
//! data are missing) and the ordered stream container shared by templates
//! and continuous data.

use crate::error::{MatchFilterError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Seconds elapsed from `start` to `end` (negative if `end` is earlier)
pub fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end.signed_duration_since(start);
    match delta.num_nanoseconds() {
        Some(nanos) => nanos as f64 * 1e-9,
        None => delta.num_milliseconds() as f64 * 1e-3,
    }
}

/// Shift a timestamp by a (possibly fractional) number of seconds
pub fn offset_time(time: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    time + Duration::nanoseconds((seconds * 1e9).round() as i64)
}

/// Network/station/location/channel code identifying one channel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceId {
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
}

impl TraceId {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        location: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            location: location.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

fn default_calib() -> f64 {
    1.0
}

/// Header information for a single trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStats {
    pub id: TraceId,
    pub starttime: DateTime<Utc>,
    pub sampling_rate: f64,
    #[serde(default = "default_calib")]
    pub calib: f64,
}

impl TraceStats {
    /// Sample interval in seconds
    pub fn delta(&self) -> f64 {
        if self.sampling_rate > 0.0 {
            1.0 / self.sampling_rate
        } else {
            0.0
        }
    }
}

/// A single channel of regularly sampled data.
///
/// `mask` marks missing samples (`true` = gap). Gaps are never pre-filled:
/// the detection pipeline zero-fills them internally and masks the affected
/// correlation outputs afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub stats: TraceStats,
    pub data: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<Vec<bool>>,
}

impl Trace {
    /// Create an unmasked trace
    pub fn new(
        id: TraceId,
        starttime: DateTime<Utc>,
        sampling_rate: f64,
        data: Vec<f64>,
    ) -> Self {
        Self {
            stats: TraceStats {
                id,
                starttime,
                sampling_rate,
                calib: 1.0,
            },
            data,
            mask: None,
        }
    }

    pub fn id(&self) -> &TraceId {
        &self.stats.id
    }

    pub fn npts(&self) -> usize {
        self.data.len()
    }

    /// Time of the last sample
    pub fn endtime(&self) -> DateTime<Utc> {
        let span = self.npts().saturating_sub(1) as f64 * self.stats.delta();
        offset_time(self.stats.starttime, span)
    }

    /// Time of sample `index`
    pub fn time_of(&self, index: usize) -> DateTime<Utc> {
        offset_time(self.stats.starttime, index as f64 * self.stats.delta())
    }

    pub fn is_masked(&self, index: usize) -> bool {
        self.mask
            .as_ref()
            .and_then(|mask| mask.get(index).copied())
            .unwrap_or(false)
    }

    /// Fraction of samples that hold real data
    pub fn present_fraction(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        match &self.mask {
            Some(mask) => {
                let present = mask.iter().filter(|&&gap| !gap).count();
                present as f64 / self.data.len() as f64
            }
            None => 1.0,
        }
    }

    /// Cut exactly `npts` samples starting at the sample nearest `start`.
    ///
    /// Samples outside the trace or inside a gap come back masked, so the
    /// result always has the requested length.
    pub fn window(&self, start: DateTime<Utc>, npts: usize) -> Trace {
        let first = (seconds_between(self.stats.starttime, start) * self.stats.sampling_rate)
            .round() as i64;

        let mut data = Vec::with_capacity(npts);
        let mut mask = Vec::with_capacity(npts);
        for offset in 0..npts as i64 {
            let source = first + offset;
            if source >= 0 && (source as usize) < self.data.len() && !self.is_masked(source as usize)
            {
                data.push(self.data[source as usize]);
                mask.push(false);
            } else {
                data.push(0.0);
                mask.push(true);
            }
        }

        let mask = if mask.iter().any(|&gap| gap) {
            Some(mask)
        } else {
            None
        };

        Trace {
            stats: TraceStats {
                starttime: offset_time(self.stats.starttime, first as f64 * self.stats.delta()),
                ..self.stats.clone()
            },
            data,
            mask,
        }
    }
}

/// Ordered collection of traces
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stream {
    pub traces: Vec<Trace>,
}

impl Stream {
    pub fn new(traces: Vec<Trace>) -> Self {
        Self { traces }
    }

    pub fn len(&self) -> usize {
        self.traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Trace> {
        self.traces.iter()
    }

    pub fn push(&mut self, trace: Trace) {
        self.traces.push(trace);
    }

    /// Copy of the stream sorted by channel id, then start time
    pub fn sorted(&self) -> Stream {
        let mut traces = self.traces.clone();
        traces.sort_by(|a, b| {
            a.id()
                .cmp(b.id())
                .then_with(|| a.stats.starttime.cmp(&b.stats.starttime))
        });
        Stream { traces }
    }

    /// Traces matching a channel id
    pub fn select<'a>(&'a self, id: &'a TraceId) -> impl Iterator<Item = &'a Trace> + 'a {
        self.traces.iter().filter(move |trace| trace.id() == id)
    }

    /// Earliest start time across all traces
    pub fn earliest_start(&self) -> Option<DateTime<Utc>> {
        self.traces.iter().map(|trace| trace.stats.starttime).min()
    }

    /// Latest end time across all traces
    pub fn latest_end(&self) -> Option<DateTime<Utc>> {
        self.traces.iter().map(|trace| trace.endtime()).max()
    }

    /// Join traces sharing a channel id into one masked trace per channel.
    ///
    /// Samples not covered by any input trace are masked rather than filled.
    /// Where traces overlap the earlier trace's samples are kept.
    pub fn merge(&self) -> Result<Stream> {
        let mut by_id: BTreeMap<TraceId, Vec<&Trace>> = BTreeMap::new();
        for trace in &self.traces {
            by_id.entry(trace.id().clone()).or_default().push(trace);
        }

        let mut merged = Vec::with_capacity(by_id.len());
        for (id, mut pieces) in by_id {
            pieces.sort_by_key(|trace| trace.stats.starttime);
            let first = pieces[0];
            if pieces.len() == 1 {
                merged.push(first.clone());
                continue;
            }

            let sampling_rate = first.stats.sampling_rate;
            if let Some(other) = pieces
                .iter()
                .find(|trace| trace.stats.sampling_rate != sampling_rate)
            {
                return Err(MatchFilterError::SamplingRateMismatch {
                    channel: id.to_string(),
                    expected: sampling_rate,
                    found: other.stats.sampling_rate,
                });
            }

            let start = first.stats.starttime;
            let end = pieces
                .iter()
                .map(|trace| trace.endtime())
                .max()
                .unwrap_or(start);
            let npts = (seconds_between(start, end) * sampling_rate).round() as usize + 1;

            let mut data = vec![0.0; npts];
            let mut mask = vec![true; npts];
            for piece in &pieces {
                let offset = (seconds_between(start, piece.stats.starttime) * sampling_rate)
                    .round() as usize;
                for (i, &value) in piece.data.iter().enumerate() {
                    let target = offset + i;
                    if target < npts && mask[target] && !piece.is_masked(i) {
                        data[target] = value;
                        mask[target] = false;
                    }
                }
            }

            let gaps = mask.iter().filter(|&&gap| gap).count();
            debug!(
                "Merged {} traces for {} into {} samples ({} masked)",
                pieces.len(),
                id,
                npts,
                gaps
            );

            merged.push(Trace {
                stats: first.stats.clone(),
                data,
                mask: if gaps > 0 { Some(mask) } else { None },
            });
        }

        Ok(Stream { traces: merged })
    }
}

impl FromIterator<Trace> for Stream {
    fn from_iter<I: IntoIterator<Item = Trace>>(iter: I) -> Self {
        Stream {
            traces: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Stream {
    type Item = &'a Trace;
    type IntoIter = std::slice::Iter<'a, Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.traces.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_trace_id_display_and_ordering() {
        let a = TraceId::new("NZ", "FOZ", "10", "HHZ");
        let b = TraceId::new("NZ", "WVZ", "10", "HHZ");
        assert_eq!(a.to_string(), "NZ.FOZ.10.HHZ");
        assert!(a < b);
    }

    #[test]
    fn test_endtime_and_delta() {
        let trace = Trace::new(TraceId::new("NZ", "FOZ", "", "HHZ"), start(), 100.0, vec![0.0; 101]);
        assert_eq!(trace.stats.delta(), 0.01);
        assert_eq!(seconds_between(trace.stats.starttime, trace.endtime()), 1.0);
    }

    #[test]
    fn test_merge_masks_gaps() {
        let id = TraceId::new("NZ", "FOZ", "", "HHZ");
        let first = Trace::new(id.clone(), start(), 10.0, vec![1.0; 10]);
        let second = Trace::new(id.clone(), offset_time(start(), 2.0), 10.0, vec![2.0; 10]);
        let stream = Stream::new(vec![second, first]);

        let merged = stream.merge().unwrap();
        assert_eq!(merged.len(), 1);
        let trace = &merged.traces[0];
        assert_eq!(trace.npts(), 30);
        assert!(!trace.is_masked(9));
        assert!(trace.is_masked(10));
        assert!(trace.is_masked(19));
        assert_eq!(trace.data[20], 2.0);
        assert_eq!(trace.data[15], 0.0);
    }

    #[test]
    fn test_merge_rejects_mixed_sampling_rates() {
        let id = TraceId::new("NZ", "FOZ", "", "HHZ");
        let stream = Stream::new(vec![
            Trace::new(id.clone(), start(), 10.0, vec![1.0; 10]),
            Trace::new(id, offset_time(start(), 5.0), 20.0, vec![1.0; 10]),
        ]);
        assert!(matches!(
            stream.merge(),
            Err(MatchFilterError::SamplingRateMismatch { .. })
        ));
    }

    #[test]
    fn test_window_pads_with_masked_samples() {
        let trace = Trace::new(
            TraceId::new("NZ", "FOZ", "", "HHZ"),
            start(),
            10.0,
            (0..10).map(f64::from).collect(),
        );
        let window = trace.window(offset_time(start(), 0.5), 10);
        assert_eq!(window.npts(), 10);
        assert_eq!(window.data[0], 5.0);
        assert!(!window.is_masked(4));
        assert!(window.is_masked(5));
        assert_eq!(window.present_fraction(), 0.5);
    }
}
