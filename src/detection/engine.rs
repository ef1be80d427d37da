//! Detection engine
//!
//! Drives a [`CorrelationBackend`] over continuous data: templates are
//! grouped by processing parameters, data are cut into overlapping windows
//! per group, per-channel correlations run on a worker pool and are stacked
//! in a fixed channel order before thresholding and peak deduplication.

use super::correlate::CorrelationBackend;
use super::gaps::{mask_correlation, valid_windows, zero_fill};
use super::peaks::deduplicate;
use super::threshold::compute_cutoff;
use super::{Detection, Family, Party};
use crate::config::{Concurrency, DetectConfig};
use crate::constants::MIN_DATA_FRACTION;
use crate::error::{MatchFilterError, Result};
use crate::models::{Stream, Trace, TraceId, offset_time, seconds_between};
use crate::template::{Template, group_indices};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One processing window of continuous data
#[derive(Debug, Clone, Copy)]
struct WindowSpan {
    /// Sample offset from the start of the data
    first_sample: usize,
    npts: usize,
    starttime: DateTime<Utc>,
}

/// Gap-filled data for one channel in one window
struct WindowChannel {
    filled: Vec<f64>,
    mask: Option<Vec<bool>>,
}

/// A single template channel correlated against a single data channel
struct CorrelationJob {
    slot: usize,
    id: TraceId,
    lag: usize,
    template: Arc<Vec<f64>>,
    window: Arc<WindowChannel>,
}

/// Masked correlation output for one template channel
struct ChannelCorrelation {
    slot: usize,
    id: TraceId,
    lag: usize,
    values: Vec<Option<f64>>,
}

impl CorrelationJob {
    fn run(self, backend: &dyn CorrelationBackend) -> ChannelCorrelation {
        let raw = backend.correlate(&self.template, &self.window.filled);
        let valid = valid_windows(
            self.window.mask.as_deref(),
            self.window.filled.len(),
            self.template.len(),
        );
        ChannelCorrelation {
            slot: self.slot,
            id: self.id,
            lag: self.lag,
            values: mask_correlation(raw, &valid),
        }
    }
}

/// Correlation sum for one template in one window
struct StackedSum {
    series: Vec<Option<f64>>,
    channel_counts: Vec<usize>,
}

/// Matched-filter detection over continuous data
pub struct MatchFilter {
    config: DetectConfig,
    backend: Arc<dyn CorrelationBackend>,
    progress: Option<ProgressBar>,
}

impl MatchFilter {
    /// Create an engine; deprecated configuration parameters are folded in here
    pub fn new(config: DetectConfig, backend: Arc<dyn CorrelationBackend>) -> Self {
        Self {
            config: config.resolve_deprecated(),
            backend,
            progress: None,
        }
    }

    /// Report progress per template group
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    /// Search continuous data for every template.
    ///
    /// Returns one family per template in input order. Cancellation is
    /// honoured between groups and windows; a cancelled run returns
    /// [`MatchFilterError::ProcessingInterrupted`] and no partial party.
    pub async fn detect(
        &self,
        templates: &[Template],
        stream: &Stream,
        cancel: &CancellationToken,
    ) -> Result<Party> {
        self.config.validate()?;

        let data = stream.merge()?;
        let groups = group_indices(templates);
        info!(
            "Detecting with {} templates in {} groups across {} channels",
            templates.len(),
            groups.len(),
            data.len()
        );

        if let Some(pb) = &self.progress {
            pb.set_length(groups.len() as u64);
            pb.set_message("Correlating template groups");
        }

        let mut detections: Vec<Vec<Detection>> = vec![Vec::new(); templates.len()];
        for (group_number, group) in groups.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(MatchFilterError::processing_interrupted(format!(
                    "cancelled before group {} of {}",
                    group_number + 1,
                    groups.len()
                )));
            }

            let group_results = self.detect_group(templates, group, &data, cancel).await?;
            for ((template_index, _window), found) in group_results {
                detections[template_index].extend(found);
            }

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        share_with_duplicates(templates, &groups, &mut detections);

        let families = templates
            .iter()
            .zip(detections)
            .map(|(template, found)| {
                let mut family = Family {
                    template: template.clone(),
                    detections: found,
                };
                family.decluster(self.config.trig_int);
                family
            })
            .collect::<Vec<_>>();

        let party = Party { families };
        info!(
            "Detection complete: {} detections from {} templates",
            party.detection_count(),
            party.len()
        );
        Ok(party)
    }

    /// Run one group of identically processed templates.
    ///
    /// Results are keyed by (template index, window index) and only
    /// handed back once the whole group has finished.
    async fn detect_group(
        &self,
        templates: &[Template],
        group: &[usize],
        data: &Stream,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<(usize, usize), Vec<Detection>>> {
        let members: Vec<&Template> = group.iter().map(|&index| &templates[index]).collect();
        let mut results = BTreeMap::new();

        let Some(sampling_rate) = group_sampling_rate(&members) else {
            warn!("Template group without waveforms, nothing to correlate");
            return Ok(results);
        };
        check_sampling_rates(&members, data, sampling_rate)?;

        // Data channels used by any template in the group
        let wanted: Vec<&Trace> = data
            .iter()
            .filter(|trace| {
                members.iter().any(|template| {
                    template
                        .st
                        .as_ref()
                        .is_some_and(|st| st.traces().iter().any(|t| t.id() == trace.id()))
                })
            })
            .collect();

        let (Some(data_start), Some(data_end)) = (
            wanted.iter().map(|trace| trace.stats.starttime).min(),
            wanted.iter().map(|trace| trace.endtime()).max(),
        ) else {
            warn!("No data for any channel of this template group");
            return Ok(results);
        };

        let overlap = self.config.overlap.required_overlap(&members);
        let process_length = members[0].process_length;
        let windows = plan_windows(
            data_start,
            data_end,
            sampling_rate,
            process_length,
            overlap,
        )?;
        debug!(
            "Group of {} templates: {} windows at {} Hz with {:.3} s overlap",
            members.len(),
            windows.len(),
            sampling_rate,
            overlap
        );

        for (window_index, span) in windows.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(MatchFilterError::processing_interrupted(format!(
                    "cancelled in window starting {}",
                    span.starttime
                )));
            }

            let channels = self.cut_window(&wanted, span)?;
            let jobs = build_jobs(&members, &channels, sampling_rate);
            debug!(
                "Window {} at sample {} ({} samples): {} correlation jobs",
                window_index + 1,
                span.first_sample,
                span.npts,
                jobs.len()
            );
            if jobs.is_empty() {
                continue;
            }

            let workers = self.config.resolve_workers(jobs.len());
            let correlations = tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(MatchFilterError::processing_interrupted(format!(
                        "cancelled while correlating window starting {}",
                        span.starttime
                    )));
                }
                correlations = self.run_jobs(jobs, workers) => correlations?,
            };

            let mut per_slot: BTreeMap<usize, Vec<ChannelCorrelation>> = BTreeMap::new();
            for correlation in correlations {
                per_slot.entry(correlation.slot).or_default().push(correlation);
            }

            for (slot, channel_correlations) in per_slot {
                let template_index = group[slot];
                let found = self.detections_for(
                    members[slot],
                    &channel_correlations,
                    span,
                    sampling_rate,
                );
                let previous = results.insert((template_index, window_index), found);
                debug_assert!(previous.is_none());
            }
        }

        let total: usize = results.values().map(Vec::len).sum();
        info!(
            "Group of {} templates produced {} window detections",
            members.len(),
            total
        );
        Ok(results)
    }

    /// Cut and gap-fill every wanted channel for one window
    fn cut_window(
        &self,
        wanted: &[&Trace],
        span: &WindowSpan,
    ) -> Result<BTreeMap<TraceId, Arc<WindowChannel>>> {
        let mut channels = BTreeMap::new();
        for trace in wanted {
            let cut = trace.window(span.starttime, span.npts);
            let present = cut.present_fraction();
            if !self.config.ignore_length && present < MIN_DATA_FRACTION {
                return Err(MatchFilterError::InsufficientData {
                    channel: trace.id().to_string(),
                    present: present * 100.0,
                    window_start: span.starttime.to_rfc3339(),
                });
            }

            channels.insert(
                trace.id().clone(),
                Arc::new(WindowChannel {
                    filled: zero_fill(&cut),
                    mask: cut.mask,
                }),
            );
        }
        Ok(channels)
    }

    /// Execute correlation jobs; results come back in job order
    async fn run_jobs(
        &self,
        jobs: Vec<CorrelationJob>,
        workers: usize,
    ) -> Result<Vec<ChannelCorrelation>> {
        match self.config.concurrency {
            Concurrency::Sequential => Ok(jobs
                .into_iter()
                .map(|job| job.run(self.backend.as_ref()))
                .collect()),
            Concurrency::Multithread => {
                let outcomes: Vec<std::result::Result<ChannelCorrelation, task::JoinError>> =
                    stream::iter(jobs)
                        .map(|job| {
                            let backend = Arc::clone(&self.backend);
                            task::spawn_blocking(move || job.run(backend.as_ref()))
                        })
                        .buffered(workers)
                        .collect()
                        .await;

                outcomes
                    .into_iter()
                    .map(|outcome| outcome.map_err(MatchFilterError::from))
                    .collect()
            }
        }
    }

    /// Stack channel correlations, threshold and deduplicate
    fn detections_for(
        &self,
        template: &Template,
        correlations: &[ChannelCorrelation],
        span: &WindowSpan,
        sampling_rate: f64,
    ) -> Vec<Detection> {
        let Some(stacked) = stack(correlations) else {
            return Vec::new();
        };

        let cutoff = compute_cutoff(
            self.config.threshold_type,
            self.config.threshold,
            &stacked.series,
            &stacked.channel_counts,
        );
        let peaks = deduplicate(
            &stacked.series,
            &cutoff,
            self.config.trig_int,
            sampling_rate,
            self.config.full_peaks,
        );

        let name = template.display_name().to_string();
        peaks
            .into_iter()
            .map(|peak| {
                let chans: Vec<TraceId> = correlations
                    .iter()
                    .filter(|channel| {
                        channel
                            .values
                            .get(peak.index + channel.lag)
                            .copied()
                            .flatten()
                            .is_some()
                    })
                    .map(|channel| channel.id.clone())
                    .collect();

                Detection {
                    template_name: name.clone(),
                    detect_time: offset_time(
                        span.starttime,
                        peak.index as f64 / sampling_rate,
                    ),
                    sample_index: peak.index,
                    detect_val: peak.value,
                    threshold: cutoff
                        .at(peak.index)
                        .unwrap_or_else(|| cutoff.representative()),
                    threshold_type: self.config.threshold_type,
                    threshold_input: self.config.threshold,
                    no_chans: stacked.channel_counts[peak.index],
                    chans,
                }
            })
            .collect()
    }
}

/// Sampling rate shared by a group: its declared rate, else its first trace's
fn group_sampling_rate(members: &[&Template]) -> Option<f64> {
    members[0].samp_rate.or_else(|| {
        members
            .iter()
            .filter_map(|template| template.st.as_ref())
            .flat_map(|st| st.traces())
            .map(|trace| trace.stats.sampling_rate)
            .next()
    })
}

/// Every template trace and every matching data channel must share the group rate
fn check_sampling_rates(members: &[&Template], data: &Stream, expected: f64) -> Result<()> {
    for template in members {
        let Some(st) = &template.st else { continue };
        for trace in st.traces() {
            if trace.stats.sampling_rate != expected {
                return Err(MatchFilterError::SamplingRateMismatch {
                    channel: format!("{} in template {}", trace.id(), template.display_name()),
                    expected,
                    found: trace.stats.sampling_rate,
                });
            }
            if let Some(mismatch) = data
                .select(trace.id())
                .find(|candidate| candidate.stats.sampling_rate != expected)
            {
                return Err(MatchFilterError::SamplingRateMismatch {
                    channel: mismatch.id().to_string(),
                    expected,
                    found: mismatch.stats.sampling_rate,
                });
            }
        }
    }
    Ok(())
}

/// Split the data span into windows of `process_length` seconds that overlap
/// by `overlap` seconds. Without a process length the whole span is one window.
fn plan_windows(
    data_start: DateTime<Utc>,
    data_end: DateTime<Utc>,
    sampling_rate: f64,
    process_length: Option<f64>,
    overlap: f64,
) -> Result<Vec<WindowSpan>> {
    let total = (seconds_between(data_start, data_end) * sampling_rate).round() as usize + 1;
    let window_npts = match process_length {
        Some(length) if length > 0.0 => ((length * sampling_rate).round() as usize).clamp(1, total),
        _ => total,
    };
    let overlap_npts = (overlap * sampling_rate).round() as usize;

    if window_npts < total && overlap_npts >= window_npts {
        return Err(MatchFilterError::invalid_parameter(
            "overlap",
            format!(
                "{:.3} s overlap leaves no progress with {} sample windows",
                overlap, window_npts
            ),
        ));
    }
    let step = window_npts.saturating_sub(overlap_npts).max(1);

    let mut windows = Vec::new();
    let mut first_sample = 0usize;
    loop {
        let npts = window_npts.min(total - first_sample);
        windows.push(WindowSpan {
            first_sample,
            npts,
            starttime: offset_time(data_start, first_sample as f64 / sampling_rate),
        });
        if first_sample + npts >= total {
            break;
        }
        first_sample += step;
    }
    Ok(windows)
}

/// One job per template channel with data, in template order then channel order
fn build_jobs(
    members: &[&Template],
    channels: &BTreeMap<TraceId, Arc<WindowChannel>>,
    sampling_rate: f64,
) -> Vec<CorrelationJob> {
    let mut jobs = Vec::new();
    for (slot, template) in members.iter().enumerate() {
        let Some(st) = &template.st else { continue };
        let mut traces = st.traces();
        traces.sort_by(|a, b| {
            a.id()
                .cmp(b.id())
                .then_with(|| a.stats.starttime.cmp(&b.stats.starttime))
        });
        let Some(earliest) = traces.iter().map(|trace| trace.stats.starttime).min() else {
            continue;
        };

        for trace in traces {
            let Some(window) = channels.get(trace.id()) else {
                debug!(
                    "No data for {} of template {}",
                    trace.id(),
                    template.display_name()
                );
                continue;
            };
            let offset = seconds_between(earliest, trace.stats.starttime);
            jobs.push(CorrelationJob {
                slot,
                id: trace.id().clone(),
                lag: (offset * sampling_rate).round() as usize,
                template: Arc::new(zero_fill(trace)),
                window: Arc::clone(window),
            });
        }
    }
    jobs
}

/// Delay-and-stack: `sum[i] = Σ cc_c[i + lag_c]` over channels defined at `i`.
///
/// Channels are summed in the order given, which callers keep fixed so
/// results do not depend on worker scheduling.
fn stack(correlations: &[ChannelCorrelation]) -> Option<StackedSum> {
    let usable: Vec<&ChannelCorrelation> = correlations
        .iter()
        .filter(|channel| channel.values.len() > channel.lag)
        .collect();
    let len = usable
        .iter()
        .map(|channel| channel.values.len() - channel.lag)
        .min()?;

    let mut series = Vec::with_capacity(len);
    let mut channel_counts = Vec::with_capacity(len);
    for i in 0..len {
        let mut sum = 0.0;
        let mut count = 0usize;
        for channel in &usable {
            if let Some(value) = channel.values[i + channel.lag] {
                sum += value;
                count += 1;
            }
        }
        series.push((count > 0).then_some(sum));
        channel_counts.push(count);
    }

    Some(StackedSum {
        series,
        channel_counts,
    })
}

/// Give templates left out of grouping as exact duplicates the detections of
/// the equal template that was correlated.
fn share_with_duplicates(
    templates: &[Template],
    groups: &[Vec<usize>],
    detections: &mut [Vec<Detection>],
) {
    let grouped: HashSet<usize> = groups.iter().flatten().copied().collect();
    for idx in (0..templates.len()).filter(|idx| !grouped.contains(idx)) {
        let source = groups
            .iter()
            .flatten()
            .copied()
            .find(|&grouped_idx| templates[grouped_idx] == templates[idx]);
        if let Some(source) = source {
            debug!(
                "Template {} duplicates template {}, sharing its detections",
                idx, source
            );
            detections[idx] = detections[source].clone();
        }
    }
}
