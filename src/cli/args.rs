//! Command-line argument definitions for the matched-filter tool
//!
//! This module defines the CLI interface using the clap derive API. Detection
//! settings are layered: an optional JSON configuration file first, then any
//! flags given on the command line.

use crate::config::{Concurrency, DetectConfig};
use crate::detection::{Overlap, ThresholdType};
use crate::error::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for the matched-filter tool
///
/// Groups template archives by processing parameters and runs matched-filter
/// detection of template archives against continuous waveform data.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "matched-filter",
    version,
    about = "Matched-filter detection of seismic templates in continuous data",
    long_about = "Groups templates by their processing parameters and correlates them against \
                  continuous waveform data, reporting detections where the stacked network \
                  correlation exceeds a threshold."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Show how the templates in an archive group by processing parameters
    Group(GroupArgs),
    /// Detect the templates of an archive in continuous data
    Detect(DetectArgs),
}

/// Logging flags shared by every subcommand
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct Verbosity {
    /// Logging verbosity level
    #[arg(
        short = 'v',
        long = "verbose",
        action = clap::ArgAction::Count,
        help = "Increase logging verbosity (-v: info, -vv: debug, -vvv: trace)"
    )]
    pub verbose: u8,

    /// Suppress output (quiet mode)
    ///
    /// Only show errors. Overrides verbose settings.
    #[arg(
        short = 'q',
        long = "quiet",
        help = "Suppress output except errors",
        conflicts_with = "verbose"
    )]
    pub quiet: bool,
}

impl Verbosity {
    /// Determine the appropriate log level based on verbosity flags
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
        }
    }

    /// Check if we should show progress bars (not in quiet mode)
    pub fn show_progress(&self) -> bool {
        !self.quiet
    }
}

/// Arguments for the group command
#[derive(Debug, Clone, Parser)]
pub struct GroupArgs {
    /// Template archive (JSON)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    #[command(flatten)]
    pub verbosity: Verbosity,
}

/// Arguments for the detect command
#[derive(Debug, Clone, Parser)]
pub struct DetectArgs {
    /// Template archive (JSON)
    #[arg(value_name = "ARCHIVE")]
    pub archive: PathBuf,

    /// Continuous data as a JSON stream of traces
    ///
    /// Gaps must be left unfilled: either as separate traces per channel or
    /// as masked samples.
    #[arg(value_name = "DATA")]
    pub data: PathBuf,

    /// Detection configuration file (JSON)
    ///
    /// Flags given on the command line override values from this file.
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Threshold value
    #[arg(short = 't', long = "threshold", value_name = "VALUE")]
    pub threshold: Option<f64>,

    /// How the threshold is interpreted (MAD, absolute, av_chan_corr)
    #[arg(long = "threshold-type", value_name = "TYPE")]
    pub threshold_type: Option<ThresholdType>,

    /// Minimum seconds between detections of one template
    #[arg(long = "trig-int", value_name = "SECONDS")]
    pub trig_int: Option<f64>,

    /// Overlap between processing windows (none, calculate or seconds)
    #[arg(long = "overlap", value_name = "OVERLAP")]
    pub overlap: Option<Overlap>,

    /// Consider every local maximum as a candidate peak
    #[arg(long = "full-peaks")]
    pub full_peaks: bool,

    /// Skip the per-channel data length check
    #[arg(long = "ignore-length")]
    pub ignore_length: bool,

    /// Number of correlation workers (0 = auto-detect)
    #[arg(short = 'w', long = "workers", value_name = "COUNT")]
    pub workers: Option<usize>,

    /// Run correlations on the calling task instead of the worker pool
    #[arg(long = "sequential")]
    pub sequential: bool,

    /// Write detections to this JSON file
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub verbosity: Verbosity,
}

impl DetectArgs {
    /// Build the detection configuration: file, then command-line overrides
    pub fn load_config(&self) -> Result<DetectConfig> {
        let mut config = match &self.config_file {
            Some(path) => DetectConfig::from_file(path)?,
            None => DetectConfig::default(),
        };

        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(threshold_type) = self.threshold_type {
            config.threshold_type = threshold_type;
        }
        if let Some(trig_int) = self.trig_int {
            config.trig_int = trig_int;
        }
        if let Some(overlap) = self.overlap {
            config.overlap = overlap;
        }
        if self.full_peaks {
            config.full_peaks = true;
        }
        if self.ignore_length {
            config.ignore_length = true;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.sequential {
            config.concurrency = Concurrency::Sequential;
        }

        let config = config.resolve_deprecated();
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(arguments: &[&str]) -> Args {
        Args::try_parse_from(arguments).unwrap()
    }

    fn detect_args(arguments: &[&str]) -> DetectArgs {
        match parse(arguments).command {
            Some(Commands::Detect(args)) => args,
            other => panic!("expected detect command, got {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand() {
        assert!(parse(&["matched-filter"]).command.is_none());
    }

    #[test]
    fn test_group_command() {
        match parse(&["matched-filter", "group", "tribe.json", "-vv"]).command {
            Some(Commands::Group(args)) => {
                assert_eq!(args.archive, PathBuf::from("tribe.json"));
                assert_eq!(args.verbosity.get_log_level(), "debug");
            }
            other => panic!("expected group command, got {:?}", other),
        }
    }

    #[test]
    fn test_log_levels() {
        let mut verbosity = Verbosity::default();
        assert_eq!(verbosity.get_log_level(), "warn");
        assert!(verbosity.show_progress());

        verbosity.verbose = 3;
        assert_eq!(verbosity.get_log_level(), "trace");

        verbosity.quiet = true;
        assert_eq!(verbosity.get_log_level(), "error");
        assert!(!verbosity.show_progress());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(
            Args::try_parse_from(["matched-filter", "group", "tribe.json", "-q", "-v"]).is_err()
        );
    }

    #[test]
    fn test_detect_flags_override_defaults() {
        let args = detect_args(&[
            "matched-filter",
            "detect",
            "tribe.json",
            "day.json",
            "--threshold",
            "0.7",
            "--threshold-type",
            "av_chan_corr",
            "--overlap",
            "none",
            "--trig-int",
            "2",
            "--sequential",
        ]);

        let config = args.load_config().unwrap();
        assert_eq!(config.threshold, 0.7);
        assert_eq!(config.threshold_type, ThresholdType::AvChanCorr);
        assert_eq!(config.overlap, Overlap::None);
        assert_eq!(config.trig_int, 2.0);
        assert_eq!(config.concurrency, Concurrency::Sequential);
        assert!(!config.full_peaks);
    }

    #[test]
    fn test_config_file_layered_under_flags() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("detect.json");
        std::fs::write(
            &path,
            r#"{"threshold": 9.0, "trig_int": 3.0, "overlap": "calculate", "plotvar": true}"#,
        )
        .unwrap();

        let path_arg = path.to_string_lossy().to_string();
        let args = detect_args(&[
            "matched-filter",
            "detect",
            "tribe.json",
            "day.json",
            "--config",
            &path_arg,
            "--trig-int",
            "1.5",
        ]);

        let config = args.load_config().unwrap();
        assert_eq!(config.threshold, 9.0);
        assert_eq!(config.trig_int, 1.5);
        assert_eq!(config.overlap, Overlap::Calculate);
        assert!(config.plot);
    }

    #[test]
    fn test_invalid_threshold_type_rejected() {
        assert!(
            Args::try_parse_from([
                "matched-filter",
                "detect",
                "tribe.json",
                "day.json",
                "--threshold-type",
                "relative",
            ])
            .is_err()
        );
    }
}
