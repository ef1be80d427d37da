//! Command implementations for the matched-filter CLI
//!
//! This module contains the command execution logic, logging setup,
//! progress reporting and the printed summaries.

use crate::cli::args::{Args, Commands, DetectArgs, GroupArgs, Verbosity};
use crate::constants::LOG_TARGET;
use crate::detection::{Detection, MatchFilter, NormalizedCorrelator, Party};
use crate::models::Stream;
use crate::template::Template;
use crate::tribe::Tribe;
use anyhow::{Context, Result};
use colored::*;
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Main command runner
pub async fn run(args: Args, cancellation_token: CancellationToken) -> Result<()> {
    match args.command {
        Some(Commands::Group(group_args)) => run_group(&group_args),
        Some(Commands::Detect(detect_args)) => run_detect(&detect_args, cancellation_token).await,
        None => Ok(()),
    }
}

/// Set up structured logging to stderr
pub fn setup_logging(verbosity: &Verbosity) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = verbosity.get_log_level();

    // Create filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={}", LOG_TARGET, log_level)));

    if verbosity.quiet {
        // Minimal logging for quiet mode
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()?;
    } else {
        // Standard logging with uptime timestamps
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Print the grouping of an archive
fn run_group(args: &GroupArgs) -> Result<()> {
    setup_logging(&args.verbosity)?;

    let tribe = Tribe::read(&args.archive)
        .with_context(|| format!("Failed to read template archive {}", args.archive.display()))?;
    let groups = tribe.group();
    info!(
        "Archive {} holds {} templates in {} groups",
        args.archive.display(),
        tribe.len(),
        groups.len()
    );

    println!(
        "{} {} templates in {} processing groups",
        "Archive:".bright_green().bold(),
        tribe.len().to_string().bright_yellow(),
        groups.len().to_string().bright_yellow()
    );
    for (i, group) in groups.iter().enumerate() {
        let names: Vec<&str> = group.iter().map(Template::display_name).collect();
        println!(
            "  {}. {} {}",
            (i + 1).to_string().bright_yellow().bold(),
            processing_label(&group[0]).bright_cyan(),
            format!("({})", names.join(", ")).bright_black()
        );
    }
    Ok(())
}

/// Detect every template of an archive in continuous data
async fn run_detect(args: &DetectArgs, cancellation_token: CancellationToken) -> Result<()> {
    let start_time = Instant::now();
    setup_logging(&args.verbosity)?;

    let config = args.load_config().context("Invalid detection configuration")?;
    debug!("Detection configuration: {:?}", config);

    let tribe = Tribe::read(&args.archive)
        .with_context(|| format!("Failed to read template archive {}", args.archive.display()))?;
    let stream = load_stream(&args.data)?;
    info!(
        "Loaded {} templates and {} traces",
        tribe.len(),
        stream.len()
    );

    let mut engine = MatchFilter::new(config, Arc::new(NormalizedCorrelator));
    let progress_bar = if args.verbosity.show_progress() {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .context("Invalid progress bar template")?
                .progress_chars("#>-"),
        );
        engine = engine.with_progress(pb.clone());
        Some(pb)
    } else {
        None
    };

    let party = engine
        .detect(&tribe.templates, &stream, &cancellation_token)
        .await
        .context("Detection failed")?;

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    if let Some(output) = &args.output {
        write_detections(&party, output)?;
        info!("Wrote detections to {}", output.display());
    }

    if !args.verbosity.quiet {
        print_summary(&party, start_time);
    }
    Ok(())
}

/// Read continuous data from a JSON stream of traces
fn load_stream(path: &Path) -> Result<Stream> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open continuous data {}", path.display()))?;
    let stream: Stream = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse continuous data {}", path.display()))?;
    Ok(stream)
}

/// Write every detection, family by family, as a JSON array
fn write_detections(party: &Party, path: &Path) -> Result<()> {
    let detections: Vec<&Detection> = party
        .families
        .iter()
        .flat_map(|family| family.detections.iter())
        .collect();

    let file = File::create(path)
        .with_context(|| format!("Failed to create detection output {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &detections)
        .context("Failed to write detections")?;
    Ok(())
}

fn processing_label(template: &Template) -> String {
    let value = |value: Option<f64>| match value {
        Some(value) => value.to_string(),
        None => "-".to_string(),
    };
    format!(
        "{}-{} Hz, {} Hz sampling, order {}, {} s",
        value(template.lowcut),
        value(template.highcut),
        value(template.samp_rate),
        template
            .filt_order
            .map_or_else(|| "-".to_string(), |order| order.to_string()),
        value(template.process_length)
    )
}

fn print_summary(party: &Party, start_time: Instant) {
    println!();
    println!("{}", "Detection Summary".bright_green().bold());
    println!("{}", "=================".bright_green());

    for family in &party.families {
        let count = family.len().to_string();
        let count = if family.is_empty() {
            count.bright_black()
        } else {
            count.bright_yellow().bold()
        };
        println!(
            "  {:<24} {} detections",
            family.template.display_name().bright_cyan(),
            count
        );
        for detection in &family.detections {
            println!(
                "      {}  {:>8.3}  ({} channels)",
                detection.detect_time.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                detection.detect_val,
                detection.no_chans
            );
        }
    }

    println!();
    println!(
        "{} {} detections from {} templates in {}",
        "Total:".bright_green().bold(),
        party.detection_count().to_string().bright_yellow().bold(),
        party.len(),
        HumanDuration(start_time.elapsed())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::tests::create_test_template;
    use tempfile::TempDir;

    #[test]
    fn test_processing_label() {
        let template = create_test_template("a", 2.0, 8.0);
        assert_eq!(
            processing_label(&template),
            "2-8 Hz, 100 Hz sampling, order 4, 3600 s"
        );
        assert_eq!(
            processing_label(&Template::default()),
            "--- Hz, - Hz sampling, order -, - s"
        );
    }

    #[test]
    fn test_write_detections_of_empty_party() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("detections.json");

        write_detections(&Party::default(), &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written.trim(), "[]");
    }

    #[test]
    fn test_load_stream_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_stream(&temp_dir.path().join("missing.json")).is_err());
    }
}
