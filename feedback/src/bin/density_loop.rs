//! Closed-loop density control run
//!
//! Drives the generator, the analyzers and the controller for a fixed number of
//! frames and prints a progress line every few frames.
//!
//! # Usage
//!
//! ```bash
//! # Default configuration, 1000 frames
//! cargo run --release --bin density_loop
//!
//! # Custom configuration with overrides
//! cargo run --release --bin density_loop -- --config run.json --frames 5000 --seed 7
//!
//! # Step the setpoint to 20 at frame 500 and dump the per-frame history
//! cargo run --release --bin density_loop -- --step 500:20 --history history.json
//!
//! # Print the effective configuration as JSON
//! cargo run --release --bin density_loop -- --dump-config
//! ```

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Env;
use feedback::{HistoryRow, SimulationConfig, TickReport};
use log::info;
use simulator::BlinkingKinetics;

#[derive(Parser, Debug)]
#[command(author, version, about = "Closed-loop blinking emitter density control", long_about = None)]
struct Args {
    /// JSON simulation config; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to simulate (overrides the config)
    #[arg(short, long)]
    frames: Option<usize>,

    /// Master RNG seed (overrides the config)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Initial setpoint (overrides the config)
    #[arg(long)]
    setpoint: Option<f64>,

    /// Setpoint change as FRAME:VALUE, applied before that frame is rendered
    #[arg(long = "step", value_parser = parse_setpoint_step)]
    steps: Vec<(usize, f64)>,

    /// Print a progress line every N frames (0 disables)
    #[arg(long, default_value_t = 100)]
    report_every: usize,

    /// Write the per-frame history as JSON to this path
    #[arg(long)]
    history: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    dump_config: bool,

    /// Debug-level logging unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn parse_setpoint_step(s: &str) -> Result<(usize, f64), String> {
    let (frame, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FRAME:VALUE, got {s:?}"))?;
    let frame = frame
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid frame {frame:?}: {e}"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid setpoint {value:?}: {e}"))?;
    if frame == 0 {
        return Err("frames are numbered from 1".to_string());
    }
    Ok((frame, value))
}

fn print_report(report: &TickReport) {
    println!(
        "{:>8} {:>8.0} {:>10.2} {:>10.2} {:>10.4}",
        report.frame, report.true_signal, report.measured, report.setpoint, report.output
    );
}

/// End-of-run statistics over the per-frame history.
#[derive(Debug, Clone, PartialEq)]
struct RunSummary {
    frames: usize,
    mean_true: f64,
    mean_measured: f64,
    mean_abs_error: f64,
    final_rate: f64,
    /// Steady-state ON fraction at `final_rate`, ignoring bleaching
    duty_cycle: f64,
    expected_on: f64,
}

impl RunSummary {
    fn from_rows(
        rows: &[HistoryRow],
        kinetics: &BlinkingKinetics,
        live_emitters: usize,
    ) -> Option<Self> {
        let last = rows.last()?;
        let n = rows.len() as f64;
        let duty_cycle = kinetics.duty_cycle(last.output);

        Some(Self {
            frames: rows.len(),
            mean_true: rows.iter().map(|r| r.true_signal).sum::<f64>() / n,
            mean_measured: rows.iter().map(|r| r.error_signal).sum::<f64>() / n,
            mean_abs_error: rows
                .iter()
                .map(|r| (r.setpoint - r.error_signal).abs())
                .sum::<f64>()
                / n,
            final_rate: last.output,
            duty_cycle,
            expected_on: duty_cycle * live_emitters as f64,
        })
    }
}

fn print_summary(summary: Option<&RunSummary>, live_emitters: usize, total_emitters: usize) {
    let Some(summary) = summary else {
        println!("No frames simulated");
        return;
    };

    println!();
    println!("Summary");
    println!("=======");
    println!("Frames:                 {}", summary.frames);
    println!("Mean active emitters:   {:.2}", summary.mean_true);
    println!("Mean measured signal:   {:.2}", summary.mean_measured);
    println!("Mean |setpoint - meas|: {:.2}", summary.mean_abs_error);
    println!("Final activation rate:  {:.4}", summary.final_rate);
    println!("Expected duty cycle:    {:.4}", summary.duty_cycle);
    println!("Expected ON emitters:   {:.2}", summary.expected_on);
    println!("Unbleached emitters:    {live_emitters}/{total_emitters}");
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(frames) = args.frames {
        config.frames = frames;
    }
    if let Some(seed) = args.seed {
        config.generator.seed = seed;
    }
    if let Some(setpoint) = args.setpoint {
        config.controller.setpoint = setpoint;
    }

    if args.dump_config {
        println!("{}", config.to_json_pretty()?);
        return Ok(());
    }

    let mut steps = args.steps.clone();
    steps.sort_by_key(|&(frame, _)| frame);
    let mut steps = steps.into_iter().peekable();

    let mut tester = config.build()?;
    info!(
        "Running {} frames with analyzers {:?}",
        config.frames,
        tester.analyzer_names()
    );

    if args.report_every > 0 {
        println!(
            "{:>8} {:>8} {:>10} {:>10} {:>10}",
            "frame", "true", "measured", "setpoint", "output"
        );
    }

    for frame in 1..=config.frames {
        while let Some((_, value)) = steps.next_if(|&(at, _)| at == frame) {
            info!("Frame {frame}: setpoint -> {value}");
            tester.set_setpoint(value)?;
        }

        let report = tester.step()?;
        if args.report_every > 0 && report.frame % args.report_every == 0 {
            print_report(&report);
        }
    }

    let rows = tester.history_rows();
    let generator = tester.generator();
    let live_emitters = generator.live_emitter_count();
    let summary = RunSummary::from_rows(&rows, &config.fluorophores.kinetics, live_emitters);
    print_summary(summary.as_ref(), live_emitters, generator.emitters().len());

    if let Some(path) = &args.history {
        fs::write(path, serde_json::to_string_pretty(&rows)?)?;
        info!("Wrote {} history rows to {}", rows.len(), path.display());
    }

    Ok(())
}
