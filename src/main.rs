// wlansim: packet-level timing of a small wireless LAN with bulk and on/off
// IoT traffic, plus the batch-means tooling to make sense of the traces.

// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use wlansim::prelude::*;
use wlansim::simulation::{self, ReplicateReport};
use wlansim::trace::{analyzer, logger};

use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::Args)]
struct ScenarioArgs {
    /// JSON scenario; the built-in wifi/LAN layout when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Simulated seconds
    #[arg(short, long)]
    duration: Option<f64>,
    #[arg(short, long)]
    seed: Option<u64>,
    /// Draw on/off windows from an exponential distribution
    #[arg(long)]
    random_windows: bool,
}

impl ScenarioArgs {
    fn load(&self) -> Result<ScenarioConfig> {
        let mut config = match &self.config {
            Some(path) => ScenarioConfig::load(path)?,
            None => ScenarioConfig::wifi_lan(),
        };
        if let Some(secs) = self.duration {
            config = config.with_duration(SimTime::from_secs_f64(secs));
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if self.random_windows {
            config = config.with_exponential_windows();
        }
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[command(flatten)]
        scenario: ScenarioArgs,
        #[arg(short, long, default_value = "results")]
        out: PathBuf,
    },

    Replicate {
        #[command(flatten)]
        scenario: ScenarioArgs,
        #[arg(short = 'n', long, default_value_t = 10)]
        runs: u32,
        #[arg(short, long, default_value = "results")]
        out: PathBuf,
    },

    Analyze {
        /// Trace CSV written by `run`
        input: PathBuf,
        #[arg(short, long, default_value_t = 300)]
        batch: usize,
    },

    /// Print the built-in scenario as JSON
    Show,
}

fn main() -> Result<()> {
    let program_start = Instant::now();

    let cli = Cli::parse();

    // RUST_LOG still wins over --verbose when set
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { scenario, out } => {
            run_single(scenario.load()?, &out, cli.verbose)?;
        }

        Commands::Replicate { scenario, runs, out } => {
            replicate(scenario.load()?, runs, &out)?;
        }

        Commands::Analyze { input, batch } => {
            analyze_trace(&input, batch)?;
        }

        Commands::Show => {
            println!("{}", serde_json::to_string_pretty(&ScenarioConfig::wifi_lan())?);
        }
    }

    info!("Total runtime: {:.2}s", program_start.elapsed().as_secs_f64());
    Ok(())
}

fn run_single(config: ScenarioConfig, out: &Path, verbose: bool) -> Result<()> {
    info!("wlansim: Single Run");

    let mut scenario = Scenario::build(config)?;

    if verbose {
        let sinks: Vec<(u32, String)> = scenario
            .sinks()
            .iter()
            .map(|s| (s.id.value(), s.label.clone()))
            .collect();
        for (id, label) in sinks {
            scenario
                .trace_mut()
                .subscribe(EntityId::Sink(id), Metric::RxBytes, move |s| {
                    debug!("{} rx {} -> {} at {}", label, s.old_value, s.new_value, s.timestamp)
                });
        }
    }

    // one progress tick per simulated second
    let duration = scenario.config().duration;
    let steps = duration.as_secs_f64().ceil() as u64;
    let pb = ProgressBar::new(steps);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.orange/yellow} {pos}/{len}s {msg}")?
            .progress_chars("█▓░"),
    );
    for step in 1..=steps {
        let stats = scenario.advance_to(SimTime::from_secs(step))?;
        pb.inc(1);
        pb.set_message(format!("events: {} | pending: {}", stats.dispatched, stats.pending));
    }
    pb.finish_with_message("Simulation complete");

    let summary = scenario.run()?;
    summary.log();
    save_results(&scenario, &summary, out)
}

fn save_results(scenario: &Scenario, summary: &RunSummary, out: &Path) -> Result<()> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let name = &summary.name;
    std::fs::create_dir_all(out)?;

    let samples = scenario.trace().export();
    let csv_path = out.join(format!("{}_{}.csv", name, timestamp));
    let mut trace_log = logger::TraceLogger::new(&csv_path)?;
    trace_log.log_batch(samples)?;
    info!("Trace saved to: {}", csv_path.display());

    let json_path = out.join(format!("{}_{}_summary.json", name, timestamp));
    std::fs::write(&json_path, serde_json::to_string_pretty(summary)?)?;
    info!("Summary saved to: {}", json_path.display());

    // one two-column file per sink, ready for gnuplot
    for sink in scenario.sinks().iter() {
        let series = scenario
            .trace()
            .series(EntityId::Sink(sink.id.value()), &Metric::RxBytes);
        if series.is_empty() {
            continue;
        }
        let dat_path = out.join(format!("{}_{}_{}-rx.dat", name, timestamp, sink.label));
        logger::write_series(&dat_path, &series)?;
        info!("Series saved to: {}", dat_path.display());
    }
    Ok(())
}

fn replicate(config: ScenarioConfig, runs: u32, out: &Path) -> Result<()> {
    info!("wlansim: {} replicates of {}", runs, config.name);
    let name = config.name.clone();

    let summaries = simulation::run_replicates(&config, runs)?;
    let report = simulation::summarize_replicates(&summaries);
    replicate_table(&report);

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    std::fs::create_dir_all(out)?;
    let json_path = out.join(format!("{}_{}_replicates.json", name, timestamp));
    std::fs::write(&json_path, serde_json::to_string_pretty(&report)?)?;
    info!("Replicate report saved to: {}", json_path.display());
    Ok(())
}

fn analyze_trace(input: &Path, batch: usize) -> Result<()> {
    info!("Analyzing trace: {}", input.display());
    let samples = logger::read_samples(input)?;
    if samples.is_empty() {
        info!("No samples in {}", input.display());
        return Ok(());
    }

    let report = analyzer::analyze(&samples, batch);
    println!();
    println!("{:<10} {:<10} {:>8} {:>14} {:>10} {:>12}  95% CI (batch {})",
        "entity", "metric", "samples", "bytes", "Mbit/s", "interval s", report.batch_size);
    for e in &report.entities {
        let ci = match e.batch_ci {
            Some(ci) => format!("{:.2} ± {:.2}", ci.mean, ci.half_width()),
            None => "-".to_string(),
        };
        println!(
            "{:<10} {:<10} {:>8} {:>14.0} {:>10} {:>12}  {}",
            e.entity.to_string(),
            e.metric.to_string(),
            e.samples,
            e.total_bytes,
            fmt_opt(e.goodput_mbps, 3),
            fmt_opt(e.mean_interval_s, 6),
            ci
        );
    }
    println!();
    Ok(())
}

fn replicate_table(report: &[ReplicateReport]) {
    println!();
    println!("{:<12} {:>6} {:>16} {:>16}", "sink", "runs", "mean bytes", "95% half width");
    for r in report {
        match r.bytes {
            Some(ci) => println!("{:<12} {:>6} {:>16.1} {:>16.1}", r.label, r.runs, ci.mean, ci.half_width()),
            None => println!("{:<12} {:>6} {:>16} {:>16}", r.label, r.runs, "-", "-"),
        }
    }
    println!();
}

fn fmt_opt(value: Option<f64>, precision: usize) -> String {
    value
        .map(|v| format!("{:.*}", precision, v))
        .unwrap_or_else(|| "-".to_string())
}
