//! Command-line driver for WALB-sim.
//!
//! Layers a TOML config file under CLI flags, runs N simulation loops, and
//! reports the first failure (if any) with a non-zero exit code.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use walb_kernel::Mode;
use walb_sim::workload::WorkloadConfig;
use walb_sim::{FileConfig, SimConfig, Simulator};

#[derive(Parser)]
#[command(name = "walb-sim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a workload and drive it to completion for `num_loops`
    /// independent seeds, reporting pass/fail.
    Run {
        /// TOML file supplying defaults for any flag below.
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long)]
        disk_size: Option<u64>,
        #[arg(long)]
        min_req_size: Option<u64>,
        #[arg(long)]
        max_req_size: Option<u64>,
        #[arg(long)]
        min_plug_size: Option<u32>,
        #[arg(long)]
        max_plug_size: Option<u32>,
        #[arg(long)]
        write_pct: Option<u8>,
        #[arg(long)]
        num_plugs: Option<u32>,
        #[arg(long)]
        n_plug: Option<u32>,

        /// How many independent simulation loops to run.
        #[arg(long, default_value = "1")]
        num_loops: u32,

        #[arg(long, value_enum, default_value = "fast")]
        mode: Option<ModeArg>,

        #[arg(long)]
        shuffle: bool,

        #[arg(long)]
        crash_pct: Option<u8>,

        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ModeArg {
    Fast,
    Slow,
}

impl From<ModeArg> for Mode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Fast => Mode::Fast,
            ModeArg::Slow => Mode::Slow,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            disk_size,
            min_req_size,
            max_req_size,
            min_plug_size,
            max_plug_size,
            write_pct,
            num_plugs,
            n_plug,
            num_loops,
            mode,
            shuffle,
            crash_pct,
            seed,
        } => {
            let file = match config {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("reading config file {}", path.display()))?;
                    toml::from_str::<FileConfig>(&text).with_context(|| format!("parsing config file {}", path.display()))?
                }
                None => FileConfig::default(),
            };

            let base = SimConfig {
                workload: WorkloadConfig {
                    disk_size: disk_size.or(file.disk_size).unwrap_or(4096),
                    min_req_size: min_req_size.or(file.min_req_size).unwrap_or(1),
                    max_req_size: max_req_size.or(file.max_req_size).unwrap_or(64),
                    min_plug_size: min_plug_size.or(file.min_plug_size).unwrap_or(1),
                    max_plug_size: max_plug_size.or(file.max_plug_size).unwrap_or(8),
                    write_pct: write_pct.or(file.write_pct).unwrap_or(50),
                },
                num_plugs: num_plugs.or(file.num_plugs).unwrap_or(16),
                n_plug: n_plug.or(file.n_plug).unwrap_or(4),
                mode: mode.map_or_else(
                    || match file.mode.as_deref() {
                        Some("slow") => Mode::Slow,
                        _ => Mode::Fast,
                    },
                    Mode::from,
                ),
                shuffle: shuffle || file.shuffle.unwrap_or(false),
                crash_pct_per_tick: crash_pct.or(file.crash_pct_per_tick).unwrap_or(0),
                seed: seed.or(file.seed).unwrap_or(0),
            };

            run_loops(base, num_loops)
        }
    }
}

fn run_loops(base: SimConfig, num_loops: u32) -> Result<()> {
    match Simulator::run_loops(&base, num_loops) {
        Ok(reports) => {
            for (loop_idx, report) in reports.iter().enumerate() {
                println!("loop {loop_idx}: PASS ({} ticks)", report.history.len());
            }
            println!("all {num_loops} loop(s) passed, seed={}", base.seed);
            Ok(())
        }
        Err(err) => {
            tracing::error!(seed = base.seed, error = %err, "simulation failed");
            eprintln!("FAIL (seed={}): {err}", base.seed);
            anyhow::bail!(err);
        }
    }
}
