//! pf-sim: headless Judge Dredd simulator
//!
//! Usage:
//!   pf-sim                          - Play the built-in three ball demo
//!   pf-sim --supergame              - Play the supergame demo through Judge Fire
//!   pf-sim --script game.json       - Replay a switch script
//!   pf-sim --config machine.json    - Use a machine description from disk
//!   pf-sim --dump-config out.json   - Write the built-in machine description
//!
//! Set `RUST_LOG=debug` to follow mode changes and hardware commands.

mod script;
mod sim;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pf_core::MachineConfig;

use script::Script;
use sim::Simulator;

/// Run time after the last script step
const TAIL_MS: u64 = 5_000;

#[derive(Parser)]
#[command(name = "pf-sim", about = "Replay switch scripts against the Judge Dredd rules")]
struct Cli {
    /// Machine description (JSON); defaults to the built-in playfield
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Switch script (JSON); defaults to a built-in demo
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Use the supergame demo when no script is given
    #[arg(long)]
    supergame: bool,

    /// Simulated run time in milliseconds
    #[arg(short, long)]
    duration_ms: Option<u64>,

    /// Print every Nth non-blank DMD frame (0 prints none)
    #[arg(short, long, default_value_t = 0)]
    frames: u64,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Write the built-in machine description and exit
    #[arg(long, value_name = "PATH")]
    dump_config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Some(path) = &cli.dump_config {
        pf_rules::machine_config()
            .save_to(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => MachineConfig::load_from(path)
            .with_context(|| format!("Failed to load machine description {}", path.display()))?,
        None => pf_rules::machine_config(),
    };
    config.validate().context("Invalid machine description")?;

    let script = match &cli.script {
        Some(path) => Script::load(path)?,
        None => Script::demo(cli.supergame),
    };
    let unknown = script.unknown_switches(&config);
    if !unknown.is_empty() {
        log::warn!("Script names unknown switches: {}", unknown.join(", "));
    }

    let duration_ms = cli.duration_ms.unwrap_or(script.end_ms() + TAIL_MS);
    if duration_ms == 0 {
        bail!("Nothing to simulate");
    }

    let mut simulator = Simulator::new(config).context("Failed to build the machine")?;
    let mut shown = 0u64;
    let report = simulator.run(&script, duration_ms, |frame_no, frame| {
        if cli.frames == 0 || frame.is_blank() {
            return;
        }
        shown += 1;
        if shown % cli.frames == 0 {
            println!("── frame {} ──", frame_no);
            println!("{}", frame.to_ascii());
        }
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}
