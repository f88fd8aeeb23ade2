//! rollcall — interactive entry point.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use rollcall::app::run;
use rollcall::config::{read_roster_file, AppConfig, PerceptionMode};

#[derive(Parser, Debug)]
#[command(name = "rollcall", version, about = "Gesture-driven random student selector")]
struct Cli {
    /// TOML config file (default: <config dir>/rollcall/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Roster file, one name per line
    #[arg(long, value_name = "FILE")]
    roster: Option<PathBuf>,

    /// Where hand landmarks come from
    #[arg(long, value_enum)]
    perception: Option<PerceptionMode>,

    /// Landmark provider executable (implies --perception process)
    #[arg(long, value_name = "CMD")]
    tracker_cmd: Option<String>,

    /// Extra arguments for the landmark provider
    #[arg(long = "tracker-arg", value_name = "ARG")]
    tracker_args: Vec<String>,

    /// Disable MIDI sound cues
    #[arg(long)]
    no_cues: bool,

    /// Disable the trivia card
    #[arg(long)]
    no_trivia: bool,

    /// Trivia subject
    #[arg(long)]
    subject: Option<String>,

    /// Ignore any config file and start with the defaults
    #[arg(long)]
    quick: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║        Roll Call — Gesture-Driven Student Selector           ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let cfg = configure(cli)?;

    match cfg.perception.mode {
        PerceptionMode::Keyboard => println!("  Mode: Keyboard simulation  (1-4 poses, 0 no hand)"),
        PerceptionMode::Process  => println!("  Mode: Landmark provider `{}`", cfg.perception.command),
        PerceptionMode::Leap     => println!("  Mode: LeapMotion hardware"),
    }
    println!("  Space = spin/stop   R = reset   Enter = answer   Q = quit");
    println!();
    println!("  Opening visualizer window…");
    println!();

    run(cfg)
}

/// Config file (unless `--quick`) patched by the command-line flags.
fn configure(cli: Cli) -> Result<AppConfig> {
    let mut cfg = if cli.quick {
        info!("[main] quick start: built-in defaults");
        AppConfig::default()
    } else {
        AppConfig::load(cli.config.as_deref())?
    };

    if let Some(path) = &cli.roster {
        cfg.roster.names = read_roster_file(path)?;
    }
    if let Some(cmd) = cli.tracker_cmd {
        cfg.perception.mode    = PerceptionMode::Process;
        cfg.perception.command = cmd;
    }
    if !cli.tracker_args.is_empty() {
        cfg.perception.args = cli.tracker_args;
    }
    if let Some(mode) = cli.perception {
        cfg.perception.mode = mode;
    }
    if cli.no_cues {
        cfg.cues.enabled = false;
    }
    if cli.no_trivia {
        cfg.trivia.enabled = false;
    }
    if let Some(subject) = cli.subject {
        cfg.trivia.subject = subject;
    }

    cfg.validate()?;
    Ok(cfg)
}
