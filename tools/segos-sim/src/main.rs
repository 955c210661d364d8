//! segos-sim - host simulator for the segos process/IPC core
//!
//! Commands:
//! - `segos-sim run` - Boot init, run producers and a consumer over one mailbox
//! - `segos-sim status` - Boot init and print the process table
//! - `segos-sim config` - Print the effective configuration as TOML

mod config;
mod scenario;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use segos_kernel::hosted::Hosted;
use segos_kernel::{EntryPoint, Kernel, Platform};

use crate::config::SimConfig;

#[derive(Parser)]
#[command(name = "segos-sim")]
#[command(version)]
#[command(about = "Run the segos process/IPC core on host threads", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the producer/consumer scenario
    Run {
        /// Configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Number of producers (overrides the file)
        #[arg(short, long)]
        producers: Option<usize>,

        /// Messages per producer (overrides the file)
        #[arg(short, long)]
        messages: Option<usize>,
    },

    /// Boot init and print the process table
    Status {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            producers,
            messages,
        } => {
            let mut config = SimConfig::load(config.as_deref())?;
            if let Some(producers) = producers {
                config.scenario.producers = producers;
            }
            if let Some(messages) = messages {
                config.scenario.messages = messages;
            }
            run(&config)?;
        }

        Commands::Status { config } => {
            status(&SimConfig::load(config.as_deref())?)?;
        }

        Commands::Config { config } => {
            print!("{}", SimConfig::load(config.as_deref())?.to_toml()?);
        }
    }

    Ok(())
}

fn run(config: &SimConfig) -> anyhow::Result<()> {
    log::info!("═══════════════════════════════════════════════════════════");
    log::info!(
        "  segos-sim: {} producer(s) x {} message(s) over '{}'",
        config.scenario.producers,
        config.scenario.messages,
        config.scenario.mailbox
    );
    log::info!(
        "  {} PCBs, {} mailboxes of {} messages",
        config.kernel.num_pcbs,
        config.kernel.max_mailboxes,
        config.kernel.mailbox_capacity
    );
    log::info!("═══════════════════════════════════════════════════════════");

    let outcome = scenario::run(config)?;

    if let Some(snapshot) = &outcome.snapshot {
        println!("{snapshot}");
    }

    println!("{}", "Summary".bold());
    println!("  Tasks started:  {}", outcome.tasks);
    println!("  Messages:       {}/{}", outcome.received, outcome.expected);
    println!("  Out of order:   {}", outcome.out_of_order);
    println!("  Elapsed:        {:.2?}", outcome.elapsed);

    for violation in &outcome.violations {
        println!("  {} {}", "✗".red(), violation);
    }

    if outcome.is_clean() {
        println!("{} All messages delivered in order", "✓".green());
        Ok(())
    } else {
        anyhow::bail!("scenario finished with errors")
    }
}

fn status(config: &SimConfig) -> anyhow::Result<()> {
    let platform = Hosted::new();
    platform.loader().register_entry("init", EntryPoint(0x1000));
    let kernel = Kernel::new(config.kernel.clone(), platform).context("Failed to build kernel")?;

    let pid = kernel.boot("init").context("Failed to boot init")?;
    println!("{} init booted as pid {}", "✓".green(), pid.to_string().bold());
    println!("{}", kernel.status_report());
    println!("  {} of {} slots live", kernel.live_count(), kernel.max_pcbs());
    Ok(())
}
