// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Netpipe CLI
//!
//! Command-line driver for the netpipe ping-pong benchmark and the RAPL
//! energy sampler.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod args;
mod commands;
mod cpu_affinity;

use args::BenchArgs;

/// Netpipe - Message-size sweep ping-pong benchmark
#[derive(Parser)]
#[command(name = "netpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one role; transmitter when --host is given, receiver otherwise
    Run {
        #[command(flatten)]
        bench: BenchArgs,
    },

    /// Run both roles in this process over 127.0.0.1
    Loopback {
        #[command(flatten)]
        bench: BenchArgs,

        /// Pin the receiver thread to these CPUs
        #[arg(long = "peer-cpu")]
        peer_cpu: Option<String>,
    },

    /// Print per-package energy use from the RAPL counters
    Energy {
        /// Sampling interval in milliseconds
        #[arg(short = 't', long = "interval-ms", default_value_t = 1000)]
        interval_ms: u64,

        /// Number of samples to take (0 samples until interrupted)
        #[arg(short = 'N', long, default_value_t = 10)]
        samples: u32,
    },

    /// Validate a settings file
    Validate {
        /// Path to the YAML settings file
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Diagnostics go to stderr; stdout carries the result stream.
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { bench } => commands::run::execute(&bench),
        Commands::Loopback { bench, peer_cpu } => commands::loopback::execute(&bench, peer_cpu),
        Commands::Energy {
            interval_ms,
            samples,
        } => commands::energy::execute(interval_ms, samples),
        Commands::Validate { file } => commands::validate::execute(&file),
    }
}
