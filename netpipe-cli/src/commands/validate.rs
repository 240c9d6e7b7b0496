// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `netpipe validate` command - Validate a settings file.

use std::path::Path;

use anyhow::Context;
use netpipe_core::{ConfigLoader, RepeatPolicy};

pub fn execute(file: &Path) -> anyhow::Result<()> {
    tracing::info!(file = %file.display(), "Validating configuration");

    let config = ConfigLoader::load_file(file)
        .with_context(|| format!("✗ Configuration validation failed: {}", file.display()))?;

    println!("✓ Configuration is valid");
    println!();
    println!("Benchmark Settings:");
    match &config.host {
        Some(host) => println!("  Role:          {} (target {})", config.role, host),
        None => println!("  Role:          {}", config.role),
    }
    println!("  Port:          {}", config.port.value());
    println!("  Sizes:         {}", config.range);
    println!("  Perturbation:  {} bytes", config.perturbation);
    match config.repeat {
        RepeatPolicy::Fixed(count) => println!("  Repeat:        {}", count),
        RepeatPolicy::Calibrated => println!(
            "  Repeat:        calibrated ({}ms per trial)",
            config.calibration_target.as_millis()
        ),
    }
    println!("  Trials:        {}", config.trials);
    println!("  Cache:         {}", config.cache);
    println!("  Alignment:     {} bytes", config.alignment);
    println!(
        "  Offsets:       send {} / recv {}",
        config.offsets.send, config.offsets.recv
    );
    match config.socket_buffer {
        Some(bytes) => println!("  Socket buffer: {} bytes", bytes),
        None => println!("  Socket buffer: system default"),
    }

    let modes: Vec<&str> = [
        (config.streaming, "streaming"),
        (config.bidirectional, "bidirectional"),
        (config.reset_between_trials, "reset"),
        (config.integrity, "integrity"),
        (config.random_sizes, "random sizes"),
    ]
    .into_iter()
    .filter_map(|(on, name)| on.then_some(name))
    .collect();
    if modes.is_empty() {
        println!("  Modes:         ping-pong");
    } else {
        println!("  Modes:         {}", modes.join(", "));
    }

    Ok(())
}
