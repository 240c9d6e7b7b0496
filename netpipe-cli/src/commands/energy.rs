// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `netpipe energy` command - Sample package energy counters.
//!
//! Needs read access to `/dev/cpu/*/msr` (the `msr` module loaded, usually
//! root).

use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use netpipe_core::EnergyReader;

pub fn execute(interval_ms: u64, samples: u32) -> anyhow::Result<()> {
    if interval_ms == 0 {
        bail!("Sampling interval must be at least 1ms");
    }

    let reader = EnergyReader::open().context("Failed to open RAPL energy counters")?;
    let identity = reader.identity();
    tracing::info!(
        vendor = %identity.vendor,
        family = identity.family,
        model = identity.model,
        packages = reader.package_count(),
        "Sampling package energy"
    );

    println!("{:>8} {:>8} {:>12} {:>10}", "sample", "package", "joules", "watts");

    let interval = Duration::from_millis(interval_ms);
    let mut previous = reader.snapshot()?;
    let mut taken = 0u32;
    while samples == 0 || taken < samples {
        thread::sleep(interval);
        let current = reader.snapshot()?;
        let elapsed = previous.elapsed_until(&current).as_secs_f64();

        for (package, joules) in previous.delta(&current).into_iter().enumerate() {
            let watts = if elapsed > 0.0 { joules / elapsed } else { 0.0 };
            println!(
                "{:>8} {:>8} {:>12.6} {:>10.3}",
                taken, package, joules, watts
            );
        }

        previous = current;
        taken += 1;
    }

    Ok(())
}
