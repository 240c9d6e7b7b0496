// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

pub mod energy;
pub mod loopback;
pub mod run;
pub mod validate;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use netpipe_core::{BenchConfig, Role, Transport, TrialLoop};
use netpipe_report::{JsonReporter, LogSink, ResultStream, SweepReport};

use crate::args::BenchArgs;
use crate::cpu_affinity;

/// Log what the configuration implies, the way the classic driver announced
/// its modes before starting.
pub fn announce(config: &BenchConfig) {
    tracing::info!(
        role = %config.role,
        range = %config.range,
        trials = config.trials,
        cache = %config.cache,
        "Benchmark configured"
    );
    if !config.cache.is_cached() {
        tracing::info!("Performance measured without cache effects");
    }
    if config.streaming {
        tracing::info!("Streaming in one direction only; connection reset between trials");
    }
    if config.bidirectional {
        tracing::info!("Passing data in both directions; output is the combined bandwidth");
    }
    if config.integrity {
        tracing::info!("Checking message contents instead of measuring performance");
    }
    if config.offsets.send != 0 || config.offsets.recv != 0 {
        tracing::info!(
            send = config.offsets.send,
            recv = config.offsets.recv,
            "Using buffer offsets"
        );
    }
}

/// Pin the calling thread if a CPU list was given.
pub fn pin(spec: Option<&str>) -> anyhow::Result<()> {
    if let Some(spec) = spec {
        let cpus = cpu_affinity::pin_current_thread(spec)
            .with_context(|| format!("Failed to pin to CPUs '{}'", spec))?;
        tracing::info!(cpus = ?cpus, "Pinned benchmark thread");
    }
    Ok(())
}

/// Run one role to completion over `transport`.
///
/// The transmitter owns the result stream and the JSON report; the
/// receiver only logs its view of each size.
pub fn drive<T: Transport>(
    config: BenchConfig,
    transport: T,
    args: &BenchArgs,
) -> anyhow::Result<()> {
    let role = config.role;
    let mut trial_loop = TrialLoop::new(config, transport).context("Failed to set up buffers")?;

    match role {
        Role::Transmitter => {
            let writer: Box<dyn Write> = match &args.output {
                Some(path) => Box::new(BufWriter::new(
                    File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?,
                )),
                None => Box::new(io::stdout().lock()),
            };

            let mut stream = ResultStream::new(writer);
            if args.json.is_some() {
                stream = stream.with_report(SweepReport::new(trial_loop.config()));
            }

            trial_loop.run(&mut stream).context("Benchmark run failed")?;

            if let (Some(report), Some(dir)) = (stream.finish()?, args.json.as_deref()) {
                save_report(&report, dir)?;
            }
        }
        Role::Receiver => {
            if args.output.is_some() || args.json.is_some() {
                tracing::warn!("Output files are written by the transmitter only");
            }
            let mut sink = LogSink::new(role);
            trial_loop.run(&mut sink).context("Benchmark run failed")?;
            tracing::info!(sizes = sink.recorded(), "Receiver finished");
        }
    }

    trial_loop.into_transport();
    Ok(())
}

fn save_report(report: &SweepReport, dir: &Path) -> anyhow::Result<()> {
    let reporter = JsonReporter::new(dir)
        .with_context(|| format!("Failed to prepare report directory {}", dir.display()))?;
    let path = reporter.save(report).context("Failed to save JSON report")?;
    eprintln!("Report saved to {}", path.display());
    Ok(())
}
