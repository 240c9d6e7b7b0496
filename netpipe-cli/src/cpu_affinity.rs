// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Pinning benchmark threads to CPUs.
//!
//! Keeping a role on a fixed core removes migrations from the timed window
//! and, in loopback runs, keeps the two roles from competing for one core.

use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AffinityError {
    #[error("CPU list '{spec}' names no CPUs")]
    Empty { spec: String },

    #[error("CPU {cpu} does not exist ({available} CPUs available)")]
    OutOfRange { cpu: usize, available: usize },

    #[error("Failed to set CPU affinity: {0}")]
    Sched(#[from] nix::Error),
}

/// Pin the calling thread to the CPUs named by `spec`.
///
/// Returns the CPUs the thread may now run on.
pub fn pin_current_thread(spec: &str) -> Result<Vec<usize>, AffinityError> {
    let cpus = parse_cpu_list(spec);
    if cpus.is_empty() {
        return Err(AffinityError::Empty {
            spec: spec.to_string(),
        });
    }

    let available = num_cpus::get();
    let mut cpuset = CpuSet::new();
    for &cpu in &cpus {
        if cpu >= available {
            return Err(AffinityError::OutOfRange { cpu, available });
        }
        cpuset.set(cpu)?;
    }

    // Pid 0 addresses the calling thread.
    sched_setaffinity(Pid::from_raw(0), &cpuset)?;

    tracing::debug!(cpus = ?cpus, "Thread pinned");
    Ok(cpus)
}

/// Parse a CPU list string like "0-3,8-11" into a Vec of CPU indices.
pub fn parse_cpu_list(s: &str) -> Vec<usize> {
    let mut cpus = Vec::new();
    for part in s.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                cpus.extend(start..=end);
            }
        } else if let Ok(cpu) = part.parse::<usize>() {
            cpus.push(cpu);
        }
    }
    cpus
}
