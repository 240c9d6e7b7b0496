// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Serializable records of a sweep.
//!
//! A [`SweepReport`] captures the host, the effective settings and one
//! [`SizeRecord`] per measured size, including the spread of the trial
//! times behind each best-of-N figure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::System;
use uuid::Uuid;

use netpipe_core::config::BenchConfig;
use netpipe_core::trial::{throughput_mbps, SizePoint, SizeResult};
use netpipe_core::{BufferOffsets, CacheMode, RepeatPolicy, Role, SizeRange};

/// Distribution of the one-way trial times of one size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialStats {
    /// Fastest trial in nanoseconds; the reported figure.
    pub min_ns: u64,
    /// Slowest trial in nanoseconds
    pub max_ns: u64,
    /// Arithmetic mean in nanoseconds
    pub mean_ns: f64,
    /// Median trial in nanoseconds
    pub median_ns: u64,
    /// Standard deviation in nanoseconds
    pub std_dev_ns: f64,
    /// Raw per-trial times, in run order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<u64>>,
}

impl TrialStats {
    /// Summarise trial times given in nanoseconds.
    pub fn from_samples(samples: Vec<u64>, keep_raw: bool) -> Self {
        if samples.is_empty() {
            return Self {
                min_ns: 0,
                max_ns: 0,
                mean_ns: 0.0,
                median_ns: 0,
                std_dev_ns: 0.0,
                samples: None,
            };
        }

        let raw = keep_raw.then(|| samples.clone());
        let mut sorted = samples;
        sorted.sort_unstable();
        let len = sorted.len();

        let sum: u64 = sorted.iter().sum();
        let mean_ns = sum as f64 / len as f64;
        let variance: f64 = sorted
            .iter()
            .map(|&x| {
                let diff = x as f64 - mean_ns;
                diff * diff
            })
            .sum::<f64>()
            / len as f64;

        Self {
            min_ns: sorted[0],
            max_ns: sorted[len - 1],
            mean_ns,
            median_ns: sorted[len / 2],
            std_dev_ns: variance.sqrt(),
            samples: raw,
        }
    }

    /// Format a duration in human-readable form (auto-selects ns/μs/ms).
    pub fn format_duration(ns: u64) -> String {
        if ns < 1_000 {
            format!("{}ns", ns)
        } else if ns < 1_000_000 {
            format!("{:.2}μs", ns as f64 / 1_000.0)
        } else if ns < 1_000_000_000 {
            format!("{:.2}ms", ns as f64 / 1_000_000.0)
        } else {
            format!("{:.2}s", ns as f64 / 1_000_000_000.0)
        }
    }
}

/// Throughput of the best trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThroughputMetrics {
    /// Megabits per second, 1 MB = 1024 × 1024 bytes
    pub mbps: f64,
    /// Bytes per second
    pub bytes_per_sec: f64,
    /// Bytes moved in one direction by one trial
    pub total_bytes: u64,
    /// One-way time of the best trial in nanoseconds
    pub one_way_ns: u64,
}

impl ThroughputMetrics {
    pub fn calculate(total_bytes: u64, one_way_ns: u64) -> Self {
        let one_way = std::time::Duration::from_nanos(one_way_ns);
        let secs = one_way.as_secs_f64();
        Self {
            mbps: throughput_mbps(total_bytes, one_way),
            bytes_per_sec: if secs > 0.0 {
                total_bytes as f64 / secs
            } else {
                0.0
            },
            total_bytes,
            one_way_ns,
        }
    }
}

/// System information captured at run time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system name
    pub os: String,
    /// OS version
    pub os_version: String,
    /// Kernel version (Linux)
    pub kernel_version: Option<String>,
    /// CPU model name
    pub cpu_model: String,
    /// Number of CPU cores
    pub cpu_cores: usize,
    /// Total system memory in bytes
    pub memory_bytes: u64,
    /// Hostname
    pub hostname: String,
}

impl SystemInfo {
    /// Collect current system information.
    pub fn collect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            os: System::name().unwrap_or_else(|| "Unknown".to_string()),
            os_version: System::os_version().unwrap_or_else(|| "Unknown".to_string()),
            kernel_version: System::kernel_version(),
            cpu_model: sys
                .cpus()
                .first()
                .map(|cpu| cpu.brand().to_string())
                .unwrap_or_else(|| "Unknown".to_string()),
            cpu_cores: sys.cpus().len(),
            memory_bytes: sys.total_memory(),
            hostname: System::host_name().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

/// Settings that shaped the numbers in a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSettings {
    pub role: Role,
    pub host: Option<String>,
    pub range: SizeRange,
    pub repeat: RepeatPolicy,
    pub perturbation: usize,
    pub trials: u32,
    pub cache: CacheMode,
    pub streaming: bool,
    pub bidirectional: bool,
    pub reset_between_trials: bool,
    pub integrity: bool,
    pub random_sizes: bool,
    pub alignment: usize,
    pub offsets: BufferOffsets,
    pub socket_buffer: Option<usize>,
}

impl RunSettings {
    pub fn from_config(config: &BenchConfig) -> Self {
        Self {
            role: config.role,
            host: config.host.clone(),
            range: config.range,
            repeat: config.repeat,
            perturbation: config.perturbation,
            trials: config.trials,
            cache: config.cache,
            streaming: config.streaming,
            bidirectional: config.bidirectional,
            reset_between_trials: config.reset_between_trials,
            integrity: config.integrity,
            random_sizes: config.random_sizes,
            alignment: config.alignment,
            offsets: config.offsets,
            socket_buffer: config.socket_buffer,
        }
    }
}

/// One measured size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeRecord {
    /// Message size; `None` for a randomized point.
    pub bytes: Option<usize>,
    pub repeat: u32,
    pub throughput: ThroughputMetrics,
    pub latency_detail: f64,
    pub verified: bool,
    pub trials: TrialStats,
}

impl SizeRecord {
    pub fn from_result(result: &SizeResult) -> Self {
        let bytes = match result.point {
            SizePoint::Fixed(len) => Some(len),
            SizePoint::Random(_) => None,
        };
        let samples = result
            .trial_times
            .iter()
            .map(|t| t.as_nanos() as u64)
            .collect();

        Self {
            bytes,
            repeat: result.repeat,
            throughput: ThroughputMetrics::calculate(
                result.total_bytes,
                result.one_way.as_nanos() as u64,
            ),
            latency_detail: result.latency_detail,
            verified: result.verified,
            trials: TrialStats::from_samples(samples, true),
        }
    }
}

/// Complete report of one sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Suite identifier
    pub benchmark_suite: String,
    /// Tool version
    pub version: String,
    /// Unique id of this run
    pub run_id: Uuid,
    /// Timestamp when the sweep started
    pub timestamp: DateTime<Utc>,
    /// System information
    pub system_info: SystemInfo,
    /// Effective settings
    pub settings: RunSettings,
    /// Per-size results in sweep order
    pub results: Vec<SizeRecord>,
}

impl SweepReport {
    /// Create an empty report for a run of `config`.
    pub fn new(config: &BenchConfig) -> Self {
        Self {
            benchmark_suite: "netpipe".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            system_info: SystemInfo::collect(),
            settings: RunSettings::from_config(config),
            results: Vec::new(),
        }
    }

    pub fn add_result(&mut self, result: &SizeResult) {
        self.results.push(SizeRecord::from_result(result));
    }

    /// Highest throughput seen in the sweep.
    pub fn peak_mbps(&self) -> f64 {
        self.results
            .iter()
            .map(|r| r.throughput.mbps)
            .fold(0.0, f64::max)
    }
}
