// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The timed sweep.
//!
//! For every size the loop seeds the buffers, settles on a repeat count,
//! then runs a number of independent trials. Each trial flushes the cache
//! (uncached mode only), passes a sync barrier and times a batch of
//! repetitions. The fastest trial is kept: scheduler noise only ever adds
//! time, so the minimum is the best estimate of the achievable rate.

use std::fmt;
use std::time::{Duration, Instant};

use crate::buffer::{
    aligned_block_len, BufferPool, CacheFlusher, DEFAULT_SCRATCH_BYTES, UNCACHED_POOL_BYTES,
};
use crate::config::BenchConfig;
use crate::coordinator::Coordinator;
use crate::error::NetpipeResult;
use crate::integrity::{set_integrity_data, verify_integrity};
use crate::schedule::{sweep, RandomSizes};
use crate::transport::Transport;
use crate::types::{CacheMode, RepeatPolicy, Role, SizeRange};

/// Repetitions timed by the transmitter to derive a calibrated count.
pub const CALIBRATION_BURST: u32 = 8;

/// Upper bound on a calibrated repeat count.
pub const MAX_CALIBRATED_REPEAT: u32 = 1_000_000;

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Where the loop currently is. Exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialPhase {
    Idle,
    /// Buffers seeded and repeat count being settled for a new size.
    Sizing,
    /// Scratch region being walked before a trial.
    Flushing,
    /// Both roles passed the barrier; the timer is about to start.
    Synced,
    Transmitting,
    Receiving,
    /// Batch finished and its time recorded.
    Measured,
    Reset,
    Done,
}

impl fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrialPhase::Idle => "idle",
            TrialPhase::Sizing => "sizing",
            TrialPhase::Flushing => "flushing",
            TrialPhase::Synced => "synced",
            TrialPhase::Transmitting => "transmitting",
            TrialPhase::Receiving => "receiving",
            TrialPhase::Measured => "measured",
            TrialPhase::Reset => "reset",
            TrialPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// One data point of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizePoint {
    /// Every repetition moves exactly this many bytes.
    Fixed(usize),
    /// Each repetition draws its size from the range.
    Random(SizeRange),
}

impl SizePoint {
    /// Largest message this point can produce.
    pub fn max_len(&self) -> usize {
        match self {
            SizePoint::Fixed(len) => *len,
            SizePoint::Random(range) => range.upper(),
        }
    }
}

impl fmt::Display for SizePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizePoint::Fixed(len) => write!(f, "{} bytes", len),
            SizePoint::Random(range) => write!(f, "random bytes in {}", range),
        }
    }
}

/// Data points a run visits, in order.
pub fn size_points(config: &BenchConfig) -> Vec<SizePoint> {
    if config.random_sizes {
        vec![SizePoint::Random(config.range)]
    } else {
        sweep(config.range, config.perturbation)
            .into_iter()
            .map(SizePoint::Fixed)
            .collect()
    }
}

/// Measured outcome of one size.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeResult {
    pub point: SizePoint,
    pub repeat: u32,
    /// Bytes moved in one direction during one trial.
    pub total_bytes: u64,
    /// Fastest one-directional trial time.
    pub one_way: Duration,
    /// One-directional time of every trial, in run order.
    pub trial_times: Vec<Duration>,
    pub mbps: f64,
    /// Reserved; always zero in ping-pong mode.
    pub latency_detail: f64,
    /// Every received block passed the content check.
    pub verified: bool,
}

/// Running minimum over the trials of one size.
#[derive(Debug, Clone, Default)]
pub struct BestOfTrials {
    times: Vec<Duration>,
}

impl BestOfTrials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, time: Duration) {
        self.times.push(time);
    }

    /// Fastest recorded trial.
    pub fn best(&self) -> Option<Duration> {
        self.times.iter().min().copied()
    }

    pub fn times(&self) -> &[Duration] {
        &self.times
    }

    pub fn into_times(self) -> Vec<Duration> {
        self.times
    }
}

/// Throughput in megabits per second, with 1 MB = 1024 × 1024 bytes.
pub fn throughput_mbps(total_bytes: u64, one_way: Duration) -> f64 {
    let secs = one_way.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    (total_bytes as f64 * 8.0) / (secs * BYTES_PER_MEGABYTE)
}

/// Repeat count that makes a trial last at least `target`, given that
/// `burst` repetitions took `elapsed`.
pub fn calibrated_repeat(elapsed: Duration, burst: u32, target: Duration) -> u32 {
    let per_repeat = elapsed.as_secs_f64() / f64::from(burst.max(1));
    if per_repeat <= 0.0 {
        return MAX_CALIBRATED_REPEAT;
    }
    let wanted = (target.as_secs_f64() / per_repeat).ceil();
    if wanted >= f64::from(MAX_CALIBRATED_REPEAT) {
        MAX_CALIBRATED_REPEAT
    } else {
        (wanted as u32).max(1)
    }
}

/// Consumer of per-size results.
pub trait ResultSink {
    fn record(&mut self, result: &SizeResult) -> NetpipeResult<()>;
}

impl ResultSink for Vec<SizeResult> {
    fn record(&mut self, result: &SizeResult) -> NetpipeResult<()> {
        self.push(result.clone());
        Ok(())
    }
}

/// Benchmark driver for one role.
pub struct TrialLoop<T: Transport> {
    config: BenchConfig,
    transport: T,
    pool: BufferPool,
    flusher: Option<CacheFlusher>,
    coordinator: Coordinator,
    random: Option<RandomSizes>,
    phase: TrialPhase,
}

impl<T: Transport> TrialLoop<T> {
    /// Allocate buffers for `config` and take ownership of the connection.
    ///
    /// # Errors
    /// Returns a buffer error if the pool or the cache scratch region cannot
    /// be allocated.
    pub fn new(config: BenchConfig, transport: T) -> NetpipeResult<Self> {
        let (pool_bytes, flusher) = match config.cache {
            CacheMode::Cached => (
                aligned_block_len(config.range.upper(), config.alignment),
                None,
            ),
            CacheMode::Uncached => (
                UNCACHED_POOL_BYTES,
                Some(CacheFlusher::new(DEFAULT_SCRATCH_BYTES)?),
            ),
        };

        let pool =
            BufferPool::allocate(pool_bytes, config.alignment, config.offsets, config.cache)?;
        let random = config.random_sizes.then(|| RandomSizes::new(config.range));
        let coordinator = Coordinator::new(config.role);

        tracing::debug!(
            role = %config.role,
            cache = %config.cache,
            pool_bytes = pool_bytes,
            "Trial loop ready"
        );

        Ok(Self {
            config,
            transport,
            pool,
            flusher,
            coordinator,
            random,
            phase: TrialPhase::Idle,
        })
    }

    /// Replace the cache flusher, e.g. with a smaller scratch region.
    /// Has no effect in cached mode.
    pub fn with_flusher(mut self, flusher: CacheFlusher) -> Self {
        if self.flusher.is_some() {
            self.flusher = Some(flusher);
        }
        self
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    /// Run the whole sweep, handing each size's result to `sink`.
    ///
    /// Returns the number of sizes measured. Any transport, buffer or
    /// integrity failure aborts the run.
    pub fn run<S: ResultSink + ?Sized>(&mut self, sink: &mut S) -> NetpipeResult<usize> {
        let points = size_points(&self.config);
        tracing::info!(
            role = %self.config.role,
            sizes = points.len(),
            range = %self.config.range,
            "Starting sweep"
        );

        self.coordinator.sync(&mut self.transport)?;

        for point in &points {
            let result = self.measure(*point)?;
            sink.record(&result)?;
        }

        self.phase = TrialPhase::Done;
        tracing::info!(role = %self.config.role, sizes = points.len(), "Sweep complete");
        Ok(points.len())
    }

    /// Stop the loop, free its buffers and hand back the connection.
    pub fn into_transport(self) -> T {
        let Self {
            transport, pool, ..
        } = self;
        pool.release();
        transport
    }

    fn measure(&mut self, point: SizePoint) -> NetpipeResult<SizeResult> {
        self.phase = TrialPhase::Sizing;

        let max_len = point.max_len();
        self.pool
            .ensure_block(aligned_block_len(max_len, self.config.alignment))?;
        self.pool.init_data(self.config.role);
        self.pool.reset_cursors();

        if self.config.bidirectional {
            if let Some(limit) = self.config.socket_buffer {
                if max_len > limit {
                    tracing::warn!(
                        size = max_len,
                        socket_buffer = limit,
                        "Bidirectional message exceeds socket buffer; both sides may block"
                    );
                }
            }
        }

        let repeat = self.repeat_count(point)?;
        self.pool.reset_cursors();

        let mut trials = BestOfTrials::new();
        let mut total_bytes = 0;

        for trial in 0..self.config.trials {
            if let Some(random) = self.random.as_mut() {
                random.reseed();
            }

            if let Some(flusher) = self.flusher.as_mut() {
                self.phase = TrialPhase::Flushing;
                flusher.flush();
            }

            self.coordinator.sync(&mut self.transport)?;
            self.phase = TrialPhase::Synced;

            let started = Instant::now();
            total_bytes = self.run_batch(point, repeat)?;
            let elapsed = started.elapsed();
            self.phase = TrialPhase::Measured;

            // A round trip moves each message once in each direction.
            let one_way = if self.config.is_ping_pong() {
                elapsed / 2
            } else {
                elapsed
            };
            trials.record(one_way);

            tracing::debug!(
                size = %point,
                trial = trial,
                repeat = repeat,
                elapsed_us = elapsed.as_micros() as u64,
                "Trial finished"
            );

            if self.config.reset_between_trials {
                self.phase = TrialPhase::Reset;
                self.transport.reset()?;
            }
        }

        let one_way = trials.best().unwrap_or_default();
        let mbps = throughput_mbps(total_bytes, one_way);

        tracing::info!(
            role = %self.config.role,
            size = %point,
            repeat = repeat,
            bytes = total_bytes,
            mbps = mbps,
            "Measured size"
        );

        Ok(SizeResult {
            point,
            repeat,
            total_bytes,
            one_way,
            trial_times: trials.into_times(),
            mbps,
            latency_detail: 0.0,
            verified: self.config.integrity,
        })
    }

    fn repeat_count(&mut self, point: SizePoint) -> NetpipeResult<u32> {
        let target = match self.config.repeat {
            RepeatPolicy::Fixed(count) => return Ok(count),
            RepeatPolicy::Calibrated => self.config.calibration_target,
        };

        if let Some(random) = self.random.as_mut() {
            random.reseed();
        }

        self.coordinator.sync(&mut self.transport)?;
        let started = Instant::now();
        self.run_batch(point, CALIBRATION_BURST)?;
        let elapsed = started.elapsed();

        let repeat = match self.config.role {
            Role::Transmitter => {
                let repeat = calibrated_repeat(elapsed, CALIBRATION_BURST, target);
                self.coordinator
                    .exchange_repeat_count(&mut self.transport, repeat)?;
                repeat
            }
            Role::Receiver => self.coordinator.receive_repeat_count(&mut self.transport)?,
        };

        tracing::debug!(size = %point, repeat = repeat, "Calibrated repeat count");
        Ok(repeat)
    }

    /// Move `repeat` messages and return the bytes moved in one direction.
    fn run_batch(&mut self, point: SizePoint, repeat: u32) -> NetpipeResult<u64> {
        let uncached = !self.config.cache.is_cached();
        let ping_pong = self.config.is_ping_pong();
        // Cursors step by the largest block this point can produce, so a
        // random draw never lands past the end of the pool.
        let block = aligned_block_len(point.max_len(), self.config.alignment);
        let mut total: u64 = 0;

        self.phase = match self.config.role {
            Role::Transmitter => TrialPhase::Transmitting,
            Role::Receiver => TrialPhase::Receiving,
        };

        for _ in 0..repeat {
            let len = self.next_len(point);
            total += len as u64;

            if self.config.bidirectional {
                self.send_message(len)?;
                self.recv_message(len)?;
                if uncached {
                    self.pool.advance_recv(block);
                    self.pool.advance_send(block);
                }
                continue;
            }

            match self.config.role {
                Role::Transmitter => {
                    self.send_message(len)?;
                    if ping_pong {
                        self.recv_message(len)?;
                        if uncached {
                            self.pool.advance_recv(block);
                        }
                    }
                    if uncached {
                        self.pool.advance_send(block);
                    }
                }
                Role::Receiver => {
                    self.recv_message(len)?;
                    if uncached {
                        self.pool.advance_recv(block);
                    }
                    if ping_pong {
                        self.send_message(len)?;
                        if uncached {
                            self.pool.advance_send(block);
                        }
                    }
                }
            }
        }

        Ok(total)
    }

    fn next_len(&mut self, point: SizePoint) -> usize {
        match (point, self.random.as_mut()) {
            (SizePoint::Random(_), Some(random)) => random.next_size(),
            _ => point.max_len(),
        }
    }

    fn send_message(&mut self, len: usize) -> NetpipeResult<()> {
        if self.config.integrity {
            set_integrity_data(self.pool.send_block_mut(len));
        }
        self.transport.send(self.pool.send_block(len))?;
        Ok(())
    }

    fn recv_message(&mut self, len: usize) -> NetpipeResult<()> {
        self.transport.recv(self.pool.recv_block_mut(len))?;
        if self.config.integrity {
            verify_integrity(self.pool.recv_block(len))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BenchSettings, ConfigLoader};
    use crate::transport::ChannelTransport;

    fn config(host: Option<&str>, upper: usize) -> BenchConfig {
        let settings = BenchSettings {
            upper,
            repeat: Some(4),
            perturbation: 0,
            trials: 2,
            ..Default::default()
        }
        .with_host(host.map(str::to_string));
        ConfigLoader::validate(settings).unwrap()
    }

    #[test]
    fn test_best_of_trials_keeps_minimum() {
        let mut trials = BestOfTrials::new();
        trials.record(Duration::from_millis(5));
        trials.record(Duration::from_millis(3));
        trials.record(Duration::from_millis(4));
        assert_eq!(trials.best(), Some(Duration::from_millis(3)));
        assert_eq!(trials.times().len(), 3);
    }

    #[test]
    fn test_best_of_no_trials() {
        assert_eq!(BestOfTrials::new().best(), None);
    }

    #[test]
    fn test_throughput_power_of_two_megabytes() {
        // 1 MiB in one second is 8 Mbps in this convention.
        let mbps = throughput_mbps(1024 * 1024, Duration::from_secs(1));
        assert!((mbps - 8.0).abs() < 1e-9);
        assert_eq!(throughput_mbps(1024, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_calibrated_repeat() {
        // 8 repetitions in 8 ms: 1 ms each, 250 of them fill 250 ms.
        let repeat = calibrated_repeat(
            Duration::from_millis(8),
            8,
            Duration::from_millis(250),
        );
        assert_eq!(repeat, 250);

        // Slow messages still get at least one repetition.
        let repeat = calibrated_repeat(Duration::from_secs(80), 8, Duration::from_millis(250));
        assert_eq!(repeat, 1);

        assert_eq!(
            calibrated_repeat(Duration::ZERO, 8, Duration::from_millis(250)),
            MAX_CALIBRATED_REPEAT
        );
    }

    #[test]
    fn test_size_points() {
        let sweep_config = config(None, 16);
        assert_eq!(
            size_points(&sweep_config),
            vec![
                SizePoint::Fixed(1),
                SizePoint::Fixed(2),
                SizePoint::Fixed(3),
                SizePoint::Fixed(4),
                SizePoint::Fixed(6),
                SizePoint::Fixed(8),
                SizePoint::Fixed(12),
                SizePoint::Fixed(16),
            ]
        );

        let mut random_config = config(None, 16);
        random_config.random_sizes = true;
        assert_eq!(
            size_points(&random_config),
            vec![SizePoint::Random(random_config.range)]
        );
    }

    #[test]
    fn test_both_roles_over_channel() {
        let (tx_end, rx_end) = ChannelTransport::pair();
        let receiver_config = config(None, 64);
        let receiver = std::thread::spawn(move || {
            let mut trial_loop = TrialLoop::new(receiver_config, rx_end).unwrap();
            let mut results: Vec<SizeResult> = Vec::new();
            trial_loop.run(&mut results).unwrap();
            assert_eq!(trial_loop.phase(), TrialPhase::Done);
            results
        });

        let mut trial_loop = TrialLoop::new(config(Some("localhost"), 64), tx_end).unwrap();
        assert_eq!(trial_loop.phase(), TrialPhase::Idle);
        let mut results: Vec<SizeResult> = Vec::new();
        let measured = trial_loop.run(&mut results).unwrap();
        let receiver_results = receiver.join().unwrap();

        assert_eq!(measured, results.len());
        assert_eq!(results.len(), receiver_results.len());
        for result in &results {
            let SizePoint::Fixed(len) = result.point else {
                panic!("sweep produced a random point");
            };
            assert_eq!(result.total_bytes, 4 * len as u64);
            assert_eq!(result.trial_times.len(), 2);
            assert_eq!(Some(result.one_way), result.trial_times.iter().min().copied());
            assert!(result.mbps >= 0.0);
            assert_eq!(result.latency_detail, 0.0);
        }
    }
}
