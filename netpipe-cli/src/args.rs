// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark flags shared by `run` and `loopback`.
//!
//! Every flag is optional so it only overrides what the YAML file (or the
//! built-in defaults) already say.

use std::path::PathBuf;

use clap::Args;
use netpipe_core::{BenchSettings, BufferOffsets, ConfigLoader, NetpipeResult};

#[derive(Args, Debug, Clone, Default)]
pub struct BenchArgs {
    /// YAML settings file; flags override its values
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Receiver host name; makes this process the transmitter
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// TCP port of the receiver
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Smallest message size in bytes
    #[arg(short = 'l', long)]
    pub lower: Option<usize>,

    /// Largest message size in bytes
    #[arg(short = 'u', long)]
    pub upper: Option<usize>,

    /// Fixed repeat count per trial (calibrated when omitted)
    #[arg(short = 'n', long)]
    pub repeat: Option<u32>,

    /// Perturbation around each base size in bytes
    #[arg(short = 'p', long)]
    pub perturbation: Option<usize>,

    /// Independent trials per size; the fastest is reported
    #[arg(long)]
    pub trials: Option<u32>,

    /// Measure without cache effects
    #[arg(short = 'I', long = "no-cache")]
    pub no_cache: bool,

    /// Stream in one direction only
    #[arg(short = 's', long)]
    pub streaming: bool,

    /// Pass data in both directions simultaneously
    #[arg(short = '2', long)]
    pub bidirectional: bool,

    /// Reset the connection after every trial
    #[arg(short = 'r', long)]
    pub reset: bool,

    /// Check message contents instead of measuring performance
    #[arg(short = 'i', long)]
    pub integrity: bool,

    /// Draw each repetition's size at random from the range
    #[arg(short = 'x', long)]
    pub random: bool,

    /// Send and receive buffer offsets, as `send,recv` or a single value
    #[arg(short = 'O', long, value_parser = parse_offsets)]
    pub offsets: Option<BufferOffsets>,

    /// Socket send/receive buffer size in bytes (0 keeps system defaults)
    #[arg(short = 'b', long = "socket-buffer")]
    pub socket_buffer: Option<usize>,

    /// Buffer alignment boundary in bytes
    #[arg(long)]
    pub alignment: Option<usize>,

    /// Minimum duration of a calibrated trial in milliseconds
    #[arg(long = "calibration-ms")]
    pub calibration_ms: Option<u64>,

    /// Write the result stream to this file instead of stdout
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Save a JSON sweep report into this directory
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Pin the benchmark thread to these CPUs, e.g. `2` or `0-3,8`
    #[arg(long)]
    pub cpu: Option<String>,
}

impl BenchArgs {
    /// Merge the flags over the settings file, or over the defaults when no
    /// file was given.
    pub fn to_settings(&self) -> NetpipeResult<BenchSettings> {
        let mut settings = match &self.config {
            Some(path) => ConfigLoader::load_settings_file(path)?,
            None => BenchSettings::default(),
        };

        if self.host.is_some() {
            settings.host = self.host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(lower) = self.lower {
            settings.lower = lower;
        }
        if let Some(upper) = self.upper {
            settings.upper = upper;
        }
        if self.repeat.is_some() {
            settings.repeat = self.repeat;
        }
        if let Some(perturbation) = self.perturbation {
            settings.perturbation = perturbation;
        }
        if let Some(trials) = self.trials {
            settings.trials = trials;
        }
        if let Some(offsets) = self.offsets {
            settings.send_offset = offsets.send;
            settings.recv_offset = offsets.recv;
        }
        if self.socket_buffer.is_some() {
            settings.socket_buffer = self.socket_buffer;
        }
        if let Some(alignment) = self.alignment {
            settings.alignment = alignment;
        }
        if let Some(ms) = self.calibration_ms {
            settings.calibration_target_ms = ms;
        }

        settings.cache &= !self.no_cache;
        settings.streaming |= self.streaming;
        settings.bidirectional |= self.bidirectional;
        settings.reset_between_trials |= self.reset;
        settings.integrity |= self.integrity;
        settings.random_sizes |= self.random;

        Ok(settings)
    }
}

/// Parse `send,recv`; a single value applies to both buffers.
pub fn parse_offsets(s: &str) -> Result<BufferOffsets, String> {
    let parse = |part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid offset '{}': {}", part.trim(), e))
    };

    match s.split_once(',') {
        Some((send, recv)) => Ok(BufferOffsets::new(parse(send)?, parse(recv)?)),
        None => {
            let both = parse(s)?;
            Ok(BufferOffsets::new(both, both))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_offsets() {
        assert_eq!(parse_offsets("3,5").unwrap(), BufferOffsets::new(3, 5));
        assert_eq!(parse_offsets("7").unwrap(), BufferOffsets::new(7, 7));
        assert!(parse_offsets("a,1").is_err());
    }

    #[test]
    fn test_defaults_without_flags() {
        let settings = BenchArgs::default().to_settings().unwrap();
        assert_eq!(settings.port, 5002);
        assert!(settings.cache);
        assert!(settings.host.is_none());
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "upper: 4096\nport: 6000\ntrials: 5").unwrap();

        let args = BenchArgs {
            config: Some(file.path().to_path_buf()),
            port: Some(7000),
            no_cache: true,
            integrity: true,
            offsets: Some(BufferOffsets::new(1, 2)),
            ..Default::default()
        };
        let settings = args.to_settings().unwrap();

        assert_eq!(settings.upper, 4096);
        assert_eq!(settings.trials, 5);
        assert_eq!(settings.port, 7000);
        assert!(!settings.cache);
        assert!(settings.integrity);
        assert_eq!((settings.send_offset, settings.recv_offset), (1, 2));
    }

    #[test]
    fn test_missing_config_file() {
        let args = BenchArgs {
            config: Some(PathBuf::from("/nonexistent/netpipe.yaml")),
            ..Default::default()
        };
        assert!(args.to_settings().is_err());
    }
}
