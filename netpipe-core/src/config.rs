// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Benchmark configuration with strict validation.
//!
//! Settings arrive from command-line flags, an optional YAML file, or both,
//! as an unvalidated [`BenchSettings`]. [`ConfigLoader::validate`] turns them
//! into an immutable [`BenchConfig`]; any invalid or conflicting field is a
//! [`ConfigError`] and the run never starts.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, NetpipeError, NetpipeResult};
use crate::integrity::MIN_INTEGRITY_BYTES;
use crate::types::{
    BufferOffsets, CacheMode, Port, RepeatPolicy, Role, SizeRange, MAX_MESSAGE_BYTES,
};

/// Default TCP port of the responder.
pub const DEFAULT_PORT: u16 = 5002;

/// Default upper bound of the sweep: 8 MiB.
pub const DEFAULT_UPPER: usize = 8 * 1024 * 1024;

/// Default perturbation around each base size.
pub const DEFAULT_PERTURBATION: usize = 3;

/// Independent timed trials per size; the fastest one is reported.
pub const DEFAULT_TRIALS: u32 = 3;

/// Boundary the working buffers are aligned to.
pub const DEFAULT_ALIGNMENT: usize = 16 * 1024;

/// Largest accepted alignment boundary: 1 MiB.
pub const MAX_ALIGNMENT: usize = 1024 * 1024;

/// Minimum wall time a calibrated trial should take.
pub const DEFAULT_CALIBRATION_TARGET_MS: u64 = 250;

/// Unvalidated settings as parsed from YAML or assembled from CLI flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchSettings {
    /// Target host. Its presence makes this process the transmitter.
    pub host: Option<String>,
    pub port: u16,
    pub lower: usize,
    pub upper: usize,
    /// Fixed repeat count; `None` calibrates per size.
    pub repeat: Option<u32>,
    pub perturbation: usize,
    pub trials: u32,
    pub cache: bool,
    pub streaming: bool,
    pub bidirectional: bool,
    pub reset_between_trials: bool,
    pub integrity: bool,
    pub random_sizes: bool,
    pub alignment: usize,
    pub send_offset: usize,
    pub recv_offset: usize,
    /// Socket send/receive buffer size; `None` or 0 keeps system defaults.
    pub socket_buffer: Option<usize>,
    pub calibration_target_ms: u64,
}

impl Default for BenchSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            lower: 1,
            upper: DEFAULT_UPPER,
            repeat: None,
            perturbation: DEFAULT_PERTURBATION,
            trials: DEFAULT_TRIALS,
            cache: true,
            streaming: false,
            bidirectional: false,
            reset_between_trials: false,
            integrity: false,
            random_sizes: false,
            alignment: DEFAULT_ALIGNMENT,
            send_offset: 0,
            recv_offset: 0,
            socket_buffer: None,
            calibration_target_ms: DEFAULT_CALIBRATION_TARGET_MS,
        }
    }
}

impl BenchSettings {
    /// Same settings with a different target host (and therefore role).
    pub fn with_host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }
}

/// Validated, immutable per-run configuration.
#[derive(Debug, Clone, Serialize)]
pub struct BenchConfig {
    pub role: Role,
    pub host: Option<String>,
    pub port: Port,
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
    pub calibration_target: Duration,
}

impl BenchConfig {
    /// Ping-pong runs wait for the echo; streaming runs do not.
    pub fn is_ping_pong(&self) -> bool {
        !self.streaming
    }
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load settings from a YAML file without validating them.
    ///
    /// CLI flags are layered on top of the result before validation.
    pub fn load_settings_file(path: impl AsRef<Path>) -> NetpipeResult<BenchSettings> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(NetpipeError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| NetpipeError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_settings_string(&content)
    }

    /// Parse settings from a YAML string without validating them.
    pub fn load_settings_string(content: &str) -> NetpipeResult<BenchSettings> {
        serde_yaml::from_str(content).map_err(|e| NetpipeError::ConfigParse {
            message: format!("YAML parse error: {}", e),
        })
    }

    /// Load and validate a configuration file.
    pub fn load_file(path: impl AsRef<Path>) -> NetpipeResult<BenchConfig> {
        let settings = Self::load_settings_file(path)?;
        Ok(Self::validate(settings)?)
    }

    /// Load and validate a YAML string.
    pub fn load_string(content: &str) -> NetpipeResult<BenchConfig> {
        let settings = Self::load_settings_string(content)?;
        Ok(Self::validate(settings)?)
    }

    /// Validate settings and convert them to a [`BenchConfig`].
    pub fn validate(settings: BenchSettings) -> Result<BenchConfig, ConfigError> {
        let port = Port::new(settings.port)?;

        if settings.streaming && settings.bidirectional {
            return Err(ConfigError::ConflictingModes {
                first: "streaming",
                second: "bidirectional",
                reason: "You can't stream in one direction and pass data in both".to_string(),
            });
        }

        if settings.trials == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "trials",
                value: "0".to_string(),
                reason: "At least one trial per size is required".to_string(),
            });
        }

        let repeat = match settings.repeat {
            Some(0) => {
                return Err(ConfigError::InvalidFieldValue {
                    field: "repeat",
                    value: "0".to_string(),
                    reason: "Repeat count must be greater than 0".to_string(),
                });
            }
            Some(count) => RepeatPolicy::Fixed(count),
            None => RepeatPolicy::Calibrated,
        };

        if repeat == RepeatPolicy::Calibrated && settings.calibration_target_ms == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "calibration_target_ms",
                value: "0".to_string(),
                reason: "Calibration needs a positive target time".to_string(),
            });
        }

        if let Some(host) = settings.host.as_deref() {
            if host.trim().is_empty() {
                return Err(ConfigError::InvalidFieldValue {
                    field: "host",
                    value: host.to_string(),
                    reason: "Host cannot be empty".to_string(),
                });
            }
        }

        // Integrity data needs at least one whole integer plus a trailing byte,
        // and every message must be exactly the size both ends expect.
        let (lower, perturbation) = if settings.integrity {
            (settings.lower.max(MIN_INTEGRITY_BYTES), 0)
        } else {
            (settings.lower, settings.perturbation)
        };
        let range = SizeRange::new(lower, settings.upper)?;

        // Back-to-back streaming runs collapse the protocol window unless the
        // connection is rebuilt between trials.
        let reset_between_trials = settings.reset_between_trials || settings.streaming;

        let socket_buffer = settings.socket_buffer.filter(|&size| size > 0);

        if settings.alignment > MAX_ALIGNMENT {
            return Err(ConfigError::InvalidFieldValue {
                field: "alignment",
                value: settings.alignment.to_string(),
                reason: format!("Must not exceed {} bytes", MAX_ALIGNMENT),
            });
        }

        for (field, offset) in [
            ("send_offset", settings.send_offset),
            ("recv_offset", settings.recv_offset),
        ] {
            if offset > MAX_MESSAGE_BYTES {
                return Err(ConfigError::InvalidFieldValue {
                    field,
                    value: offset.to_string(),
                    reason: format!("Must not exceed {} bytes", MAX_MESSAGE_BYTES),
                });
            }
        }

        Ok(BenchConfig {
            role: Role::from_host(settings.host.as_deref()),
            host: settings.host,
            port,
            range,
            repeat,
            perturbation,
            trials: settings.trials,
            cache: CacheMode::from_flag(settings.cache),
            streaming: settings.streaming,
            bidirectional: settings.bidirectional,
            reset_between_trials,
            integrity: settings.integrity,
            random_sizes: settings.random_sizes,
            alignment: settings.alignment,
            offsets: BufferOffsets::new(settings.send_offset, settings.recv_offset),
            socket_buffer,
            calibration_target: Duration::from_millis(settings.calibration_target_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_CONFIG: &str = r#"
host: node2
port: 6000
lower: 1
upper: 1048576
repeat: 50
cache: false
send_offset: 1
recv_offset: 3
"#;

    #[test]
    fn test_valid_config() {
        let config = ConfigLoader::load_string(VALID_CONFIG).unwrap();
        assert_eq!(config.role, Role::Transmitter);
        assert_eq!(config.port.value(), 6000);
        assert_eq!(config.range.upper(), 1_048_576);
        assert_eq!(config.repeat, RepeatPolicy::Fixed(50));
        assert_eq!(config.cache, CacheMode::Uncached);
        assert_eq!(config.offsets, BufferOffsets::new(1, 3));
    }

    #[test]
    fn test_defaults_applied() {
        let config = ConfigLoader::load_string("{}").unwrap();
        assert_eq!(config.role, Role::Receiver);
        assert_eq!(config.port.value(), DEFAULT_PORT);
        assert_eq!(config.range.lower(), 1);
        assert_eq!(config.range.upper(), DEFAULT_UPPER);
        assert_eq!(config.repeat, RepeatPolicy::Calibrated);
        assert_eq!(config.perturbation, DEFAULT_PERTURBATION);
        assert_eq!(config.trials, DEFAULT_TRIALS);
        assert_eq!(config.cache, CacheMode::Cached);
        assert_eq!(config.alignment, DEFAULT_ALIGNMENT);
        assert!(config.is_ping_pong());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ConfigLoader::load_string("lowr: 4\n");
        assert!(matches!(result, Err(NetpipeError::ConfigParse { .. })));
    }

    #[test]
    fn test_start_above_end() {
        let yaml = "lower: 4096\nupper: 16\n";
        let result = ConfigLoader::load_string(yaml);
        assert!(matches!(
            result,
            Err(NetpipeError::Config(ConfigError::InvalidSizeRange { .. }))
        ));
    }

    #[test]
    fn test_zero_lower_rejected() {
        assert!(ConfigLoader::load_string("lower: 0\n").is_err());
    }

    #[test]
    fn test_streaming_and_bidirectional_conflict() {
        let settings = BenchSettings {
            streaming: true,
            bidirectional: true,
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(settings),
            Err(ConfigError::ConflictingModes { .. })
        ));
    }

    #[test]
    fn test_streaming_forces_reset() {
        let settings = BenchSettings {
            streaming: true,
            ..Default::default()
        };
        let config = ConfigLoader::validate(settings).unwrap();
        assert!(config.reset_between_trials);
        assert!(!config.is_ping_pong());
    }

    #[test]
    fn test_integrity_adjusts_sweep() {
        let settings = BenchSettings {
            integrity: true,
            lower: 1,
            upper: 64,
            perturbation: 7,
            ..Default::default()
        };
        let config = ConfigLoader::validate(settings).unwrap();
        assert_eq!(config.range.lower(), MIN_INTEGRITY_BYTES);
        assert_eq!(config.perturbation, 0);
    }

    #[test]
    fn test_zero_repeat_rejected() {
        let settings = BenchSettings {
            repeat: Some(0),
            ..Default::default()
        };
        assert!(ConfigLoader::validate(settings).is_err());
    }

    #[test]
    fn test_zero_trials_rejected() {
        let settings = BenchSettings {
            trials: 0,
            ..Default::default()
        };
        assert!(ConfigLoader::validate(settings).is_err());
    }

    #[test]
    fn test_zero_port_rejected() {
        assert!(ConfigLoader::load_string("port: 0\n").is_err());
    }

    #[test]
    fn test_oversized_alignment_rejected() {
        let settings = BenchSettings {
            alignment: MAX_ALIGNMENT + 1,
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(settings),
            Err(ConfigError::InvalidFieldValue {
                field: "alignment",
                ..
            })
        ));

        let settings = BenchSettings {
            alignment: MAX_ALIGNMENT,
            ..Default::default()
        };
        assert!(ConfigLoader::validate(settings).is_ok());
    }

    #[test]
    fn test_oversized_send_offset_rejected() {
        let settings = BenchSettings {
            send_offset: usize::MAX,
            upper: 1024,
            repeat: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(settings),
            Err(ConfigError::InvalidFieldValue {
                field: "send_offset",
                ..
            })
        ));
    }

    #[test]
    fn test_oversized_recv_offset_rejected() {
        let settings = BenchSettings {
            recv_offset: MAX_MESSAGE_BYTES + 1,
            ..Default::default()
        };
        assert!(matches!(
            ConfigLoader::validate(settings),
            Err(ConfigError::InvalidFieldValue {
                field: "recv_offset",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_socket_buffer_keeps_defaults() {
        let config = ConfigLoader::load_string("socket_buffer: 0\n").unwrap();
        assert_eq!(config.socket_buffer, None);
    }

    #[test]
    fn test_with_host_switches_role() {
        let settings = BenchSettings::default().with_host(Some("127.0.0.1".to_string()));
        let config = ConfigLoader::validate(settings).unwrap();
        assert_eq!(config.role, Role::Transmitter);
    }

    #[test]
    fn test_missing_file() {
        let result = ConfigLoader::load_file("/nonexistent/netpipe.yaml");
        assert!(matches!(result, Err(NetpipeError::ConfigNotFound { .. })));
    }
}
