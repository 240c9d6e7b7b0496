// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers and small enums for validated benchmark inputs.
//!
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest message size the sweep accepts: 1 GiB.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024 * 1024;

/// Which side of the exchange this process plays.
///
/// Fixed for the lifetime of the process. The side that was given a target
/// host initiates every exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Transmitter,
    Receiver,
}

impl Role {
    /// Presence of a target host identifies the initiator.
    pub fn from_host(host: Option<&str>) -> Self {
        match host {
            Some(_) => Role::Transmitter,
            None => Role::Receiver,
        }
    }

    pub fn is_transmitter(self) -> bool {
        matches!(self, Role::Transmitter)
    }

    /// 0 for the receiver, 1 for the transmitter. Used to seed the sentinel
    /// byte so the two sides rest on different values.
    pub fn tag(self) -> u8 {
        match self {
            Role::Transmitter => 1,
            Role::Receiver => 0,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Transmitter => write!(f, "transmitter"),
            Role::Receiver => write!(f, "receiver"),
        }
    }
}

/// Whether benchmark buffers stay warm between repetitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// One shared region, fixed pointers, data stays cache resident.
    Cached,
    /// Distinct send/receive regions, pointers walk the pool and a scratch
    /// region is flushed before every trial.
    Uncached,
}

impl CacheMode {
    pub fn from_flag(use_cache: bool) -> Self {
        if use_cache {
            CacheMode::Cached
        } else {
            CacheMode::Uncached
        }
    }

    pub fn is_cached(self) -> bool {
        matches!(self, CacheMode::Cached)
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::Cached => write!(f, "cached"),
            CacheMode::Uncached => write!(f, "uncached"),
        }
    }
}

/// How many ping-pongs make up one timed trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Same count for every size, known to both sides.
    Fixed(u32),
    /// Transmitter times a short burst and hands the derived count to the
    /// receiver.
    Calibrated,
}

/// Inclusive message-size range of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeRange {
    lower: usize,
    upper: usize,
}

impl SizeRange {
    /// Create a new range with validation.
    pub fn new(lower: usize, upper: usize) -> Result<Self, ConfigError> {
        if lower == 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "lower",
                value: lower.to_string(),
                reason: "Need a starting value >= 1".to_string(),
            });
        }

        if lower > upper {
            return Err(ConfigError::InvalidSizeRange { lower, upper });
        }

        if upper > MAX_MESSAGE_BYTES {
            return Err(ConfigError::InvalidFieldValue {
                field: "upper",
                value: upper.to_string(),
                reason: format!("Must not exceed {} bytes", MAX_MESSAGE_BYTES),
            });
        }

        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> usize {
        self.lower
    }

    pub fn upper(&self) -> usize {
        self.upper
    }

    pub fn contains(&self, size: usize) -> bool {
        (self.lower..=self.upper).contains(&size)
    }
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// Byte offsets applied independently to the send and receive buffers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferOffsets {
    pub send: usize,
    pub recv: usize,
}

impl BufferOffsets {
    pub fn new(send: usize, recv: usize) -> Self {
        Self { send, recv }
    }

    /// The larger of the two offsets.
    pub fn max(&self) -> usize {
        self.send.max(self.recv)
    }
}

/// Validated TCP port.
/// Must be in range 1-65535 (0 is reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Port(u16);

impl Port {
    /// Create a new Port with validation.
    pub fn new(port: u16) -> Result<Self, ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort {
                port,
                reason: "Port 0 is reserved and cannot be used".to_string(),
            });
        }
        Ok(Self(port))
    }

    /// Get the inner port value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for Port {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Port> for u16 {
    fn from(port: Port) -> Self {
        port.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_host() {
        assert_eq!(Role::from_host(Some("node2")), Role::Transmitter);
        assert_eq!(Role::from_host(None), Role::Receiver);
        assert_eq!(Role::Transmitter.tag(), 1);
        assert_eq!(Role::Receiver.tag(), 0);
    }

    #[test]
    fn test_size_range_validation() {
        assert!(SizeRange::new(1, 1024).is_ok());
        assert!(SizeRange::new(64, 64).is_ok());
        assert!(SizeRange::new(0, 1024).is_err());
        assert!(matches!(
            SizeRange::new(2048, 1024),
            Err(ConfigError::InvalidSizeRange {
                lower: 2048,
                upper: 1024
            })
        ));
        assert!(SizeRange::new(1, MAX_MESSAGE_BYTES + 1).is_err());
    }

    #[test]
    fn test_size_range_contains() {
        let range = SizeRange::new(4, 16).unwrap();
        assert!(range.contains(4));
        assert!(range.contains(16));
        assert!(!range.contains(3));
        assert!(!range.contains(17));
    }

    #[test]
    fn test_port_zero_rejected() {
        assert!(Port::new(0).is_err());
        assert_eq!(Port::new(5002).unwrap().value(), 5002);
    }

    #[test]
    fn test_offsets_max() {
        assert_eq!(BufferOffsets::new(1, 3).max(), 3);
        assert_eq!(BufferOffsets::default().max(), 0);
    }
}
