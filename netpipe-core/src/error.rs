// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for netpipe.
//!
//! Every failure class of the benchmark is an explicit enum variant.
//! None of them are recoverable: a benchmark that lost its buffers, its peer
//! or its data integrity cannot produce valid numbers, so callers propagate
//! these up to the process boundary and exit nonzero.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the benchmark.
#[derive(Debug, Error)]
pub enum NetpipeError {
    // =========================================================================
    // Configuration Errors - Detected Before Any Measurement
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Resource Exhaustion - No Retry Under Memory Pressure
    // =========================================================================
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    // =========================================================================
    // Transport Failures - A Broken Connection Invalidates Timing
    // =========================================================================
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    // =========================================================================
    // Integrity Failures - Correctness Mode, Any Mismatch Is Fatal
    // =========================================================================
    #[error("Integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    // =========================================================================
    // Energy Sampler Errors
    // =========================================================================
    #[error("Energy sampler error: {0}")]
    Energy(#[from] EnergyError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid or conflicting benchmark settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid size range: lower {lower} must not exceed upper {upper}")]
    InvalidSizeRange { lower: usize, upper: usize },

    #[error("Conflicting modes: {first} and {second} - {reason}")]
    ConflictingModes {
        first: &'static str,
        second: &'static str,
        reason: String,
    },

    #[error("Invalid port: {port} - {reason}")]
    InvalidPort { port: u16, reason: String },
}

/// Buffer pool and scratch region failures.
#[derive(Debug, Error)]
pub enum BufferError {
    #[error("Couldn't allocate {bytes} bytes for {region} buffer")]
    AllocationFailed { bytes: usize, region: &'static str },

    #[error("Block of {block} bytes does not fit a {region} region of {capacity} bytes")]
    BlockTooLarge {
        block: usize,
        capacity: usize,
        region: &'static str,
    },
}

/// Transport and control-frame failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to {addr} after {attempts} attempts: {source}")]
    Connect {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to accept connection: {source}")]
    Accept {
        #[source]
        source: std::io::Error,
    },

    #[error("Send of {len} bytes failed: {source}")]
    Send {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Receive of {len} bytes failed: {source}")]
    Recv {
        len: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Peer closed the connection while {expected} bytes were expected")]
    PeerClosed { expected: usize },

    #[error("Message length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Failed to set socket option {option}: {reason}")]
    SocketOption { option: &'static str, reason: String },

    #[error("Control frame checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Unexpected control frame: expected {expected}, got {actual}")]
    UnexpectedFrame { expected: &'static str, actual: String },

    #[error("Sync generation mismatch: local {local}, peer {peer}")]
    SyncSkew { local: u32, peer: u32 },
}

/// Integrity-mode data mismatch.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Expecting {expected} but received {actual} at byte offset {offset}")]
    Mismatch {
        offset: usize,
        expected: i32,
        actual: i32,
    },
}

/// RAPL register sampler failures.
#[derive(Debug, Error)]
pub enum EnergyError {
    #[error("Failed to read CPU description {path}: {source}")]
    CpuInfo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported CPU: {vendor} family {family} model {model}")]
    UnsupportedCpu {
        vendor: String,
        family: u32,
        model: u32,
    },

    #[error("No CPU packages detected under {path}")]
    NoPackages { path: PathBuf },

    #[error("Package index {index} out of range ({total} packages)")]
    PackageOutOfRange { index: usize, total: usize },

    #[error("Failed to open MSR device for CPU {cpu}: {source}")]
    MsrOpen {
        cpu: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read MSR {register:#x} on CPU {cpu}: {source}")]
    MsrRead {
        cpu: usize,
        register: u64,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using NetpipeError.
pub type NetpipeResult<T> = Result<T, NetpipeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ConflictingModes {
            first: "streaming",
            second: "bidirectional",
            reason: "both ends would only send".to_string(),
        };
        assert!(err.to_string().contains("streaming"));
        assert!(err.to_string().contains("bidirectional"));
    }

    #[test]
    fn test_error_chain() {
        let err = ConfigError::InvalidSizeRange {
            lower: 10,
            upper: 1,
        };
        let top: NetpipeError = err.into();
        assert!(matches!(top, NetpipeError::Config(_)));
    }

    #[test]
    fn test_integrity_error_reports_offset() {
        let err = IntegrityError::Mismatch {
            offset: 12,
            expected: 3,
            actual: 99,
        };
        let text = err.to_string();
        assert!(text.contains("Expecting 3"));
        assert!(text.contains("received 99"));
        assert!(text.contains("offset 12"));
    }
}
