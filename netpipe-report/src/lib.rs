// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Netpipe Reporting
//!
//! Turns per-size sweep results into the line-oriented result stream and
//! into JSON reports that carry the host description, the effective
//! settings and the spread of the trial times.

pub mod metrics;
pub mod reporter;

pub use metrics::{RunSettings, SizeRecord, SweepReport, SystemInfo, ThroughputMetrics, TrialStats};
pub use reporter::{format_line, JsonReporter, LogSink, ReporterError, ResultStream};
