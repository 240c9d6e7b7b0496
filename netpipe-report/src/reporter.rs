// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Result stream and JSON report files.
//!
//! The result stream is the classic one-line-per-size output: total bytes,
//! throughput in Mbps and a reserved latency column. Sweep reports are saved
//! as timestamped JSON files for later comparison.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use netpipe_core::trial::{ResultSink, SizeResult};
use netpipe_core::{NetpipeError, NetpipeResult, Role};

use crate::metrics::SweepReport;

/// Errors that can occur during report generation.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("Failed to access report directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Render one result line.
pub fn format_line(result: &SizeResult) -> String {
    if result.verified {
        format!("{:>8} verified", result.total_bytes)
    } else {
        format!(
            "{:>8} {:>8.2} {:>12.8}",
            result.total_bytes, result.mbps, result.latency_detail
        )
    }
}

/// Writes one line per size and optionally collects a [`SweepReport`].
pub struct ResultStream<W: Write> {
    writer: W,
    report: Option<SweepReport>,
}

impl<W: Write> ResultStream<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            report: None,
        }
    }

    /// Also record every result into `report`.
    pub fn with_report(mut self, report: SweepReport) -> Self {
        self.report = Some(report);
        self
    }

    /// Flush the stream and hand back the collected report, if any.
    pub fn finish(mut self) -> NetpipeResult<Option<SweepReport>> {
        self.writer.flush().map_err(|source| NetpipeError::Io {
            context: "flushing result stream",
            source,
        })?;
        Ok(self.report)
    }
}

impl<W: Write> ResultSink for ResultStream<W> {
    fn record(&mut self, result: &SizeResult) -> NetpipeResult<()> {
        writeln!(self.writer, "{}", format_line(result))
            .and_then(|()| self.writer.flush())
            .map_err(|source| NetpipeError::Io {
                context: "writing result line",
                source,
            })?;

        if let Some(report) = self.report.as_mut() {
            report.add_result(result);
        }
        Ok(())
    }
}

/// Sink for the role that does not own the output: results only go to
/// the log.
pub struct LogSink {
    role: Role,
    recorded: usize,
}

impl LogSink {
    pub fn new(role: Role) -> Self {
        Self { role, recorded: 0 }
    }

    pub fn recorded(&self) -> usize {
        self.recorded
    }
}

impl ResultSink for LogSink {
    fn record(&mut self, result: &SizeResult) -> NetpipeResult<()> {
        self.recorded += 1;
        tracing::debug!(
            role = %self.role,
            size = %result.point,
            line = %format_line(result),
            "Result"
        );
        Ok(())
    }
}

/// JSON reporter for sweep reports.
pub struct JsonReporter {
    /// Output directory for report files
    output_dir: PathBuf,
}

impl JsonReporter {
    /// Create a new JSON reporter with the specified output directory.
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self, ReporterError> {
        let output_dir = output_dir.as_ref().to_path_buf();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    /// Save a report as `netpipe_<timestamp>.json`.
    ///
    /// Returns the path to the created file.
    pub fn save(&self, report: &SweepReport) -> Result<PathBuf, ReporterError> {
        let timestamp = report.timestamp.format("%Y-%m-%dT%H-%M-%S%.3fZ");
        let filename = format!("netpipe_{}.json", timestamp);
        let filepath = self.output_dir.join(&filename);

        let file = File::create(&filepath)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, report)?;

        tracing::info!(path = %filepath.display(), "Saved sweep report");
        Ok(filepath)
    }

    /// List all existing report files in the output directory.
    pub fn list_reports(&self) -> Result<Vec<PathBuf>, ReporterError> {
        let mut reports = Vec::new();
        for entry in fs::read_dir(&self.output_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                reports.push(path);
            }
        }
        reports.sort();
        Ok(reports)
    }

    /// Load an existing report from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<SweepReport, ReporterError> {
        let file = File::open(path)?;
        let report = serde_json::from_reader(file)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netpipe_core::trial::SizePoint;
    use netpipe_core::{BenchSettings, ConfigLoader};
    use std::time::Duration;
    use tempfile::TempDir;

    fn result(len: usize, mbps: f64) -> SizeResult {
        SizeResult {
            point: SizePoint::Fixed(len),
            repeat: 10,
            total_bytes: 10 * len as u64,
            one_way: Duration::from_micros(25),
            trial_times: vec![Duration::from_micros(25)],
            mbps,
            latency_detail: 0.0,
            verified: false,
        }
    }

    fn report() -> SweepReport {
        let config = ConfigLoader::validate(BenchSettings::default()).unwrap();
        SweepReport::new(&config)
    }

    #[test]
    fn test_line_format() {
        assert_eq!(
            format_line(&result(1024, 312.5)),
            "   10240   312.50   0.00000000"
        );

        let mut verified = result(64, 0.0);
        verified.verified = true;
        assert_eq!(format_line(&verified), "     640 verified");
    }

    #[test]
    fn test_result_stream_writes_lines() {
        let mut stream = ResultStream::new(Vec::new());
        stream.record(&result(1, 0.5)).unwrap();
        stream.record(&result(2, 1.0)).unwrap();

        let text = String::from_utf8(stream.writer.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].trim_start().starts_with("10 "));
        assert!(lines[1].trim_start().starts_with("20 "));
        assert!(stream.finish().unwrap().is_none());
    }

    #[test]
    fn test_result_stream_collects_report() {
        let mut stream = ResultStream::new(Vec::new()).with_report(report());
        stream.record(&result(8, 2.0)).unwrap();
        let collected = stream.finish().unwrap().unwrap();
        assert_eq!(collected.results.len(), 1);
        assert_eq!(collected.results[0].bytes, Some(8));
    }

    #[test]
    fn test_log_sink_counts() {
        let mut sink = LogSink::new(Role::Receiver);
        sink.record(&result(4, 1.0)).unwrap();
        assert_eq!(sink.recorded(), 1);
    }

    #[test]
    fn test_reporter_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path()).unwrap();

        let mut report = report();
        report.add_result(&result(1024, 100.0));

        let path = reporter.save(&report).unwrap();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("netpipe_"));

        let loaded = JsonReporter::load(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.results[0].bytes, Some(1024));
        assert_eq!(loaded.settings, report.settings);
    }

    #[test]
    fn test_list_reports() {
        let temp_dir = TempDir::new().unwrap();
        let reporter = JsonReporter::new(temp_dir.path()).unwrap();

        reporter.save(&report()).unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let reports = reporter.list_reports().unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            JsonReporter::load("/nonexistent/netpipe_report.json"),
            Err(ReporterError::Io(_))
        ));
    }
}
