//! Operation reports returned by the dispatcher

use super::request::OperationKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    /// Finished, but some items failed
    Partial,
    Failed,
}

impl OperationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Partial => "partial",
            OperationStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one dispatched operation
#[derive(Debug, Clone, Serialize)]
pub struct OperationReport {
    pub operation: OperationKind,
    pub status: OperationStatus,
    pub dry_run: bool,
    /// Human-readable output, in order
    pub lines: Vec<String>,
    pub counts: BTreeMap<String, usize>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl OperationReport {
    pub fn new(operation: OperationKind, dry_run: bool) -> Self {
        Self {
            operation,
            status: OperationStatus::Success,
            dry_run,
            lines: Vec::new(),
            counts: BTreeMap::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Append a line; dry-run reports tag every line
    pub fn line(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.dry_run {
            self.lines.push(format!("[DRY RUN] {line}"));
        } else {
            self.lines.push(line);
        }
    }

    pub fn count(&mut self, key: &str, n: usize) {
        *self.counts.entry(key.to_string()).or_default() += n;
    }

    pub fn get(&self, key: &str) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Downgrade to partial when any item failed
    pub fn partial_if(&mut self, failed: bool) {
        if failed && self.status == OperationStatus::Success {
            self.status = OperationStatus::Partial;
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == OperationStatus::Success
    }

    /// One-line summary for logs and notifications
    pub fn summary(&self) -> String {
        let counts: Vec<String> = self
            .counts
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        format!("{} {} ({})", self.operation, self.status, counts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_lines_tagged() {
        let mut report = OperationReport::new(OperationKind::Cleanup, true);
        report.line("would delete compute/svc-1");
        assert_eq!(report.lines, ["[DRY RUN] would delete compute/svc-1"]);
    }

    #[test]
    fn test_partial_and_summary() {
        let mut report = OperationReport::new(OperationKind::Health, false);
        report.count("healthy", 2);
        report.count("erroring", 1);
        report.partial_if(true);
        let report = report.finish();
        assert_eq!(report.status, OperationStatus::Partial);
        assert_eq!(report.summary(), "health partial (erroring=1, healthy=2)");
        assert!(report.finished_at.is_some());
    }
}
