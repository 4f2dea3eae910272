use std::fmt;
use std::time::{Duration, Instant};

use crate::error::CleanupError;

/// Outcome of a single undo action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum UndoStatus {
    /// The undo action completed successfully.
    Undone,
    /// The undo action returned an error.
    Failed,
    /// The undo action panicked. The drain carried on with the next action.
    Panicked,
}

/// What running one undo action produced.
#[derive(Debug)]
pub enum UndoOutcome<E> {
    Undone,
    Failed(E),
    /// Panic payload rendered as text.
    Panicked(String),
}

/// Record of one undo action invoked during a drain.
#[derive(Debug)]
pub struct UndoRecord<E> {
    /// Name of the undo action.
    pub name: String,
    /// Description of what the undo action does.
    pub description: String,
    /// Zero-based position at which the action was registered.
    pub position: usize,
    /// When the undo action started.
    pub started_at: Instant,
    /// When the undo action returned.
    pub completed_at: Instant,
    pub outcome: UndoOutcome<E>,
}

impl<E> UndoRecord<E> {
    #[must_use]
    pub fn status(&self) -> UndoStatus {
        match self.outcome {
            UndoOutcome::Undone => UndoStatus::Undone,
            UndoOutcome::Failed(_) => UndoStatus::Failed,
            UndoOutcome::Panicked(_) => UndoStatus::Panicked,
        }
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.completed_at.saturating_duration_since(self.started_at)
    }

    #[must_use]
    pub fn error(&self) -> Option<&E> {
        match &self.outcome {
            UndoOutcome::Failed(error) => Some(error),
            UndoOutcome::Undone | UndoOutcome::Panicked(_) => None,
        }
    }

    /// Panic message, if the undo action panicked.
    #[must_use]
    pub fn panic_message(&self) -> Option<&str> {
        match &self.outcome {
            UndoOutcome::Panicked(message) => Some(message),
            UndoOutcome::Undone | UndoOutcome::Failed(_) => None,
        }
    }
}

/// Outcomes of every undo action run by one drain, in invocation order.
#[derive(Debug)]
pub struct DrainReport<E> {
    records: Vec<UndoRecord<E>>,
}

impl<E> Default for DrainReport<E> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<E> DrainReport<E> {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, record: UndoRecord<E>) {
        self.records.push(record);
    }

    /// All records, first invoked first.
    #[must_use]
    pub fn records(&self) -> &[UndoRecord<E>] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Names of the undo actions in the order they were invoked.
    #[must_use]
    pub fn invocation_order(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    /// `true` when every undo action succeeded (or nothing was drained).
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.records.iter().all(|r| r.status() == UndoStatus::Undone)
    }

    /// Records that failed or panicked.
    pub fn failures(&self) -> impl Iterator<Item = &UndoRecord<E>> {
        self.records
            .iter()
            .filter(|r| r.status() != UndoStatus::Undone)
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// Consume the report, keeping the errors returned by failed undo actions.
    ///
    /// Panicked actions carry no error value; see [`UndoRecord::panic_message`].
    #[must_use]
    pub fn into_errors(self) -> Vec<CleanupError<E>> {
        self.records
            .into_iter()
            .filter_map(|record| match record.outcome {
                UndoOutcome::Failed(error) => Some(CleanupError {
                    step: record.name,
                    description: record.description,
                    error,
                }),
                UndoOutcome::Undone | UndoOutcome::Panicked(_) => None,
            })
            .collect()
    }

    /// One line per undo action: `↩` undone, `⚠` failed, `✗` panicked.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for record in &self.records {
            let status = match record.status() {
                UndoStatus::Undone => "↩",
                UndoStatus::Failed => "⚠",
                UndoStatus::Panicked => "✗",
            };
            lines.push(format!("{status} {}", record.name));
        }
        lines.join("\n")
    }
}

impl<E: fmt::Display> fmt::Display for DrainReport<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, record) in self.records.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match &record.outcome {
                UndoOutcome::Undone => write!(f, "↩ {} ({})", record.name, record.description)?,
                UndoOutcome::Failed(e) => {
                    write!(f, "⚠ {} ({}): {e}", record.name, record.description)?;
                }
                UndoOutcome::Panicked(message) => write!(
                    f,
                    "✗ {} ({}): panicked: {message}",
                    record.name, record.description
                )?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, position: usize, result: Result<(), String>) -> UndoRecord<String> {
        with_outcome(
            name,
            position,
            match result {
                Ok(()) => UndoOutcome::Undone,
                Err(e) => UndoOutcome::Failed(e),
            },
        )
    }

    fn with_outcome(name: &str, position: usize, outcome: UndoOutcome<String>) -> UndoRecord<String> {
        let now = Instant::now();
        UndoRecord {
            name: name.to_string(),
            description: format!("undo {name}"),
            position,
            started_at: now,
            completed_at: now,
            outcome,
        }
    }

    #[test]
    fn new_report_is_empty_and_clean() {
        let report = DrainReport::<String>::new();

        assert!(report.is_empty());
        assert!(report.is_clean());
        assert_eq!(report.failure_count(), 0);
        assert_eq!(report.summary(), "");
    }

    #[test]
    fn invocation_order_follows_push_order() {
        let mut report = DrainReport::new();
        report.push(record("nic", 2, Ok(())));
        report.push(record("subnet", 1, Ok(())));
        report.push(record("vnet", 0, Ok(())));

        assert_eq!(report.invocation_order(), vec!["nic", "subnet", "vnet"]);
    }

    #[test]
    fn failures_only_yields_failed_records() {
        let mut report = DrainReport::new();
        report.push(record("subnet", 1, Err("in use".to_string())));
        report.push(record("vnet", 0, Ok(())));

        let failed: Vec<_> = report.failures().map(|r| r.name.as_str()).collect();

        assert_eq!(failed, vec!["subnet"]);
        assert!(!report.is_clean());
        assert_eq!(report.records()[0].status(), UndoStatus::Failed);
        assert_eq!(report.records()[1].status(), UndoStatus::Undone);
    }

    #[test]
    fn into_errors_preserves_step_and_source() {
        let mut report = DrainReport::new();
        report.push(record("subnet", 1, Err("in use".to_string())));
        report.push(record("vnet", 0, Ok(())));

        let errors = report.into_errors();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].step, "subnet");
        assert_eq!(errors[0].description, "undo subnet");
        assert_eq!(errors[0].error, "in use");
    }

    #[test]
    fn summary_marks_undone_and_failed() {
        let mut report = DrainReport::new();
        report.push(record("nic", 1, Err("busy".to_string())));
        report.push(record("vnet", 0, Ok(())));

        let summary = report.summary();

        assert!(summary.contains("⚠ nic"));
        assert!(summary.contains("↩ vnet"));
    }

    #[test]
    fn display_includes_error_text() {
        let mut report = DrainReport::new();
        report.push(record("nic", 0, Err("busy".to_string())));

        assert_eq!(report.to_string(), "⚠ nic (undo nic): busy");
    }

    #[test]
    fn panicked_record_counts_as_failure_without_error() {
        let mut report = DrainReport::new();
        report.push(with_outcome("vnet", 1, UndoOutcome::Panicked("boom".to_string())));
        report.push(record("rg", 0, Ok(())));

        assert!(!report.is_clean());
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.records()[0].status(), UndoStatus::Panicked);
        assert_eq!(report.records()[0].panic_message(), Some("boom"));
        assert!(report.records()[0].error().is_none());
        assert_eq!(report.summary(), "✗ vnet\n↩ rg");
        assert!(report.into_errors().is_empty());
    }

    #[test]
    fn display_includes_panic_message() {
        let mut report = DrainReport::new();
        report.push(with_outcome("nic", 0, UndoOutcome::Panicked("boom".to_string())));

        assert_eq!(report.to_string(), "✗ nic (undo nic): panicked: boom");
    }
}
