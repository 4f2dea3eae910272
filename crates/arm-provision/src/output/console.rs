use std::io::{self, Write};

use provision_core::{ResourceAddress, ResourceId};
use provision_ledger::DrainReport;
use provision_operations::OperationError;
use provision_operations::traits::{EventSink, ProvisionedResource};
use tracing::warn;

/// Prints a confirmation for every created and deleted resource to stdout.
///
/// Write failures (a closed pipe) are logged and otherwise ignored.
pub(crate) struct ConsoleSink;

impl EventSink for ConsoleSink {
    fn resource_created(&self, resource: &ProvisionedResource) {
        emit(&created_message(resource));
    }

    fn resource_deleted(&self, address: &ResourceAddress, id: &ResourceId) {
        emit(&deleted_message(address, id));
    }
}

fn emit(message: &str) {
    if let Err(error) = write_line(&mut io::stdout().lock(), message) {
        warn!(%error, "could not write to stdout");
    }
}

fn write_line(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "{message}")?;
    out.flush()
}

fn created_message(resource: &ProvisionedResource) -> String {
    let snapshot = serde_json::to_string_pretty(&resource.snapshot)
        .unwrap_or_else(|_| resource.snapshot.to_string());
    format!("{} '{}' created:\n{snapshot}", resource.kind, resource.id)
}

fn deleted_message(address: &ResourceAddress, id: &ResourceId) -> String {
    format!("{} '{id}' deleted.", address.kind)
}

pub(crate) fn print_cleanup(report: &DrainReport<OperationError>) {
    if report.is_empty() {
        return;
    }
    emit(&format!("\nCleanup:\n{report}"));
    if report.is_clean() {
        return;
    }
    let warning = format!(
        "warning: {} of {} cleanup actions failed; some resources may still exist",
        report.failure_count(),
        report.len()
    );
    if let Err(error) = write_line(&mut io::stderr(), &warning) {
        warn!(%error, "could not write to stderr");
    }
}
