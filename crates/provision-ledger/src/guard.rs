use std::fmt::Display;
use std::ops::{Deref, DerefMut};

use tracing::{info, warn};

use crate::ledger::Ledger;
use crate::report::{DrainReport, UndoOutcome};

/// Scoped guarantee that a ledger is drained when the session ends.
///
/// The guard owns the ledger together with the context its undo actions
/// run against. Call [`DrainGuard::finish`] to drain explicitly and keep
/// the report; on every other exit path (early return, `?`, unwinding
/// panic) the ledger is drained when the guard is dropped and each outcome
/// is logged.
pub struct DrainGuard<Ctx, Err: Display> {
    ledger: Ledger<Ctx, Err>,
    ctx: Ctx,
    finished: bool,
}

impl<Ctx, Err: Display> DrainGuard<Ctx, Err> {
    /// Create a guard over an empty ledger.
    ///
    /// `ctx` is the context handed to undo actions during the drain. It
    /// should not share cancellation state with the forward pass.
    #[must_use]
    pub fn new(ctx: Ctx) -> Self {
        Self {
            ledger: Ledger::new(),
            ctx,
            finished: false,
        }
    }

    /// The context undo actions will receive.
    #[must_use]
    pub fn context(&self) -> &Ctx {
        &self.ctx
    }

    /// Drain the ledger now and return the report.
    pub fn finish(mut self) -> DrainReport<Err> {
        self.drain_and_log()
    }

    fn drain_and_log(&mut self) -> DrainReport<Err> {
        self.finished = true;
        let report = self.ledger.drain_all(&self.ctx);

        for record in report.records() {
            match &record.outcome {
                UndoOutcome::Undone => info!(
                    action = %record.name,
                    elapsed_ms = record.elapsed().as_millis(),
                    "{}",
                    record.description
                ),
                UndoOutcome::Failed(error) => warn!(
                    action = %record.name,
                    %error,
                    "cleanup failed: {}",
                    record.description
                ),
                UndoOutcome::Panicked(message) => warn!(
                    action = %record.name,
                    %message,
                    "cleanup panicked: {}",
                    record.description
                ),
            }
        }
        if !report.is_clean() {
            warn!(
                failed = report.failure_count(),
                total = report.len(),
                "ledger drained with cleanup failures"
            );
        }
        report
    }
}

impl<Ctx, Err: Display> Deref for DrainGuard<Ctx, Err> {
    type Target = Ledger<Ctx, Err>;

    fn deref(&self) -> &Self::Target {
        &self.ledger
    }
}

impl<Ctx, Err: Display> DerefMut for DrainGuard<Ctx, Err> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.ledger
    }
}

impl<Ctx, Err: Display> Drop for DrainGuard<Ctx, Err> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            warn!(
                pending = self.ledger.len(),
                "unwinding with recorded resources; draining ledger"
            );
        }
        let _report = self.drain_and_log();
    }
}
