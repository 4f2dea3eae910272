use std::any::Any;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use tracing::{debug, warn};

use crate::action::{FnUndo, UndoAction};
use crate::report::{DrainReport, UndoOutcome, UndoRecord};

/// Lifecycle of a ledger within one provisioning session.
///
/// `Draining` is reachable from every `Provisioning`/`Aborted` state and
/// `Drained` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    /// Nothing has been recorded yet.
    Empty,
    /// The forward pass has recorded this many undo actions.
    Provisioning(usize),
    /// The forward pass stopped after recording this many undo actions.
    /// Actions recorded afterwards still count here; the state only moves on
    /// to `Draining`.
    Aborted(usize),
    /// Undo actions are running.
    Draining,
    /// All recorded undo actions have run.
    Drained,
}

impl fmt::Display for LedgerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty"),
            Self::Provisioning(k) => write!(f, "provisioning ({k} recorded)"),
            Self::Aborted(k) => write!(f, "aborted ({k} recorded)"),
            Self::Draining => write!(f, "draining"),
            Self::Drained => write!(f, "drained"),
        }
    }
}

/// Ordered record of undo actions for successfully completed steps.
///
/// The ledger is append-only while provisioning and drained strictly in
/// reverse registration order. A failing undo action never prevents the
/// actions registered before it from running.
pub struct Ledger<Ctx: ?Sized, Err> {
    actions: Vec<Box<dyn UndoAction<Ctx, Err>>>,
    state: LedgerState,
}

impl<Ctx: ?Sized, Err> Default for Ledger<Ctx, Err> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Ctx: ?Sized, Err> fmt::Debug for Ledger<Ctx, Err> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("actions", &self.pending())
            .field("state", &self.state)
            .finish()
    }
}

impl<Ctx: ?Sized, Err> Ledger<Ctx, Err> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            actions: Vec::new(),
            state: LedgerState::Empty,
        }
    }

    /// Append the undo action for a step that has already completed.
    pub fn record<A>(&mut self, action: A)
    where
        A: UndoAction<Ctx, Err> + 'static,
    {
        self.record_boxed(Box::new(action));
    }

    /// Append a named closure as an undo action.
    pub fn record_fn<F>(&mut self, name: impl Into<String>, undo: F)
    where
        F: Fn(&Ctx) -> Result<(), Err> + 'static,
    {
        self.record(FnUndo::new(name, undo));
    }

    pub fn record_boxed(&mut self, action: Box<dyn UndoAction<Ctx, Err>>) {
        match self.state {
            LedgerState::Empty | LedgerState::Provisioning(_) => {}
            LedgerState::Aborted(_) | LedgerState::Draining | LedgerState::Drained => {
                warn!(
                    action = action.name(),
                    state = %self.state,
                    "recording undo action outside the provisioning phase"
                );
            }
        }
        debug!(
            action = action.name(),
            position = self.actions.len(),
            "recorded undo action"
        );
        self.actions.push(action);
        self.state = match self.state {
            LedgerState::Aborted(_) => LedgerState::Aborted(self.actions.len()),
            _ => LedgerState::Provisioning(self.actions.len()),
        };
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    #[must_use]
    pub fn state(&self) -> LedgerState {
        self.state
    }

    /// Names of the pending undo actions in registration order.
    #[must_use]
    pub fn pending(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name()).collect()
    }

    /// Note that the forward pass stopped early.
    pub fn mark_aborted(&mut self) {
        if let LedgerState::Empty | LedgerState::Provisioning(_) = self.state {
            self.state = LedgerState::Aborted(self.actions.len());
        }
    }

    /// Run every recorded undo action, last registered first.
    ///
    /// Each outcome is captured independently and the ledger is empty
    /// afterwards, so a second call performs no invocations.
    pub fn drain_all(&mut self, ctx: &Ctx) -> DrainReport<Err> {
        let mut report = DrainReport::new();
        if self.actions.is_empty() {
            self.state = LedgerState::Drained;
            return report;
        }

        let actions = std::mem::take(&mut self.actions);
        debug!(count = actions.len(), from = %self.state, "draining ledger");
        self.state = LedgerState::Draining;

        for (position, action) in actions.into_iter().enumerate().rev() {
            let name = action.name().to_string();
            let description = action.description();
            let started_at = Instant::now();
            let outcome = match catch_unwind(AssertUnwindSafe(|| action.undo(ctx))) {
                Ok(Ok(())) => UndoOutcome::Undone,
                Ok(Err(error)) => UndoOutcome::Failed(error),
                Err(payload) => UndoOutcome::Panicked(panic_message(payload.as_ref())),
            };
            let completed_at = Instant::now();

            match &outcome {
                UndoOutcome::Undone => debug!(action = %name, position, "undo action completed"),
                UndoOutcome::Failed(_) => debug!(action = %name, position, "undo action failed"),
                UndoOutcome::Panicked(message) => {
                    warn!(action = %name, position, %message, "undo action panicked");
                }
            }

            report.push(UndoRecord {
                name,
                description,
                position,
                started_at,
                completed_at,
                outcome,
            });
        }

        self.state = LedgerState::Drained;
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
