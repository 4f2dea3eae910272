//! Ordered undo ledger for multi-step provisioning.
//!
//! Each successfully completed provisioning step registers an undo action.
//! When the session ends, the ledger runs every registered action in
//! reverse registration order (LIFO). A failing or panicking undo action is
//! recorded in the drain report and never stops the actions registered
//! before it.

mod action;
mod error;
mod guard;
mod ledger;
mod report;

pub use action::{FnUndo, UndoAction};
pub use error::CleanupError;
pub use guard::DrainGuard;
pub use ledger::{Ledger, LedgerState};
pub use report::{DrainReport, UndoOutcome, UndoRecord, UndoStatus};
