//! Integration tests for the scope-exit drain guarantee.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use provision_ledger::DrainGuard;

type Log = Rc<RefCell<Vec<String>>>;

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct StepError(String);

/// Context handed to undo actions; shares the invocation log with the test.
struct Cleanup {
    log: Log,
}

fn guard(log: &Log) -> DrainGuard<Cleanup, StepError> {
    DrainGuard::new(Cleanup {
        log: Rc::clone(log),
    })
}

fn undo(tag: &'static str) -> impl Fn(&Cleanup) -> Result<(), StepError> + 'static {
    move |ctx: &Cleanup| {
        ctx.log.borrow_mut().push(tag.to_string());
        Ok(())
    }
}

/// Runs a chain of steps, recording an undo action after each success and
/// stopping at the first failure.
fn run_chain(
    guard: &mut DrainGuard<Cleanup, StepError>,
    steps: &[(&'static str, bool)],
    attempted: &mut Vec<&'static str>,
) -> Result<(), StepError> {
    for &(tag, succeeds) in steps {
        attempted.push(tag);
        if !succeeds {
            guard.mark_aborted();
            return Err(StepError(format!("creating {tag} failed")));
        }
        guard.record_fn(tag, undo(tag));
    }
    Ok(())
}

#[test]
fn failure_at_step_two_of_four_records_and_drains_one_action() {
    let log: Log = Rc::default();
    let mut attempted = Vec::new();
    let mut guard = guard(&log);

    let result = run_chain(
        &mut guard,
        &[("rg", true), ("vnet", false), ("subnet", true), ("nic", true)],
        &mut attempted,
    );

    assert!(result.is_err());
    assert_eq!(attempted, vec!["rg", "vnet"]);
    assert_eq!(guard.len(), 1);

    let report = guard.finish();
    assert_eq!(report.invocation_order(), vec!["rg"]);
    assert_eq!(*log.borrow(), vec!["rg"]);
}

#[test]
fn early_return_drains_through_drop() {
    fn create_subnet() -> Result<(), StepError> {
        Err(StepError("subnet failed".to_string()))
    }

    fn provision(log: &Log) -> Result<(), StepError> {
        let mut guard = guard(log);
        guard.record_fn("rg", undo("rg"));
        guard.record_fn("vnet", undo("vnet"));
        create_subnet()?;
        guard.record_fn("subnet", undo("subnet"));
        Ok(())
    }

    let log: Log = Rc::default();

    let result = provision(&log);

    assert!(result.is_err());
    assert_eq!(*log.borrow(), vec!["vnet", "rg"]);
}

#[test]
fn panic_during_provisioning_still_drains() {
    let log: Log = Rc::default();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut guard = guard(&log);
        guard.record_fn("rg", undo("rg"));
        guard.record_fn("vnet", undo("vnet"));
        guard.record_fn("subnet", undo("subnet"));
        panic!("network interface creation panicked");
    }));

    assert!(outcome.is_err());
    assert_eq!(*log.borrow(), vec!["subnet", "vnet", "rg"]);
}

#[test]
fn successful_chain_drains_everything_at_scope_end() {
    let log: Log = Rc::default();
    let mut attempted = Vec::new();
    {
        let mut guard = guard(&log);
        let result = run_chain(
            &mut guard,
            &[("vnet", true), ("subnet", true), ("nic", true)],
            &mut attempted,
        );
        assert!(result.is_ok());
    }

    assert_eq!(*log.borrow(), vec!["nic", "subnet", "vnet"]);
}
