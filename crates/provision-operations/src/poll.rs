//! Waiting for long-running provider operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use provision_core::PollSettings;
use tracing::{debug, trace};

use crate::{OperationError, Result};

/// Longest uninterrupted sleep between cancellation checks.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Shared flag that interrupts a blocking wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How often to check an operation and how long to wait in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_settings(&PollSettings::default())
    }
}

impl PollPolicy {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn from_settings(settings: &PollSettings) -> Self {
        Self {
            interval: settings.interval(),
            timeout: settings.timeout(),
        }
    }
}

/// Policy plus cancellation state handed to every provider call.
#[derive(Debug, Clone, Default)]
pub struct PollContext {
    policy: PollPolicy,
    cancel: CancelToken,
}

impl PollContext {
    #[must_use]
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            cancel: CancelToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Same policy with a new, uncancelled token.
    ///
    /// Cleanup runs against a fresh context so that the signal which
    /// interrupted provisioning does not strand resources already created.
    #[must_use]
    pub fn fresh(&self) -> Self {
        Self::new(self.policy)
    }
}

/// Result of checking a long-running operation once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStatus<T> {
    Pending,
    Done(T),
}

/// A provider-side task that must be polled until it finishes.
pub trait LongRunningOperation {
    type Output;

    /// Human-readable label used in errors and logs.
    fn description(&self) -> String;

    /// Check the operation once.
    ///
    /// # Errors
    ///
    /// Returns an error if the status request fails or the operation
    /// finished unsuccessfully.
    fn poll(&mut self) -> Result<PollStatus<Self::Output>>;
}

/// Block until `operation` finishes, polling at the context's interval.
///
/// # Errors
///
/// Returns [`OperationError::Cancelled`] if the token is cancelled,
/// [`OperationError::DeadlineExceeded`] if the policy's timeout elapses, or
/// whatever error the operation itself reports.
pub fn await_completion<O>(operation: &mut O, ctx: &PollContext) -> Result<O::Output>
where
    O: LongRunningOperation + ?Sized,
{
    let policy = ctx.policy();
    let started = Instant::now();
    // A timeout too large to represent is no deadline at all.
    let deadline = policy.timeout.and_then(|t| started.checked_add(t));
    let mut attempts: u32 = 0;

    loop {
        if ctx.cancel_token().is_cancelled() {
            return Err(OperationError::Cancelled {
                operation: operation.description(),
            });
        }

        attempts += 1;
        if let PollStatus::Done(output) = operation.poll()? {
            debug!(
                operation = %operation.description(),
                attempts,
                elapsed_ms = started.elapsed().as_millis(),
                "long-running operation finished"
            );
            return Ok(output);
        }
        trace!(operation = %operation.description(), attempts, "operation pending");

        pause(ctx, deadline, || operation.description())?;
    }
}

fn pause<F>(ctx: &PollContext, deadline: Option<Instant>, describe: F) -> Result<()>
where
    F: Fn() -> String,
{
    let policy = ctx.policy();
    let wake = Instant::now().checked_add(policy.interval);

    loop {
        if ctx.cancel_token().is_cancelled() {
            return Err(OperationError::Cancelled {
                operation: describe(),
            });
        }
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            return Err(OperationError::DeadlineExceeded {
                operation: describe(),
                timeout_secs: policy.timeout.map_or(0, |t| t.as_secs()),
            });
        }
        if wake.is_some_and(|w| now >= w) {
            return Ok(());
        }

        let mut nap = wake.map_or(SLEEP_SLICE, |w| {
            SLEEP_SLICE.min(w.saturating_duration_since(now))
        });
        if let Some(deadline) = deadline {
            nap = nap.min(deadline.saturating_duration_since(now));
        }
        thread::sleep(nap);
    }
}
