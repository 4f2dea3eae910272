/// A deferred operation that reverses exactly one provisioning step.
///
/// Undo actions receive the cleanup context by shared reference only, so an
/// action can never register further actions while the ledger is draining.
///
/// # Type Parameters
///
/// - `Ctx`: Shared dependencies needed to perform the reversal (provider client, poll settings)
/// - `Err`: The error type for failed reversals
pub trait UndoAction<Ctx: ?Sized, Err> {
    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &str;

    /// Reverse the provisioning step.
    ///
    /// # Errors
    ///
    /// Returns an error if the reversal could not be completed. The ledger
    /// records the error and continues with the next action.
    fn undo(&self, ctx: &Ctx) -> Result<(), Err>;

    /// Human-readable description of what the reversal does.
    fn description(&self) -> String {
        format!("undo {}", self.name())
    }
}

/// Adapter that turns a named closure into an [`UndoAction`].
pub struct FnUndo<F> {
    name: String,
    description: Option<String>,
    undo: F,
}

impl<F> FnUndo<F> {
    #[must_use]
    pub fn new(name: impl Into<String>, undo: F) -> Self {
        Self {
            name: name.into(),
            description: None,
            undo,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl<Ctx, Err, F> UndoAction<Ctx, Err> for FnUndo<F>
where
    Ctx: ?Sized,
    F: Fn(&Ctx) -> Result<(), Err>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn undo(&self, ctx: &Ctx) -> Result<(), Err> {
        (self.undo)(ctx)
    }

    fn description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("undo {}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct TestError(String);

    struct Counter {
        calls: Cell<u32>,
    }

    #[test]
    fn fn_undo_delegates_to_closure() {
        let ctx = Counter {
            calls: Cell::new(0),
        };
        let action = FnUndo::new("vnet", |ctx: &Counter| -> Result<(), TestError> {
            ctx.calls.set(ctx.calls.get() + 1);
            Ok(())
        });

        assert!(action.undo(&ctx).is_ok());
        assert!(action.undo(&ctx).is_ok());
        assert_eq!(ctx.calls.get(), 2);
    }

    #[test]
    fn fn_undo_default_description_uses_name() {
        let action = FnUndo::new("subnet", |_: &()| -> Result<(), TestError> { Ok(()) });

        assert_eq!(UndoAction::<(), TestError>::name(&action), "subnet");
        assert_eq!(
            UndoAction::<(), TestError>::description(&action),
            "undo subnet"
        );
    }

    #[test]
    fn fn_undo_custom_description_overrides_default() {
        let action = FnUndo::new("nic", |_: &()| -> Result<(), TestError> { Ok(()) })
            .with_description("delete network interface 'demo-nic'");

        assert_eq!(
            UndoAction::<(), TestError>::description(&action),
            "delete network interface 'demo-nic'"
        );
    }

    #[test]
    fn fn_undo_propagates_errors() {
        let action = FnUndo::new("vm", |_: &()| -> Result<(), TestError> {
            Err(TestError("boom".to_string()))
        });

        let result = action.undo(&());

        assert_eq!(result, Err(TestError("boom".to_string())));
    }
}
