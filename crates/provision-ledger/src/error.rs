/// Error from an undo action that failed while the ledger was draining.
#[derive(Debug, thiserror::Error)]
#[error("cleanup failed for '{step}': {description}")]
pub struct CleanupError<E> {
    /// Name of the undo action that failed.
    pub step: String,
    /// Description of what the undo action was trying to do.
    pub description: String,
    /// The underlying error.
    #[source]
    pub error: E,
}
