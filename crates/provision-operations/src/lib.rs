mod error;
pub mod payload;
pub mod poll;
pub mod providers;
pub mod session;
pub mod traits;

#[cfg(test)]
pub mod mocks;

pub use error::{OperationError, Result};
pub use session::{Connection, ProvisioningSession, RunReport, run};
