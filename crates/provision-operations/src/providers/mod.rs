mod arm;
pub mod credential;
mod simulated;

pub use arm::{ArmProvider, DEFAULT_ENDPOINT};
pub use credential::{
    ClientSecretCredential, EnvironmentCredential, StaticToken, TokenCredential,
};
pub use simulated::{JournalEntry, SimulatedProvider};
