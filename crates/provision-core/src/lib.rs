pub mod error;
mod settings;
pub mod types;

pub use error::*;
pub use settings::{
    ImageReference, NetworkSettings, PollSettings, ResourceNames, Settings, VmSettings,
};
pub use types::*;
