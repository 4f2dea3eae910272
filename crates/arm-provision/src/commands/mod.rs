mod plan;
mod run;

use clap::Subcommand;

use crate::error::Result;
use crate::settings::Overrides;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Provision the resource chain, then delete it newest first
    Run(run::RunArgs),
    /// Show what would be created and the order it would be deleted in
    Plan,
}

impl Commands {
    pub(crate) fn execute(self, overrides: &Overrides) -> Result<()> {
        match self {
            Self::Run(args) => run::run(overrides, &args),
            Self::Plan => plan::run(overrides),
        }
    }
}
