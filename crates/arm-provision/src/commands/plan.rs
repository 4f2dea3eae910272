use std::io::{self, Write};

use provision_core::{ResourceKind, Settings};

use crate::error::{CliError, Result};
use crate::settings::Overrides;

const SUBSCRIPTION_PLACEHOLDER: &str = "<subscription-id>";

pub(crate) fn run(overrides: &Overrides) -> Result<()> {
    let settings = overrides.resolve()?;
    io::stdout()
        .lock()
        .write_all(render(&settings).as_bytes())
        .map_err(CliError::Output)
}

fn render(settings: &Settings) -> String {
    let subscription = settings
        .subscription_id
        .as_deref()
        .unwrap_or(SUBSCRIPTION_PLACEHOLDER);

    let mut out = format!("Location: {}\n\nProvisioning order:\n", settings.location);
    for (step, kind) in ResourceKind::CHAIN.iter().enumerate() {
        let address = settings.address(*kind);
        out.push_str(&format!("  {}. {address}\n", step + 1));
        out.push_str(&format!("     {}\n", address.path(subscription)));
    }

    out.push_str("\nCleanup order:\n");
    for (step, kind) in ResourceKind::CHAIN.iter().rev().enumerate() {
        out.push_str(&format!("  {}. {}\n", step + 1, settings.address(*kind)));
    }
    out
}
