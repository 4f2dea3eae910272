mod commands;
mod error;
mod logging;
mod output;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::commands::Commands;
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "arm-provision")]
#[command(version = env!("ARM_PROVISION_VERSION"))]
#[command(
    about = "Provision a resource group, network and VM, then delete them newest first",
    long_about = None
)]
struct Cli {
    /// TOML file with resource names and sizes (default: built-in settings)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Subscription the resources are created in
    #[arg(long, env = "SUBSCRIPTION_ID", global = true)]
    subscription_id: Option<String>,

    /// Region for every created resource
    #[arg(long, env = "AZURE_LOCATION", global = true)]
    location: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let overrides = settings::Overrides {
        config: cli.config,
        subscription_id: cli.subscription_id,
        location: cli.location,
    };

    if let Err(e) = cli.command.execute(&overrides) {
        print_error(&e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn print_error(error: &CliError) {
    eprintln!("error: {error}");

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        eprintln!("caused by: {cause}");
        source = std::error::Error::source(cause);
    }
}
