use std::sync::Arc;

use clap::Args;
use provision_core::{ResourceKind, Settings};
use provision_operations::poll::{PollContext, PollPolicy};
use provision_operations::providers::{
    ArmProvider, DEFAULT_ENDPOINT, EnvironmentCredential, SimulatedProvider,
};
use provision_operations::traits::ResourceProvider;
use provision_operations::{Connection, run as run_session};
use tracing::info;

use crate::error::{CliError, Result};
use crate::output::{ConsoleSink, print_cleanup};
use crate::settings::Overrides;

const SIMULATED_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";
const SIMULATED_PASSWORD: &str = "Simulated-P@ssw0rd1";

#[derive(Args)]
pub(crate) struct RunArgs {
    /// Run against an in-memory control plane instead of the resource manager
    #[arg(long)]
    simulate: bool,

    /// Make creation of this resource fail
    #[arg(long, value_enum, requires = "simulate")]
    fail_at: Option<ResourceKind>,

    /// Make deletion of this resource fail
    #[arg(long, value_enum, requires = "simulate")]
    fail_cleanup_at: Option<ResourceKind>,

    /// Give up on any single operation after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Seconds between status checks of a long-running operation
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Resource manager endpoint
    #[arg(long, env = "ARM_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,
}

impl RunArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(secs) = self.poll_interval {
            settings.polling.interval_secs = secs;
        }
        if self.timeout.is_some() {
            settings.polling.timeout_secs = self.timeout;
        }
        if self.simulate {
            settings
                .subscription_id
                .get_or_insert_with(|| SIMULATED_SUBSCRIPTION.to_string());
            settings
                .vm
                .admin_password
                .get_or_insert_with(|| SIMULATED_PASSWORD.to_string());
        }
    }

    fn simulated_provider(&self, subscription_id: &str) -> SimulatedProvider {
        let mut provider = SimulatedProvider::new(subscription_id);
        if let Some(kind) = self.fail_at {
            provider = provider.fail_create(kind);
        }
        if let Some(kind) = self.fail_cleanup_at {
            provider = provider.fail_delete(kind);
        }
        provider
    }
}

pub(crate) fn run(overrides: &Overrides, args: &RunArgs) -> Result<()> {
    let mut settings = overrides.resolve()?;
    args.apply(&mut settings);
    settings.validate()?;
    let subscription_id = settings.require_subscription()?.to_string();
    settings.require_admin_password()?;

    if args.simulate {
        info!("using simulated control plane");
        execute(&settings, args.simulated_provider(&subscription_id))
    } else {
        let credential = EnvironmentCredential::from_env().map_err(CliError::Connect)?;
        let provider = ArmProvider::new(subscription_id, credential)
            .map_err(CliError::Connect)?
            .with_endpoint(args.endpoint.as_str());
        execute(&settings, provider)
    }
}

fn execute<P: ResourceProvider + 'static>(settings: &Settings, provider: P) -> Result<()> {
    let poll = PollContext::new(PollPolicy::from_settings(&settings.polling));
    let connection = Connection::new(Arc::new(provider), poll).with_events(Arc::new(ConsoleSink));

    let report = run_session(settings, connection);
    print_cleanup(&report.cleanup);

    report.provisioning.map_err(CliError::Provisioning)
}
