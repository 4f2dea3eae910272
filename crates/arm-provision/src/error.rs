use provision_core::CoreError;
use provision_operations::OperationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid configuration")]
    Settings(#[from] CoreError),

    #[error("could not connect to the resource manager")]
    Connect(#[source] OperationError),

    #[error("provisioning did not complete")]
    Provisioning(#[source] OperationError),

    #[error("could not write output")]
    Output(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CliError>;
