use provision_core::{ResourceAddress, ResourceId, ResourceKind};
use serde::Serialize;

use crate::Result;
use crate::poll::PollContext;

/// A create request for one resource.
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub address: ResourceAddress,
    pub body: serde_json::Value,
}

/// A resource the provider reported as created.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionedResource {
    pub kind: ResourceKind,
    pub id: ResourceId,
    pub name: String,
    /// The provider's representation of the resource after creation.
    pub snapshot: serde_json::Value,
}

/// The control plane resources are created in and deleted from.
///
/// Both operations block until the provider's long-running operation has
/// finished, polling according to the given context.
pub trait ResourceProvider: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the request is rejected, the long-running
    /// operation fails, or the wait is cancelled or times out.
    fn create(&self, request: &ResourceRequest, poll: &PollContext)
    -> Result<ProvisionedResource>;

    /// # Errors
    ///
    /// Returns an error if the request is rejected, the long-running
    /// operation fails, or the wait is cancelled or times out.
    fn delete(&self, address: &ResourceAddress, poll: &PollContext) -> Result<()>;
}
