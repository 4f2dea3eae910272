use provision_core::{ResourceAddress, ResourceId};

use super::ProvisionedResource;

/// Observer for user-visible confirmations. Has no effect on control flow.
pub trait EventSink: Send + Sync {
    fn resource_created(&self, resource: &ProvisionedResource);

    fn resource_deleted(&self, address: &ResourceAddress, id: &ResourceId);
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn resource_created(&self, _resource: &ProvisionedResource) {}

    fn resource_deleted(&self, _address: &ResourceAddress, _id: &ResourceId) {}
}
