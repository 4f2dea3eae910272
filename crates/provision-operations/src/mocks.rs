use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use provision_core::{ResourceAddress, ResourceId, ResourceKind};

use crate::poll::PollContext;
use crate::traits::{EventSink, ProvisionedResource, ResourceProvider, ResourceRequest};
use crate::{OperationError, Result};

/// A provider call as seen by [`RecordingProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(ResourceKind),
    Delete(ResourceKind),
}

/// Provider that accepts every call unless told otherwise and records it.
#[derive(Default)]
pub struct RecordingProvider {
    calls: Mutex<Vec<Call>>,
    fail_create: HashSet<ResourceKind>,
    fail_delete: HashSet<ResourceKind>,
    cancelled_polls: Mutex<Vec<bool>>,
}

impl RecordingProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_create_failure(mut self, kind: ResourceKind) -> Self {
        self.fail_create.insert(kind);
        self
    }

    #[must_use]
    pub fn with_delete_failure(mut self, kind: ResourceKind) -> Self {
        self.fail_delete.insert(kind);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the poll context was cancelled, per call.
    pub fn cancelled_polls(&self) -> Vec<bool> {
        self.cancelled_polls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn log(&self, call: Call, poll: &PollContext) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        self.cancelled_polls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(poll.cancel_token().is_cancelled());
    }
}

fn rejected(kind: ResourceKind) -> OperationError {
    OperationError::Provider {
        status: 400,
        code: "MockFailure".to_string(),
        message: format!("{kind} rejected by mock"),
    }
}

impl ResourceProvider for RecordingProvider {
    fn create(
        &self,
        request: &ResourceRequest,
        poll: &PollContext,
    ) -> Result<ProvisionedResource> {
        let kind = request.address.kind;
        self.log(Call::Create(kind), poll);
        if self.fail_create.contains(&kind) {
            return Err(rejected(kind));
        }
        Ok(ProvisionedResource {
            kind,
            id: ResourceId::new(format!("/mock/{}", request.address.name)),
            name: request.address.name.clone(),
            snapshot: request.body.clone(),
        })
    }

    fn delete(&self, address: &ResourceAddress, poll: &PollContext) -> Result<()> {
        self.log(Call::Delete(address.kind), poll);
        if self.fail_delete.contains(&address.kind) {
            return Err(rejected(address.kind));
        }
        Ok(())
    }
}

/// Sink that keeps the kinds it was told about.
#[derive(Default)]
pub struct RecordingSink {
    created: Mutex<Vec<ResourceKind>>,
    deleted: Mutex<Vec<ResourceKind>>,
}

impl RecordingSink {
    pub fn created(&self) -> Vec<ResourceKind> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn deleted(&self) -> Vec<ResourceKind> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for RecordingSink {
    fn resource_created(&self, resource: &ProvisionedResource) {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource.kind);
    }

    fn resource_deleted(&self, address: &ResourceAddress, _id: &ResourceId) {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(address.kind);
    }
}
