use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use provision_core::{ResourceAddress, ResourceId, ResourceKind};
use serde_json::{Value, json};
use tracing::debug;

use crate::payload::redacted;
use crate::poll::{LongRunningOperation, PollContext, PollStatus, await_completion};
use crate::traits::{ProvisionedResource, ResourceProvider, ResourceRequest};
use crate::{OperationError, Result};

/// One mutation attempted against the simulated control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Created { kind: ResourceKind, name: String },
    CreateFailed { kind: ResourceKind, name: String },
    Deleted { kind: ResourceKind, name: String },
    DeleteFailed { kind: ResourceKind, name: String },
}

struct StoredResource {
    address: ResourceAddress,
    /// Ids of the resources this one points at (the subnet of a NIC, the NIC of a VM).
    references: Vec<String>,
}

#[derive(Default)]
struct ControlPlane {
    resources: BTreeMap<String, StoredResource>,
    journal: Vec<JournalEntry>,
}

/// In-memory control plane with the provider's referential constraints.
///
/// A resource can only be created once its parent exists, and a resource
/// that is still referenced (a virtual network with subnets, a subnet used
/// by a NIC, a NIC attached to a VM) cannot be deleted. Deleting a resource
/// group removes everything inside it.
pub struct SimulatedProvider {
    subscription_id: String,
    polls_to_complete: u32,
    fail_create: HashSet<ResourceKind>,
    fail_delete: HashSet<ResourceKind>,
    plane: Mutex<ControlPlane>,
}

impl SimulatedProvider {
    #[must_use]
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            polls_to_complete: 0,
            fail_create: HashSet::new(),
            fail_delete: HashSet::new(),
            plane: Mutex::new(ControlPlane::default()),
        }
    }

    /// Report every operation as pending this many times before it finishes.
    #[must_use]
    pub fn with_polls_to_complete(mut self, polls: u32) -> Self {
        self.polls_to_complete = polls;
        self
    }

    /// Make creation of `kind` finish with a failed status.
    #[must_use]
    pub fn fail_create(mut self, kind: ResourceKind) -> Self {
        self.fail_create.insert(kind);
        self
    }

    /// Make deletion of `kind` finish with a failed status.
    #[must_use]
    pub fn fail_delete(mut self, kind: ResourceKind) -> Self {
        self.fail_delete.insert(kind);
        self
    }

    #[must_use]
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.plane().journal.clone()
    }

    #[must_use]
    pub fn contains(&self, address: &ResourceAddress) -> bool {
        self.plane()
            .resources
            .contains_key(&address.path(&self.subscription_id))
    }

    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.plane().resources.len()
    }

    fn plane(&self) -> MutexGuard<'_, ControlPlane> {
        self.plane.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self, description: String, poll: &PollContext) -> Result<()> {
        let mut operation = SimulatedOperation {
            remaining: self.polls_to_complete,
            description,
        };
        await_completion(&mut operation, poll)
    }

    fn check_create(&self, plane: &ControlPlane, request: &ResourceRequest) -> Result<Vec<String>> {
        let address = &request.address;
        if address.kind != ResourceKind::ResourceGroup {
            let group = ResourceAddress {
                kind: ResourceKind::ResourceGroup,
                resource_group: address.resource_group.clone(),
                parent: None,
                name: address.resource_group.clone(),
            };
            if !plane.resources.contains_key(&group.path(&self.subscription_id)) {
                return Err(not_found(
                    "ResourceGroupNotFound",
                    format!("Resource group '{}' could not be found.", address.resource_group),
                ));
            }
        }

        let reference = match address.kind {
            ResourceKind::ResourceGroup | ResourceKind::VirtualNetwork => None,
            ResourceKind::Subnet => {
                let network = ResourceAddress {
                    kind: ResourceKind::VirtualNetwork,
                    resource_group: address.resource_group.clone(),
                    parent: None,
                    name: address.parent.clone().unwrap_or_default(),
                };
                if !plane.resources.contains_key(&network.path(&self.subscription_id)) {
                    return Err(not_found(
                        "ParentResourceNotFound",
                        format!("Parent resource {network} not found."),
                    ));
                }
                None
            }
            ResourceKind::NetworkInterface => Some(
                request
                    .body
                    .pointer("/properties/ipConfigurations/0/properties/subnet/id"),
            ),
            ResourceKind::VirtualMachine => Some(
                request
                    .body
                    .pointer("/properties/networkProfile/networkInterfaces/0/id"),
            ),
        };

        match reference {
            None => Ok(Vec::new()),
            Some(id) => {
                let id = id.and_then(Value::as_str).unwrap_or_default();
                if plane.resources.contains_key(id) {
                    Ok(vec![id.to_string()])
                } else {
                    Err(OperationError::Provider {
                        status: 400,
                        code: "InvalidResourceReference".to_string(),
                        message: format!("Resource '{id}' referenced by {address} was not found."),
                    })
                }
            }
        }
    }

    fn snapshot(address: &ResourceAddress, id: &str, body: &Value) -> Value {
        let mut snapshot = redacted(body);
        if !snapshot.is_object() {
            snapshot = json!({});
        }
        snapshot["id"] = json!(id);
        snapshot["name"] = json!(address.name);
        snapshot["type"] = json!(address.kind.resource_type());
        if !snapshot["properties"].is_object() {
            snapshot["properties"] = json!({});
        }
        snapshot["properties"]["provisioningState"] = json!("Succeeded");
        snapshot
    }
}

impl ResourceProvider for SimulatedProvider {
    fn create(
        &self,
        request: &ResourceRequest,
        poll: &PollContext,
    ) -> Result<ProvisionedResource> {
        let address = &request.address;
        let description = format!("create {address}");
        self.wait(description.clone(), poll)?;

        let mut plane = self.plane();
        let entry = |failed: bool| {
            let (kind, name) = (address.kind, address.name.clone());
            if failed {
                JournalEntry::CreateFailed { kind, name }
            } else {
                JournalEntry::Created { kind, name }
            }
        };

        let references = match self.check_create(&plane, request) {
            Ok(references) => references,
            Err(e) => {
                plane.journal.push(entry(true));
                return Err(e);
            }
        };
        if self.fail_create.contains(&address.kind) {
            plane.journal.push(entry(true));
            return Err(OperationError::OperationFailed {
                operation: description,
                status: "Failed".to_string(),
                message: "simulated provisioning failure".to_string(),
            });
        }

        let id = address.path(&self.subscription_id);
        let snapshot = Self::snapshot(address, &id, &request.body);
        plane.resources.insert(
            id.clone(),
            StoredResource {
                address: address.clone(),
                references,
            },
        );
        plane.journal.push(entry(false));
        debug!(resource = %address, "simulated create finished");

        Ok(ProvisionedResource {
            kind: address.kind,
            id: ResourceId::new(id),
            name: address.name.clone(),
            snapshot,
        })
    }

    fn delete(&self, address: &ResourceAddress, poll: &PollContext) -> Result<()> {
        let description = format!("delete {address}");
        self.wait(description.clone(), poll)?;

        let mut plane = self.plane();
        let id = address.path(&self.subscription_id);
        let failed = JournalEntry::DeleteFailed {
            kind: address.kind,
            name: address.name.clone(),
        };

        if !plane.resources.contains_key(&id) {
            debug!(resource = %address, "already deleted");
            return Ok(());
        }
        if self.fail_delete.contains(&address.kind) {
            plane.journal.push(failed);
            return Err(OperationError::OperationFailed {
                operation: description,
                status: "Failed".to_string(),
                message: "simulated deletion failure".to_string(),
            });
        }

        if address.kind == ResourceKind::ResourceGroup {
            let before = plane.resources.len();
            plane
                .resources
                .retain(|_, r| r.address.resource_group != address.name);
            debug!(
                resource = %address,
                removed = before - plane.resources.len(),
                "resource group deleted with its contents"
            );
        } else {
            let children = format!("{id}/");
            let blocker = plane
                .resources
                .iter()
                .find(|(path, r)| path.starts_with(&children) || r.references.contains(&id))
                .map(|(_, r)| r.address.to_string());
            if let Some(blocker) = blocker {
                plane.journal.push(failed);
                return Err(OperationError::Provider {
                    status: 409,
                    code: "InUse".to_string(),
                    message: format!("{address} is in use by {blocker}."),
                });
            }
            plane.resources.remove(&id);
        }

        plane.journal.push(JournalEntry::Deleted {
            kind: address.kind,
            name: address.name.clone(),
        });
        Ok(())
    }
}

fn not_found(code: &str, message: String) -> OperationError {
    OperationError::Provider {
        status: 404,
        code: code.to_string(),
        message,
    }
}

struct SimulatedOperation {
    remaining: u32,
    description: String,
}

impl LongRunningOperation for SimulatedOperation {
    type Output = ();

    fn description(&self) -> String {
        self.description.clone()
    }

    fn poll(&mut self) -> Result<PollStatus<()>> {
        if self.remaining == 0 {
            Ok(PollStatus::Done(()))
        } else {
            self.remaining -= 1;
            Ok(PollStatus::Pending)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use provision_core::Settings;

    use super::*;
    use crate::payload::request_for;
    use crate::poll::PollPolicy;

    fn poll() -> PollContext {
        PollContext::new(PollPolicy::new(Duration::ZERO))
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.vm.admin_password = Some("secret-password".to_string());
        settings
    }

    /// Creates `kinds` in order, returning the created resources.
    fn create_all(
        provider: &SimulatedProvider,
        kinds: &[ResourceKind],
    ) -> anyhow::Result<Vec<ProvisionedResource>> {
        let settings = settings();
        let mut ids = BTreeMap::new();
        let mut created = Vec::new();
        for kind in kinds {
            let request = request_for(*kind, &settings, &ids)?;
            let resource = provider.create(&request, &poll())?;
            ids.insert(*kind, resource.id.clone());
            created.push(resource);
        }
        Ok(created)
    }

    #[test]
    fn full_chain_can_be_created() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1");

        let created = create_all(&provider, &ResourceKind::CHAIN)?;

        assert_eq!(created.len(), 5);
        assert_eq!(provider.resource_count(), 5);
        assert_eq!(
            created[2].id.as_str(),
            "/subscriptions/sub-1/resourceGroups/arm-provision-rg/providers/Microsoft.Network/virtualNetworks/arm-provision-vnet/subnets/internal"
        );
        Ok(())
    }

    #[test]
    fn snapshot_has_identity_fields_and_no_password() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1");

        let created = create_all(&provider, &ResourceKind::CHAIN)?;
        let vm = &created[4].snapshot;

        assert_eq!(vm["type"], "Microsoft.Compute/virtualMachines");
        assert_eq!(vm["name"], "arm-provision-vm");
        assert_eq!(vm["properties"]["provisioningState"], "Succeeded");
        assert_eq!(vm["properties"]["osProfile"]["adminPassword"], "<redacted>");
        Ok(())
    }

    #[test]
    fn create_without_resource_group_is_rejected() {
        let provider = SimulatedProvider::new("sub-1");
        let request = ResourceRequest {
            address: settings().address(ResourceKind::VirtualNetwork),
            body: json!({}),
        };

        let result = provider.create(&request, &poll());

        assert!(matches!(
            result,
            Err(OperationError::Provider { status: 404, ref code, .. }) if code == "ResourceGroupNotFound"
        ));
        assert!(matches!(
            provider.journal().as_slice(),
            [JournalEntry::CreateFailed { kind: ResourceKind::VirtualNetwork, .. }]
        ));
    }

    #[test]
    fn nic_with_unknown_subnet_is_rejected() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1");
        create_all(&provider, &[ResourceKind::ResourceGroup])?;
        let request = ResourceRequest {
            address: settings().address(ResourceKind::NetworkInterface),
            body: json!({
                "properties": { "ipConfigurations": [{ "properties": { "subnet": { "id": "/missing" } } }] }
            }),
        };

        let result = provider.create(&request, &poll());

        assert!(matches!(
            result,
            Err(OperationError::Provider { status: 400, .. })
        ));
        Ok(())
    }

    #[test]
    fn deleting_out_of_dependency_order_is_refused() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1");
        create_all(&provider, &ResourceKind::CHAIN[..3])?;

        let result = provider.delete(&settings().address(ResourceKind::VirtualNetwork), &poll());

        assert!(matches!(
            result,
            Err(OperationError::Provider { status: 409, .. })
        ));
        assert!(provider.contains(&settings().address(ResourceKind::VirtualNetwork)));
        Ok(())
    }

    #[test]
    fn referenced_nic_cannot_be_deleted_before_vm() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1");
        create_all(&provider, &ResourceKind::CHAIN)?;

        let result =
            provider.delete(&settings().address(ResourceKind::NetworkInterface), &poll());

        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn reverse_order_deletion_succeeds() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1");
        create_all(&provider, &ResourceKind::CHAIN)?;

        for kind in ResourceKind::CHAIN.iter().rev() {
            provider.delete(&settings().address(*kind), &poll())?;
        }

        assert_eq!(provider.resource_count(), 0);
        Ok(())
    }

    #[test]
    fn resource_group_deletion_cascades() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1");
        create_all(&provider, &ResourceKind::CHAIN[..3])?;

        provider.delete(&settings().address(ResourceKind::ResourceGroup), &poll())?;

        assert_eq!(provider.resource_count(), 0);
        Ok(())
    }

    #[test]
    fn deleting_missing_resource_is_noop() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1");

        provider.delete(&settings().address(ResourceKind::Subnet), &poll())?;

        assert!(provider.journal().is_empty());
        Ok(())
    }

    #[test]
    fn injected_create_failure_leaves_nothing_behind() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1").fail_create(ResourceKind::Subnet);
        create_all(&provider, &ResourceKind::CHAIN[..2])?;

        let result = create_all(&provider, &ResourceKind::CHAIN);

        assert!(result.is_err());
        assert!(!provider.contains(&settings().address(ResourceKind::Subnet)));
        Ok(())
    }

    #[test]
    fn injected_delete_failure_keeps_resource() -> anyhow::Result<()> {
        let provider = SimulatedProvider::new("sub-1").fail_delete(ResourceKind::ResourceGroup);
        create_all(&provider, &[ResourceKind::ResourceGroup])?;

        let result = provider.delete(&settings().address(ResourceKind::ResourceGroup), &poll());

        assert!(matches!(result, Err(OperationError::OperationFailed { .. })));
        assert_eq!(provider.resource_count(), 1);
        Ok(())
    }

    #[test]
    fn pending_operations_honour_cancellation() {
        let provider = SimulatedProvider::new("sub-1").with_polls_to_complete(5);
        let ctx = poll();
        ctx.cancel_token().cancel();
        let request = ResourceRequest {
            address: settings().address(ResourceKind::ResourceGroup),
            body: json!({ "location": "westus2" }),
        };

        let result = provider.create(&request, &ctx);

        assert!(matches!(result, Err(OperationError::Cancelled { .. })));
        assert_eq!(provider.resource_count(), 0);
    }
}
