//! Request bodies for each resource kind.

use std::collections::BTreeMap;

use provision_core::{ResourceId, ResourceKind, Settings};
use serde_json::{Value, json};

use crate::traits::ResourceRequest;
use crate::{OperationError, Result};

/// Name of the NIC's single IP configuration.
pub const IP_CONFIGURATION_NAME: &str = "internal";

/// Build the create request for `kind`.
///
/// `ids` holds the identifiers of resources already created in this
/// session; the resource `kind` depends on must be among them.
///
/// # Errors
///
/// Returns [`OperationError::MissingDependency`] if the prerequisite has not
/// been created, or a settings error if the VM password is not configured.
pub fn request_for(
    kind: ResourceKind,
    settings: &Settings,
    ids: &BTreeMap<ResourceKind, ResourceId>,
) -> Result<ResourceRequest> {
    let dependency = kind
        .depends_on()
        .map(|requires| {
            ids.get(&requires)
                .ok_or(OperationError::MissingDependency { kind, requires })
        })
        .transpose()?;

    let body = match kind {
        ResourceKind::ResourceGroup => resource_group(settings),
        ResourceKind::VirtualNetwork => virtual_network(settings),
        ResourceKind::Subnet => subnet(settings),
        ResourceKind::NetworkInterface => {
            network_interface(settings, dependency.ok_or_else(|| missing(kind))?)
        }
        ResourceKind::VirtualMachine => {
            virtual_machine(settings, dependency.ok_or_else(|| missing(kind))?)?
        }
    };

    Ok(ResourceRequest {
        address: settings.address(kind),
        body,
    })
}

fn missing(kind: ResourceKind) -> OperationError {
    OperationError::MissingDependency {
        kind,
        requires: kind.depends_on().unwrap_or(kind),
    }
}

fn resource_group(settings: &Settings) -> Value {
    json!({ "location": settings.location })
}

fn virtual_network(settings: &Settings) -> Value {
    json!({
        "location": settings.location,
        "properties": {
            "addressSpace": {
                "addressPrefixes": [settings.network.address_prefix],
            },
        },
    })
}

fn subnet(settings: &Settings) -> Value {
    json!({
        "properties": {
            "addressPrefix": settings.network.subnet_prefix,
        },
    })
}

fn network_interface(settings: &Settings, subnet_id: &ResourceId) -> Value {
    json!({
        "location": settings.location,
        "properties": {
            "ipConfigurations": [{
                "name": IP_CONFIGURATION_NAME,
                "properties": {
                    "privateIPAllocationMethod": "Dynamic",
                    "subnet": { "id": subnet_id },
                },
            }],
        },
    })
}

fn virtual_machine(settings: &Settings, nic_id: &ResourceId) -> Result<Value> {
    let vm = &settings.vm;
    let password = settings.require_admin_password()?;
    Ok(json!({
        "location": settings.location,
        "identity": { "type": "SystemAssigned" },
        "properties": {
            "hardwareProfile": { "vmSize": vm.size },
            "osProfile": {
                "adminUsername": vm.admin_username,
                "adminPassword": password,
                "computerName": vm.computer_name,
                "windowsConfiguration": {},
            },
            "networkProfile": {
                "networkInterfaces": [{ "id": nic_id }],
            },
            "storageProfile": {
                "imageReference": {
                    "publisher": vm.image.publisher,
                    "offer": vm.image.offer,
                    "sku": vm.image.sku,
                    "version": vm.image.version,
                },
                "osDisk": {
                    "createOption": "FromImage",
                    "caching": "ReadWrite",
                    "managedDisk": { "storageAccountType": vm.os_disk_storage },
                    "osType": "Windows",
                },
            },
        },
    }))
}

/// Copy of `body` with secrets replaced, for logging and snapshots.
#[must_use]
pub fn redacted(body: &Value) -> Value {
    let mut copy = body.clone();
    if let Some(password) = copy.pointer_mut("/properties/osProfile/adminPassword") {
        *password = Value::String("<redacted>".to_string());
    }
    copy
}
