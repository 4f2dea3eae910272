use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The kinds of resource in the provisioning chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    ResourceGroup,
    VirtualNetwork,
    Subnet,
    NetworkInterface,
    VirtualMachine,
}

impl ResourceKind {
    /// Every kind in dependency order: each entry depends on the one before it.
    pub const CHAIN: [ResourceKind; 5] = [
        Self::ResourceGroup,
        Self::VirtualNetwork,
        Self::Subnet,
        Self::NetworkInterface,
        Self::VirtualMachine,
    ];

    /// The kind that must exist before this one can be created.
    #[must_use]
    pub fn depends_on(self) -> Option<Self> {
        match self {
            Self::ResourceGroup => None,
            Self::VirtualNetwork => Some(Self::ResourceGroup),
            Self::Subnet => Some(Self::VirtualNetwork),
            Self::NetworkInterface => Some(Self::Subnet),
            Self::VirtualMachine => Some(Self::NetworkInterface),
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::ResourceGroup => "Resource Group",
            Self::VirtualNetwork => "Virtual Network",
            Self::Subnet => "Subnet",
            Self::NetworkInterface => "Network Interface",
            Self::VirtualMachine => "Virtual Machine",
        }
    }

    /// Short tag used for undo-action names and log fields.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::ResourceGroup => "resource-group",
            Self::VirtualNetwork => "virtual-network",
            Self::Subnet => "subnet",
            Self::NetworkInterface => "network-interface",
            Self::VirtualMachine => "virtual-machine",
        }
    }

    #[must_use]
    pub fn api_version(self) -> &'static str {
        match self {
            Self::ResourceGroup => "2021-04-01",
            Self::VirtualNetwork
            | Self::Subnet
            | Self::NetworkInterface
            | Self::VirtualMachine => "2023-09-01",
        }
    }

    /// Fully qualified resource type as reported by the resource manager.
    #[must_use]
    pub fn resource_type(self) -> &'static str {
        match self {
            Self::ResourceGroup => "Microsoft.Resources/resourceGroups",
            Self::VirtualNetwork => "Microsoft.Network/virtualNetworks",
            Self::Subnet => "Microsoft.Network/virtualNetworks/subnets",
            Self::NetworkInterface => "Microsoft.Network/networkInterfaces",
            Self::VirtualMachine => "Microsoft.Compute/virtualMachines",
        }
    }

    /// Whether the resource lives inside a parent resource of the same provider.
    #[must_use]
    pub fn is_nested(self) -> bool {
        matches!(self, Self::Subnet)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Identifier the provider assigned to a created resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Where a resource lives within a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceAddress {
    pub kind: ResourceKind,
    pub resource_group: String,
    /// Name of the enclosing resource for nested kinds (the virtual network of a subnet).
    pub parent: Option<String>,
    pub name: String,
}

impl ResourceAddress {
    /// Resource manager path of this resource, without host or query.
    #[must_use]
    pub fn path(&self, subscription_id: &str) -> String {
        let group = format!(
            "/subscriptions/{subscription_id}/resourceGroups/{}",
            self.resource_group
        );
        match self.kind {
            ResourceKind::ResourceGroup => group,
            ResourceKind::VirtualNetwork => format!(
                "{group}/providers/Microsoft.Network/virtualNetworks/{}",
                self.name
            ),
            ResourceKind::Subnet => format!(
                "{group}/providers/Microsoft.Network/virtualNetworks/{}/subnets/{}",
                self.parent.as_deref().unwrap_or_default(),
                self.name
            ),
            ResourceKind::NetworkInterface => format!(
                "{group}/providers/Microsoft.Network/networkInterfaces/{}",
                self.name
            ),
            ResourceKind::VirtualMachine => format!(
                "{group}/providers/Microsoft.Compute/virtualMachines/{}",
                self.name
            ),
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.kind, self.name)
    }
}
