use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{CoreError, Result};
use crate::types::{ResourceAddress, ResourceKind};

pub const DEFAULT_LOCATION: &str = "westus2";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Process-wide settings, resolved once at startup and read-only afterwards.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub subscription_id: Option<String>,
    pub location: String,
    pub names: ResourceNames,
    pub network: NetworkSettings,
    pub vm: VmSettings,
    pub polling: PollSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subscription_id: None,
            location: DEFAULT_LOCATION.to_string(),
            names: ResourceNames::default(),
            network: NetworkSettings::default(),
            vm: VmSettings::default(),
            polling: PollSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResourceNames {
    pub resource_group: String,
    pub virtual_network: String,
    pub subnet: String,
    pub network_interface: String,
    pub virtual_machine: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            resource_group: String::from("arm-provision-rg"),
            virtual_network: String::from("arm-provision-vnet"),
            subnet: String::from("internal"),
            network_interface: String::from("arm-provision-nic"),
            virtual_machine: String::from("arm-provision-vm"),
        }
    }
}

impl ResourceNames {
    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::ResourceGroup => &self.resource_group,
            ResourceKind::VirtualNetwork => &self.virtual_network,
            ResourceKind::Subnet => &self.subnet,
            ResourceKind::NetworkInterface => &self.network_interface,
            ResourceKind::VirtualMachine => &self.virtual_machine,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkSettings {
    pub address_prefix: String,
    pub subnet_prefix: String,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            address_prefix: String::from("10.0.0.0/16"),
            subnet_prefix: String::from("10.0.2.0/24"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmSettings {
    pub size: String,
    pub admin_username: String,
    pub admin_password: Option<String>,
    pub computer_name: String,
    pub image: ImageReference,
    pub os_disk_storage: String,
}

impl Default for VmSettings {
    fn default() -> Self {
        Self {
            size: String::from("Standard_F2"),
            admin_username: String::from("adminuser"),
            admin_password: None,
            computer_name: String::from("arcturus"),
            image: ImageReference::default(),
            os_disk_storage: String::from("Standard_LRS"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageReference {
    pub publisher: String,
    pub offer: String,
    pub sku: String,
    pub version: String,
}

impl Default for ImageReference {
    fn default() -> Self {
        Self {
            publisher: String::from("MicrosoftWindowsServer"),
            offer: String::from("WindowsServer"),
            sku: String::from("2016-Datacenter"),
            version: String::from("latest"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollSettings {
    pub interval_secs: u64,
    /// No deadline when unset; long-running operations are awaited until they finish.
    pub timeout_secs: Option<u64>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            timeout_secs: None,
        }
    }
}

impl PollSettings {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Settings {
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid settings TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| CoreError::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| CoreError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overlay values from the environment.
    ///
    /// `lookup` is `std::env::var` in production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = non_empty("SUBSCRIPTION_ID").or_else(|| non_empty("AZURE_SUBSCRIPTION_ID"))
        {
            self.subscription_id = Some(id);
        }
        if let Some(location) = non_empty("AZURE_LOCATION") {
            self.location = location;
        }
        if let Some(user) = non_empty("VM_ADMIN_USERNAME") {
            self.vm.admin_username = user;
        }
        if let Some(password) = non_empty("VM_ADMIN_PASSWORD") {
            self.vm.admin_password = Some(password);
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }

    /// # Errors
    ///
    /// Returns an error naming the first empty or malformed setting.
    pub fn validate(&self) -> Result<()> {
        if self.location.trim().is_empty() {
            return Err(CoreError::InvalidSetting {
                field: "location",
                reason: "must not be empty".to_string(),
            });
        }
        for kind in ResourceKind::CHAIN {
            if self.names.get(kind).trim().is_empty() {
                return Err(CoreError::InvalidSetting {
                    field: name_field(kind),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        for (field, prefix) in [
            ("network.address_prefix", &self.network.address_prefix),
            ("network.subnet_prefix", &self.network.subnet_prefix),
        ] {
            if !is_cidr(prefix) {
                return Err(CoreError::InvalidSetting {
                    field,
                    reason: format!("'{prefix}' is not a CIDR block"),
                });
            }
        }
        if self.polling.interval_secs == 0 {
            return Err(CoreError::InvalidSetting {
                field: "polling.interval_secs",
                reason: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if no subscription is configured.
    pub fn require_subscription(&self) -> Result<&str> {
        self.subscription_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(CoreError::MissingSetting {
                field: "subscription_id",
                hint: "SUBSCRIPTION_ID or --subscription-id",
            })
    }

    /// # Errors
    ///
    /// Returns an error if no administrator password is configured.
    pub fn require_admin_password(&self) -> Result<&str> {
        self.vm
            .admin_password
            .as_deref()
            .ok_or(CoreError::MissingSetting {
                field: "vm.admin_password",
                hint: "VM_ADMIN_PASSWORD",
            })
    }

    /// Address of the configured resource of `kind`.
    #[must_use]
    pub fn address(&self, kind: ResourceKind) -> ResourceAddress {
        ResourceAddress {
            kind,
            resource_group: self.names.resource_group.clone(),
            parent: kind
                .is_nested()
                .then(|| self.names.virtual_network.clone()),
            name: self.names.get(kind).to_string(),
        }
    }
}

fn name_field(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::ResourceGroup => "names.resource_group",
        ResourceKind::VirtualNetwork => "names.virtual_network",
        ResourceKind::Subnet => "names.subnet",
        ResourceKind::NetworkInterface => "names.network_interface",
        ResourceKind::VirtualMachine => "names.virtual_machine",
    }
}

fn is_cidr(value: &str) -> bool {
    let Some((addr, bits)) = value.split_once('/') else {
        return false;
    };
    let max_bits = match addr.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => 32,
        Ok(IpAddr::V6(_)) => 128,
        Err(_) => return false,
    };
    bits.parse::<u8>().is_ok_and(|b| b <= max_bits)
}
