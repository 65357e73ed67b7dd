//! The `BareMetalHost` objects the installer embeds into the bootstrap document.
//!
//! Only the parts this crate touches are typed. The rest of `spec` is carried through
//! untouched.
use std::{collections::BTreeMap, net::IpAddr};

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, Snafu};

use crate::{
    document::File,
    host::HostRecord,
    inventory::{Interface, Inventory, InventoryParseError},
    source::ContentSource,
};

/// Annotation holding the serialized [`BareMetalHostStatus`], used by the operator to adopt
/// hosts that were provisioned externally.
pub const STATUS_ANNOTATION: &str = "baremetalhost.metal3.io/status";

/// File paths containing this marker hold a `BareMetalHost`.
pub const PATH_MARKER: &str = "openshift-cluster-api_hosts";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("file {path:?} has no inline contents"))]
    MissingContents { path: String },

    #[snafu(display("failed to parse BareMetalHost from file {path:?}"))]
    Deserialize {
        source: serde_yaml::Error,
        path: String,
    },

    #[snafu(display("failed to parse inventory of host {host_id}"))]
    ParseInventory {
        source: InventoryParseError,
        host_id: String,
    },

    #[snafu(display("failed to serialize status of BareMetalHost {name:?}"))]
    SerializeStatus {
        source: serde_json::Error,
        name: String,
    },

    #[snafu(display("failed to serialize BareMetalHost {name:?}"))]
    Serialize {
        source: serde_yaml::Error,
        name: String,
    },
}

#[derive(CustomResource, Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
    group = "metal3.io",
    version = "v1alpha1",
    kind = "BareMetalHost",
    namespaced,
    status = "BareMetalHostStatus"
)]
#[serde(rename_all = "camelCase")]
pub struct BareMetalHostSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub externally_provisioned: Option<bool>,

    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BareMetalHostStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<HardwareDetails>,

    #[serde(default)]
    pub powered_on: bool,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HardwareDetails {
    pub system_vendor: HardwareSystemVendor,
    pub ram_mebibytes: i64,
    pub nics: Vec<Nic>,
    pub storage: Vec<Storage>,
    pub cpu: Cpu,
    pub hostname: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HardwareSystemVendor {
    pub manufacturer: String,
    pub product_name: String,
    pub serial_number: String,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Cpu {
    pub arch: String,
    pub model: String,
    pub clock_megahertz: f64,
    pub flags: Vec<String>,
    pub count: i64,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Nic {
    pub name: String,
    pub model: String,
    pub mac: String,
    pub ip: String,
    pub speed_gbps: i64,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Storage {
    pub name: String,
    pub rotational: bool,
    pub size_bytes: i64,
    pub vendor: String,
    pub model: String,
    pub serial_number: String,
    pub wwn: String,
    pub hctl: String,
}

pub fn is_bare_metal_host_file(file: &File) -> bool {
    file.path.contains(PATH_MARKER)
}

impl BareMetalHost {
    /// Decodes the object embedded in a bootstrap document file entry.
    pub fn from_file(file: &File) -> Result<Self> {
        let contents = file
            .contents
            .source
            .as_ref()
            .and_then(ContentSource::as_inline)
            .context(MissingContentsSnafu { path: &file.path })?;

        serde_yaml::from_slice(contents).context(DeserializeSnafu { path: &file.path })
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    /// Records the hardware of `host` in the status annotation and marks the host as
    /// externally provisioned when `externally_provisioned` is set.
    pub fn adopt(&mut self, host: &HostRecord, externally_provisioned: bool) -> Result<()> {
        let inventory = host.parse_inventory().context(ParseInventorySnafu {
            host_id: &host.id,
        })?;

        let status = BareMetalHostStatus {
            hardware: Some(hardware_details(
                &inventory,
                host.requested_hostname.as_deref().unwrap_or_default(),
            )),
            powered_on: true,
        };
        let status = serde_json::to_string(&status).context(SerializeStatusSnafu {
            name: self.name(),
        })?;

        self.metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .insert(STATUS_ANNOTATION.to_owned(), status);
        if externally_provisioned {
            self.spec.externally_provisioned = Some(true);
        }

        Ok(())
    }

    /// Encodes the object as YAML, without any status block.
    pub fn to_yaml(&self) -> Result<String> {
        let mut value = serde_yaml::to_value(self).context(SerializeSnafu { name: self.name() })?;
        if let serde_yaml::Value::Mapping(mapping) = &mut value {
            mapping.remove("status");
        }

        serde_yaml::to_string(&value).context(SerializeSnafu { name: self.name() })
    }
}

fn hardware_details(inventory: &Inventory, hostname: &str) -> HardwareDetails {
    let cpu = inventory.cpu.clone().unwrap_or_default();

    HardwareDetails {
        system_vendor: inventory
            .system_vendor
            .as_ref()
            .map(|vendor| HardwareSystemVendor {
                manufacturer: vendor.manufacturer.clone(),
                product_name: vendor.product_name.clone(),
                serial_number: vendor.serial_number.clone(),
            })
            .unwrap_or_default(),
        ram_mebibytes: inventory
            .memory
            .as_ref()
            .map_or(0, |memory| memory.physical_bytes / 1024 / 1024),
        nics: inventory.interfaces.iter().map(nic).collect(),
        storage: inventory
            .disks
            .iter()
            .map(|disk| Storage {
                name: disk.name.clone(),
                rotational: disk.is_rotational(),
                size_bytes: disk.size_bytes,
                vendor: disk.vendor.clone(),
                model: disk.model.clone(),
                serial_number: disk.serial.clone(),
                wwn: disk.wwn.clone(),
                hctl: disk.hctl.clone(),
            })
            .collect(),
        cpu: Cpu {
            arch: cpu.architecture,
            model: cpu.model_name,
            clock_megahertz: cpu.frequency,
            flags: cpu.flags,
            count: cpu.count,
        },
        hostname: hostname.to_owned(),
    }
}

fn nic(interface: &Interface) -> Nic {
    let address = interface
        .ipv4_addresses
        .first()
        .or_else(|| interface.ipv6_addresses.first());

    Nic {
        name: interface.name.clone(),
        model: interface.product.clone(),
        mac: interface.mac_address.clone(),
        ip: address.map(|cidr| interface_ip(cidr)).unwrap_or_default(),
        speed_gbps: interface.speed_mbps / 1024,
    }
}

/// Strips the prefix length off an address in CIDR notation.
fn interface_ip(cidr: &str) -> String {
    let address = cidr.split_once('/').map_or(cidr, |(address, _)| address);
    match address.parse::<IpAddr>() {
        Ok(ip) => ip.to_string(),
        Err(error) => {
            tracing::warn!(cidr, %error, "failed to parse interface address");
            String::new()
        }
    }
}
