//! The hardware inventory reported by the discovery agent running on a host.
//!
//! Only the fields needed to describe a host to the cluster are modelled; everything else
//! in the report is ignored.
use serde::Deserialize;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(display("failed to parse host inventory"))]
pub struct InventoryParseError {
    source: serde_json::Error,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Inventory {
    pub hostname: String,
    pub cpu: Option<Cpu>,
    pub memory: Option<Memory>,
    pub interfaces: Vec<Interface>,
    pub disks: Vec<Disk>,
    pub system_vendor: Option<SystemVendor>,
}

impl Inventory {
    pub fn from_json(json: &str) -> Result<Self, InventoryParseError> {
        serde_json::from_str(json).context(InventoryParseSnafu)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Cpu {
    pub architecture: String,
    pub model_name: String,
    /// Clock speed in MHz.
    pub frequency: f64,
    pub flags: Vec<String>,
    pub count: i64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Memory {
    pub physical_bytes: i64,
    pub usable_bytes: i64,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Interface {
    pub name: String,
    pub product: String,
    pub mac_address: String,
    pub speed_mbps: i64,
    /// Addresses in CIDR notation.
    pub ipv4_addresses: Vec<String>,
    /// Addresses in CIDR notation.
    pub ipv6_addresses: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Disk {
    pub name: String,
    pub vendor: String,
    pub size_bytes: i64,
    pub model: String,
    pub wwn: String,
    pub hctl: String,
    pub serial: String,
    pub drive_type: String,
}

impl Disk {
    pub fn is_rotational(&self) -> bool {
        self.drive_type == "HDD"
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SystemVendor {
    pub manufacturer: String,
    pub product_name: String,
    pub serial_number: String,
    #[serde(rename = "virtual")]
    pub is_virtual: bool,
}
