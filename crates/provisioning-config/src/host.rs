//! Host records as handed over by the cluster inventory.
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::inventory::{Inventory, InventoryParseError};

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumString, Eq, Hash, PartialEq, Serialize,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum HostRole {
    Master,
    Worker,
    #[default]
    AutoAssign,
}

/// A host that is part of the cluster being installed.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    pub id: String,

    #[serde(default)]
    pub role: HostRole,

    /// The role picked for the host when [`HostRecord::role`] is [`HostRole::AutoAssign`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_role: Option<HostRole>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_hostname: Option<String>,

    /// The hardware inventory reported by the agent, as JSON text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<String>,

    /// A provisioning config document to merge into the final config of this host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignition_config_overrides: Option<String>,
}

impl HostRecord {
    pub fn effective_role(&self) -> HostRole {
        match (self.role, self.suggested_role) {
            (HostRole::AutoAssign, Some(suggested)) => suggested,
            (role, _) => role,
        }
    }

    pub fn parse_inventory(&self) -> Result<Inventory, InventoryParseError> {
        match self.inventory.as_deref() {
            Some(inventory) if !inventory.is_empty() => Inventory::from_json(inventory),
            _ => Ok(Inventory::default()),
        }
    }

    /// The requested hostname, or the one reported in the inventory.
    pub fn current_hostname(&self) -> Result<String, InventoryParseError> {
        match self.requested_hostname.as_deref().filter(|h| !h.is_empty()) {
            Some(requested) => Ok(requested.to_owned()),
            None => Ok(self.parse_inventory()?.hostname),
        }
    }

    /// Same as [`HostRecord::current_hostname`], but an unparsable inventory or an empty
    /// hostname count as no hostname.
    pub fn hostname(&self) -> Option<String> {
        self.current_hostname()
            .ok()
            .filter(|hostname| !hostname.is_empty())
    }

    /// The hostname used to order and identify hosts, falling back to the host id.
    pub fn display_hostname(&self) -> String {
        self.hostname().unwrap_or_else(|| self.id.clone())
    }

    /// The file name of the final provisioning config of this host, `<role>-<id>.ign`.
    pub fn document_file_name(&self) -> String {
        format!("{}-{}.ign", self.effective_role(), self.id)
    }

    pub fn overrides(&self) -> Option<&str> {
        self.ignition_config_overrides
            .as_deref()
            .filter(|overrides| !overrides.trim().is_empty())
    }
}

/// Splits `hosts` into masters and all other hosts, each ordered by hostname.
///
/// The order is stable, so hosts sharing a hostname keep their relative order. Bootstrap
/// post-processing correlates hosts with the installer's host descriptors by this order.
pub fn sort_hosts(hosts: &[HostRecord]) -> (Vec<&HostRecord>, Vec<&HostRecord>) {
    let (mut masters, mut workers): (Vec<_>, Vec<_>) = hosts
        .iter()
        .partition(|host| host.effective_role() == HostRole::Master);

    masters.sort_by_cached_key(|host| host.display_hostname());
    workers.sort_by_cached_key(|host| host.display_hostname());
    (masters, workers)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn host(id: &str, role: HostRole, hostname: &str) -> HostRecord {
        HostRecord {
            id: id.to_owned(),
            role,
            requested_hostname: Some(hostname.to_owned()),
            ..HostRecord::default()
        }
    }

    #[rstest]
    #[case(HostRole::Master, None, HostRole::Master)]
    #[case(HostRole::AutoAssign, Some(HostRole::Worker), HostRole::Worker)]
    #[case(HostRole::AutoAssign, Some(HostRole::Master), HostRole::Master)]
    #[case(HostRole::AutoAssign, None, HostRole::AutoAssign)]
    #[case(HostRole::Worker, Some(HostRole::Master), HostRole::Worker)]
    fn effective_role(
        #[case] role: HostRole,
        #[case] suggested_role: Option<HostRole>,
        #[case] expected: HostRole,
    ) {
        let host = HostRecord {
            role,
            suggested_role,
            ..HostRecord::default()
        };
        assert_eq!(host.effective_role(), expected);
    }

    #[test]
    fn hostname_falls_back_to_inventory_then_id() {
        let mut host = HostRecord {
            id: "3f1a".to_owned(),
            inventory: Some(r#"{ "hostname": "from-inventory" }"#.to_owned()),
            ..HostRecord::default()
        };
        assert_eq!(host.display_hostname(), "from-inventory");

        host.requested_hostname = Some("requested".to_owned());
        assert_eq!(host.display_hostname(), "requested");

        host.requested_hostname = None;
        host.inventory = Some("not json".to_owned());
        assert_eq!(host.hostname(), None);
        assert_eq!(host.display_hostname(), "3f1a");
    }

    #[test]
    fn document_file_name_uses_effective_role() {
        let host = HostRecord {
            id: "3f1a".to_owned(),
            role: HostRole::AutoAssign,
            suggested_role: Some(HostRole::Master),
            ..HostRecord::default()
        };
        assert_eq!(host.document_file_name(), "master-3f1a.ign");
    }

    #[test]
    fn sort_hosts_splits_by_role_and_orders_by_hostname() {
        let hosts = [
            host("1", HostRole::Worker, "worker-1"),
            host("2", HostRole::Master, "master-2"),
            host("3", HostRole::Master, "master-0"),
            host("4", HostRole::AutoAssign, "auto-0"),
            host("5", HostRole::Worker, "worker-0"),
            host("6", HostRole::Master, "master-1"),
        ];

        let (masters, workers) = sort_hosts(&hosts);
        let ids = |hosts: Vec<&HostRecord>| hosts.iter().map(|h| h.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(masters), ["3", "6", "2"]);
        assert_eq!(ids(workers), ["4", "5", "1"]);
    }

    #[test]
    fn sort_is_stable_for_equal_hostnames() {
        let hosts = [
            host("b", HostRole::Master, "same"),
            host("a", HostRole::Master, "same"),
        ];

        let (masters, _) = sort_hosts(&hosts);
        assert_eq!(masters[0].id, "b");
        assert_eq!(masters[1].id, "a");
    }

    #[test]
    fn deserializes_camel_case_record() {
        let host: HostRecord = serde_yaml::from_str(indoc::indoc! {"
            id: 3f1a
            role: auto-assign
            suggestedRole: worker
            requestedHostname: worker-0
            ignitionConfigOverrides: '{}'
        "})
        .expect("valid host record");

        assert_eq!(host.effective_role(), HostRole::Worker);
        assert_eq!(host.overrides(), Some("{}"));
    }
}
