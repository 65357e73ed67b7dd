//! Cluster-wide additions to the `master` and `worker` role documents.
//!
//! The installer generates one document per role. Every host of that role boots from it,
//! so anything all hosts of a role need goes here before the per-host documents are derived.
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    document::Config,
    mutate::{self, FileBuilder},
    normalize,
    source::ContentSource,
    version::ClusterVersion,
    workdir::{self, BOOTSTRAP_DOCUMENT, MASTER_DOCUMENT, WORKER_DOCUMENT, WorkDir},
};

/// Where hosts find the CA that signed the certificate of the assisted service.
pub const HOST_CA_CERT_PATH: &str = "/etc/assisted-service/service-ca-cert.crt";

pub const ETC_HOSTS_PATH: &str = "/etc/hosts";

/// Hostname the service IPs are mapped to in `/etc/hosts`.
pub const SERVICE_HOSTNAME: &str = "assisted-api.local.openshift.io";

pub const IPV6_CONFIG_PATH: &str = "/etc/NetworkManager/conf.d/01-ipv6.conf";

/// Makes DHCPv6 identify hosts by their MAC address.
pub const IPV6_CLIENT_ID_CONF: &str = "[connection]\nipv6.dhcp-iaid=mac\nipv6.dhcp-duid=ll\n";

/// [`IPV6_CLIENT_ID_CONF`] for clusters of version 4.10 and newer, which keep their merged
/// connection profiles in a separate directory.
pub const IPV6_CLIENT_ID_RUNTIME_CONF: &str = "[connection]\nipv6.dhcp-iaid=mac\nipv6.dhcp-duid=ll\n[keyfile]\npath=/etc/NetworkManager/system-connections-merged\n";

pub const KEEPALIVED_MONITOR_CONFIG_PATH: &str = "/etc/keepalived/unsupported-monitor.conf";
pub const KEEPALIVED_API_LEASE_PATH: &str = "/etc/keepalived/lease-api";
pub const KEEPALIVED_INGRESS_LEASE_PATH: &str = "/etc/keepalived/lease-ingress";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read service CA certificate {path:?}"))]
    ReadServiceCaCert {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to access {document} in the working directory"))]
    WorkDir {
        source: workdir::Error,
        document: String,
    },

    #[snafu(display("failed to parse {document}"))]
    ParseDocument {
        source: normalize::Error,
        document: String,
    },

    #[snafu(display("failed to serialize {document}"))]
    SerializeDocument {
        source: normalize::Error,
        document: String,
    },
}

/// Keepalived files the masters need to hand out the virtual IPs over DHCP.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DhcpLeases {
    pub monitor_config: Vec<u8>,
    pub api_vip_lease: Option<Vec<u8>>,
    pub ingress_vip_lease: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleUpdates {
    /// CA certificate of the assisted service, read from disk.
    pub service_ca_cert: Option<PathBuf>,

    /// Only added to the master document.
    pub dhcp: Option<DhcpLeases>,

    /// Set to the version of the cluster being installed when it has IPv6 addresses.
    pub ipv6: Option<ClusterVersion>,

    /// Comma separated IPs of the assisted service.
    pub service_ips: Option<String>,
}

pub fn set_ca_cert(config: &mut Config, ca_cert: &[u8]) {
    mutate::set_file(
        config,
        FileBuilder::new(HOST_CA_CERT_PATH, ContentSource::inline(ca_cert)),
    );
}

pub fn set_dhcp_leases(config: &mut Config, leases: &DhcpLeases) {
    let files = [
        (KEEPALIVED_MONITOR_CONFIG_PATH, Some(&leases.monitor_config)),
        (KEEPALIVED_API_LEASE_PATH, leases.api_vip_lease.as_ref()),
        (KEEPALIVED_INGRESS_LEASE_PATH, leases.ingress_vip_lease.as_ref()),
    ];

    for (path, contents) in files {
        if let Some(contents) = contents.filter(|contents| !contents.is_empty()) {
            mutate::set_file(
                config,
                FileBuilder::new(path, ContentSource::inline(contents.as_slice())),
            );
        }
    }
}

/// The IPv6 client identifier policy for hosts installing `cluster_version`.
pub fn ipv6_client_id_conf(cluster_version: ClusterVersion) -> &'static str {
    if cluster_version.at_least(4, 10) {
        IPV6_CLIENT_ID_RUNTIME_CONF
    } else {
        IPV6_CLIENT_ID_CONF
    }
}

pub fn set_ipv6_client_id(config: &mut Config, cluster_version: ClusterVersion) {
    mutate::set_file(
        config,
        FileBuilder::new(
            IPV6_CONFIG_PATH,
            ContentSource::inline(ipv6_client_id_conf(cluster_version)),
        ),
    );
}

/// One `/etc/hosts` line per non-empty IP in the comma separated `service_ips`.
pub fn service_ip_hosts(service_ips: &str) -> String {
    service_ips
        .trim()
        .split(',')
        .filter(|ip| !ip.is_empty())
        .map(|ip| format!("{ip} {SERVICE_HOSTNAME}\n"))
        .collect()
}

pub fn set_etc_hosts(config: &mut Config, service_ips: &str) {
    let hosts = service_ip_hosts(service_ips);
    if !hosts.is_empty() {
        mutate::append_line(config, ETC_HOSTS_PATH, hosts, mutate::DEFAULT_FILE_MODE);
    }
}

async fn update_document(
    work_dir: &WorkDir,
    document: &str,
    update: impl FnOnce(&mut Config),
) -> Result<()> {
    let bytes = work_dir
        .read(document)
        .await
        .context(WorkDirSnafu { document })?;
    let mut config = normalize::parse(&bytes).context(ParseDocumentSnafu { document })?;

    update(&mut config);

    let bytes = normalize::to_vec(&config).context(SerializeDocumentSnafu { document })?;
    work_dir
        .write(document, &bytes)
        .await
        .context(WorkDirSnafu { document })
}

async fn read_service_ca_cert(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .context(ReadServiceCaCertSnafu { path })
}

/// Applies `updates` to `master.ign` and `worker.ign` in the working directory.
#[instrument(skip_all, fields(work_dir = %work_dir.root().display()))]
pub async fn update_role_documents(work_dir: &WorkDir, updates: &RoleUpdates) -> Result<()> {
    let ca_cert = match &updates.service_ca_cert {
        Some(path) => Some(read_service_ca_cert(path).await?),
        None => None,
    };

    for document in [MASTER_DOCUMENT, WORKER_DOCUMENT] {
        let is_master = document == MASTER_DOCUMENT;
        update_document(work_dir, document, |config| {
            if let Some(ca_cert) = &ca_cert {
                set_ca_cert(config, ca_cert);
            }
            if let Some(leases) = updates.dhcp.as_ref().filter(|_| is_master) {
                set_dhcp_leases(config, leases);
            }
            if let Some(cluster_version) = updates.ipv6 {
                set_ipv6_client_id(config, cluster_version);
            }
            if let Some(service_ips) = &updates.service_ips {
                set_etc_hosts(config, service_ips);
            }
        })
        .await?;
        tracing::info!(document, "updated role document");
    }

    Ok(())
}

/// Writes `master.ign` and `worker.ign` for single node clusters.
///
/// Such clusters install from the bootstrap document alone. The role documents only exist
/// so the per-host phase has a base to work from, and declare the bootstrap document's
/// version.
#[instrument(skip_all, fields(work_dir = %work_dir.root().display()))]
pub async fn write_placeholder_documents(work_dir: &WorkDir) -> Result<()> {
    let bytes = work_dir
        .read(BOOTSTRAP_DOCUMENT)
        .await
        .context(WorkDirSnafu {
            document: BOOTSTRAP_DOCUMENT,
        })?;
    let bootstrap = normalize::parse(&bytes).context(ParseDocumentSnafu {
        document: BOOTSTRAP_DOCUMENT,
    })?;

    let placeholder = Config::new(bootstrap.version());
    for document in [MASTER_DOCUMENT, WORKER_DOCUMENT] {
        let bytes = normalize::to_vec(&placeholder).context(SerializeDocumentSnafu { document })?;
        work_dir
            .write(document, &bytes)
            .await
            .context(WorkDirSnafu { document })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::version::SpecVersion;

    #[rstest]
    #[case("", "")]
    #[case("10.0.0.1", "10.0.0.1 assisted-api.local.openshift.io\n")]
    #[case(
        " 10.0.0.1,,fd00::1 ",
        "10.0.0.1 assisted-api.local.openshift.io\nfd00::1 assisted-api.local.openshift.io\n"
    )]
    fn service_ip_host_lines(#[case] service_ips: &str, #[case] expected: &str) {
        assert_eq!(service_ip_hosts(service_ips), expected);
    }

    #[rstest]
    #[case("4.9", IPV6_CLIENT_ID_CONF)]
    #[case("4.10.0-0.alpha", IPV6_CLIENT_ID_RUNTIME_CONF)]
    #[case("4.12.3", IPV6_CLIENT_ID_RUNTIME_CONF)]
    fn ipv6_policy_depends_on_cluster_version(#[case] version: &str, #[case] expected: &str) {
        let version: ClusterVersion = version.parse().expect("valid cluster version");
        assert_eq!(ipv6_client_id_conf(version), expected);
    }

    #[test]
    fn optional_leases_are_skipped() {
        let mut config = Config::new(SpecVersion::V3_1);
        set_dhcp_leases(
            &mut config,
            &DhcpLeases {
                monitor_config: b"monitor".to_vec(),
                api_vip_lease: Some(b"lease".to_vec()),
                ingress_vip_lease: None,
            },
        );

        let paths: Vec<_> = config.storage.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, [KEEPALIVED_MONITOR_CONFIG_PATH, KEEPALIVED_API_LEASE_PATH]);
        assert!(config.storage.files.iter().all(|f| f.mode == Some(0o644)));
    }

    async fn seed(work_dir: &WorkDir, document: &str, version: SpecVersion) {
        let bytes = normalize::to_vec(&Config::new(version)).expect("serializable");
        work_dir.write(document, &bytes).await.expect("seed document");
    }

    async fn load(work_dir: &WorkDir, document: &str) -> Config {
        normalize::parse(&work_dir.read(document).await.expect("readable")).expect("valid")
    }

    #[tokio::test]
    async fn updates_both_role_documents() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let work_dir = WorkDir::new(dir.path());
        seed(&work_dir, MASTER_DOCUMENT, SpecVersion::V3_2).await;
        seed(&work_dir, WORKER_DOCUMENT, SpecVersion::V3_2).await;
        let ca_path = dir.path().join("service-ca.crt");
        std::fs::write(&ca_path, "-----BEGIN CERTIFICATE-----\n").expect("seed CA");

        let updates = RoleUpdates {
            service_ca_cert: Some(ca_path),
            dhcp: Some(DhcpLeases {
                monitor_config: b"monitor".to_vec(),
                ..DhcpLeases::default()
            }),
            ipv6: Some("4.11".parse().expect("valid cluster version")),
            service_ips: Some("10.0.0.1".to_owned()),
        };
        update_role_documents(&work_dir, &updates)
            .await
            .expect("update succeeds");

        let master = load(&work_dir, MASTER_DOCUMENT).await;
        let worker = load(&work_dir, WORKER_DOCUMENT).await;
        for config in [&master, &worker] {
            assert_eq!(config.version(), SpecVersion::V3_2);
            assert_eq!(
                config.files_at(HOST_CA_CERT_PATH).next().and_then(|f| f.contents.source.clone()),
                Some(ContentSource::inline("-----BEGIN CERTIFICATE-----\n"))
            );
            assert_eq!(config.files_at(IPV6_CONFIG_PATH).count(), 1);
            assert!(config.files_at(ETC_HOSTS_PATH).all(|f| f.is_append_only()));
        }
        assert_eq!(master.files_at(KEEPALIVED_MONITOR_CONFIG_PATH).count(), 1);
        assert_eq!(worker.files_at(KEEPALIVED_MONITOR_CONFIG_PATH).count(), 0);
    }

    #[tokio::test]
    async fn unreadable_ca_is_an_error() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let work_dir = WorkDir::new(dir.path());
        seed(&work_dir, MASTER_DOCUMENT, SpecVersion::V3_1).await;
        seed(&work_dir, WORKER_DOCUMENT, SpecVersion::V3_1).await;

        let updates = RoleUpdates {
            service_ca_cert: Some(dir.path().join("missing.crt")),
            ..RoleUpdates::default()
        };
        let err = update_role_documents(&work_dir, &updates)
            .await
            .expect_err("CA does not exist");
        assert!(matches!(err, Error::ReadServiceCaCert { .. }));
    }

    #[tokio::test]
    async fn placeholders_use_bootstrap_version() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let work_dir = WorkDir::new(dir.path());
        seed(&work_dir, BOOTSTRAP_DOCUMENT, SpecVersion::V3_1).await;

        write_placeholder_documents(&work_dir)
            .await
            .expect("placeholders are written");

        for document in [MASTER_DOCUMENT, WORKER_DOCUMENT] {
            assert_eq!(load(&work_dir, document).await, Config::new(SpecVersion::V3_1));
        }
    }
}
