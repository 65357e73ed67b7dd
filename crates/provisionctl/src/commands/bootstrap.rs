use std::path::{Path, PathBuf};

use clap::Args;
use provisioning_config::{
    ClusterVersion,
    bootstrap::{self, BootstrapOptions},
    host::HostRecord,
    per_host,
    role::{self, DhcpLeases, RoleUpdates},
    workdir::WorkDir,
};
use snafu::{ResultExt, Snafu};

use crate::files;

const HOSTS_FILE: &str = "hosts.yaml";
const DEFAULT_HOSTS_PATH: &str = "/etc/provisionctl/hosts.yaml";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load host records"))]
    LoadHosts { source: files::Error },

    #[snafu(display("failed to read DHCP lease file"))]
    ReadLease { source: files::Error },

    #[snafu(display("failed to write placeholder role documents"))]
    WritePlaceholders { source: role::Error },

    #[snafu(display("failed to update bootstrap document"))]
    UpdateBootstrap { source: bootstrap::Error },

    #[snafu(display("failed to update role documents"))]
    UpdateRoleDocuments { source: role::Error },

    #[snafu(display("failed to create host documents"))]
    CreateHostDocuments { source: per_host::Error },
}

#[derive(Debug, Args)]
pub struct BootstrapArguments {
    /// Directory holding the installer output: `bootstrap.ign`, and `master.ign` plus
    /// `worker.ign` unless the cluster is a single node one.
    #[arg(long, value_name = "DIR")]
    pub work_dir: PathBuf,

    /// YAML or JSON list of the hosts of the cluster. Defaults to `hosts.yaml` in the
    /// working directory, then `/etc/provisionctl/hosts.yaml`.
    #[arg(long, value_name = "FILE")]
    pub hosts: Option<PathBuf>,

    /// The cluster runs the bare metal operator.
    #[arg(long)]
    pub baremetal_provisioning: bool,

    /// The cluster consists of a single node, which bootstraps in place.
    #[arg(long)]
    pub single_node: bool,

    /// CA certificate of the assisted service, installed on every host.
    #[arg(long, env = "SERVICE_CA_CERT_PATH", value_name = "FILE")]
    pub service_ca_cert_path: Option<PathBuf>,

    /// Comma separated IPs of the assisted service.
    #[arg(long, env = "SERVICE_IPS")]
    pub service_ips: Option<String>,

    /// Version of the cluster being installed. When given, hosts are told to identify
    /// themselves to DHCPv6 servers by MAC address.
    #[arg(long, value_name = "VERSION")]
    pub ipv6_cluster_version: Option<ClusterVersion>,

    /// Keepalived monitor configuration handing out the virtual IPs over DHCP.
    #[arg(long, value_name = "FILE")]
    pub dhcp_monitor_config: Option<PathBuf>,

    /// Lease of the API virtual IP.
    #[arg(long, value_name = "FILE", requires = "dhcp_monitor_config")]
    pub api_vip_lease: Option<PathBuf>,

    /// Lease of the ingress virtual IP.
    #[arg(long, value_name = "FILE", requires = "dhcp_monitor_config")]
    pub ingress_vip_lease: Option<PathBuf>,
}

async fn read_optional(path: Option<&Path>) -> Result<Option<Vec<u8>>, Error> {
    match path {
        Some(path) => Ok(Some(files::read(path).await.context(ReadLeaseSnafu)?)),
        None => Ok(None),
    }
}

async fn dhcp_leases(arguments: &BootstrapArguments) -> Result<Option<DhcpLeases>, Error> {
    let Some(monitor_config) = read_optional(arguments.dhcp_monitor_config.as_deref()).await?
    else {
        return Ok(None);
    };

    Ok(Some(DhcpLeases {
        monitor_config,
        api_vip_lease: read_optional(arguments.api_vip_lease.as_deref()).await?,
        ingress_vip_lease: read_optional(arguments.ingress_vip_lease.as_deref()).await?,
    }))
}

pub async fn run(arguments: BootstrapArguments) -> Result<(), Error> {
    let work_dir = WorkDir::new(&arguments.work_dir);
    let default_hosts_paths = [work_dir.path(HOSTS_FILE), PathBuf::from(DEFAULT_HOSTS_PATH)];
    let hosts: Vec<HostRecord> = files::load(arguments.hosts.as_deref(), &default_hosts_paths)
        .await
        .context(LoadHostsSnafu)?;

    if arguments.single_node {
        role::write_placeholder_documents(&work_dir)
            .await
            .context(WritePlaceholdersSnafu)?;
    }

    let options = BootstrapOptions {
        baremetal_provisioning: arguments.baremetal_provisioning,
        single_node: arguments.single_node,
    };
    bootstrap::update_bootstrap(&work_dir, &hosts, options)
        .await
        .context(UpdateBootstrapSnafu)?;

    let updates = RoleUpdates {
        service_ca_cert: arguments.service_ca_cert_path.clone(),
        dhcp: dhcp_leases(&arguments).await?,
        ipv6: arguments.ipv6_cluster_version,
        service_ips: arguments.service_ips.clone(),
    };
    role::update_role_documents(&work_dir, &updates)
        .await
        .context(UpdateRoleDocumentsSnafu)?;

    per_host::create_host_documents(&work_dir, &hosts)
        .await
        .context(CreateHostDocumentsSnafu)?;

    tracing::info!(
        work_dir = %work_dir.root().display(),
        hosts = hosts.len(),
        "generated installation ignition configs"
    );
    Ok(())
}
