//! Post-processing of the bootstrap document generated by the installer.
//!
//! The installer knows nothing about the hosts that were discovered by the agents. This
//! module fixes up its output: it drops or repairs entries that are known to be broken,
//! correlates every embedded `BareMetalHost` with a discovered host and records that host's
//! hardware on it, and adds the files the cluster bootstrap expects.
use std::collections::VecDeque;

use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::instrument;

use crate::{
    document::{Config, File},
    host::{HostRecord, HostRole, sort_hosts},
    mutate::{self, FileBuilder},
    normalize,
    source::ContentSource,
    workdir::{self, BOOTSTRAP_DOCUMENT, WorkDir},
};

pub mod bare_metal_host;

pub use bare_metal_host::BareMetalHost;

pub const MOTD_PATH: &str = "/etc/motd";

/// Present on the bootstrap node of multi-node clusters only.
pub const BOOTSTRAP_MARKER_PATH: &str = "/opt/openshift/assisted-install-bootstrap";

pub const KNI_NETWORK_MANAGER_CONFIG_PATH: &str = "/etc/NetworkManager/conf.d/99-kni.conf";

/// Keeps NetworkManager from managing `/etc/resolv.conf`.
pub const UNMANAGED_RESOLV_CONF: &str = "[main]\nrc-manager=unmanaged\n";

pub const CVO_OVERRIDES_PATH: &str = "/opt/openshift/manifests/cvo-overrides.yaml";

const BAREMETAL_PROVISIONING_CONFIG_MARKER: &str = "baremetal-provisioning-config";

/// Descriptors not listed by hostname are classified by this marker in their name.
const MASTER_NAME_MARKER: &str = "-master-";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse bootstrap document"))]
    ParseBootstrap { source: normalize::Error },

    #[snafu(display("failed to serialize bootstrap document"))]
    SerializeBootstrap { source: normalize::Error },

    #[snafu(display("failed to decode BareMetalHost in {path:?}"))]
    DecodeBareMetalHost {
        source: bare_metal_host::Error,
        path: String,
    },

    #[snafu(display("failed to update BareMetalHost {descriptor:?} for host {host_id}"))]
    UpdateBareMetalHost {
        source: bare_metal_host::Error,
        descriptor: String,
        host_id: String,
    },

    #[snafu(display(
        "not enough registered {role}s to match with BareMetalHost {descriptor:?}"
    ))]
    HostRecordExhausted { role: HostRole, descriptor: String },

    #[snafu(display("failed to access bootstrap document in the working directory"))]
    WorkDir { source: workdir::Error },

    #[snafu(display("could not find cvo-overrides file"))]
    MissingCvoOverrides,

    #[snafu(display("cvo-overrides file has no inline contents"))]
    RemoteCvoOverrides,

    #[snafu(display("failed to parse cvo-overrides file"))]
    ParseCvoOverrides { source: serde_yaml::Error },

    #[snafu(display("no ClusterID field in cvo-overrides file"))]
    MissingClusterId,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Whether the cluster runs the bare metal operator. When it does not, its
    /// provisioning config is dropped.
    pub baremetal_provisioning: bool,

    /// Single node clusters bootstrap in place and need neither the bootstrap marker nor
    /// the NetworkManager override.
    pub single_node: bool,
}

/// Rewrites the parsed bootstrap document for `hosts`.
///
/// Every embedded `BareMetalHost` is matched with the next host of the same role, in
/// hostname order. The role of a descriptor is looked up by its name in the hostnames of
/// the hosts not matched yet, falling back to whether the name contains `-master-`.
pub fn post_process(
    mut config: Config,
    hosts: &[HostRecord],
    options: BootstrapOptions,
) -> Result<Config> {
    let (masters, workers) = sort_hosts(hosts);
    let mut masters = VecDeque::from(masters);
    let mut workers = VecDeque::from(workers);

    let mut files = Vec::with_capacity(config.storage.files.len());
    for mut file in std::mem::take(&mut config.storage.files) {
        if file.path.contains(BAREMETAL_PROVISIONING_CONFIG_MARKER) {
            if !options.baremetal_provisioning {
                tracing::debug!(path = %file.path, "dropping bare metal provisioning config");
                continue;
            }
        } else if file.path == MOTD_PATH {
            fix_motd(&mut file);
        } else if bare_metal_host::is_bare_metal_host_file(&file) {
            adopt_bare_metal_host(&mut file, &mut masters, &mut workers, options)?;
        }
        files.push(file);
    }
    config.storage.files = files;

    if !options.single_node {
        mutate::set_file(
            &mut config,
            FileBuilder::new(BOOTSTRAP_MARKER_PATH, ContentSource::empty()),
        );
        mutate::set_file(
            &mut config,
            FileBuilder::new(
                KNI_NETWORK_MANAGER_CONFIG_PATH,
                ContentSource::inline(UNMANAGED_RESOLV_CONF),
            ),
        );
    }

    Ok(config)
}

/// Turns the append-only `/etc/motd` entry into one replacing the file.
///
/// The machine config operator mishandles files that are only appended to.
fn fix_motd(file: &mut File) {
    if file.contents.source.is_some() {
        return;
    }

    if file.append.len() == 1 {
        file.contents = file.append.remove(0);
    } else {
        tracing::info!(
            fragments = file.append.len(),
            "could not apply workaround to file /etc/motd, it may no longer be necessary"
        );
    }
}

fn adopt_bare_metal_host<'h>(
    file: &mut File,
    masters: &mut VecDeque<&'h HostRecord>,
    workers: &mut VecDeque<&'h HostRecord>,
    options: BootstrapOptions,
) -> Result<()> {
    let mut bmh = BareMetalHost::from_file(file).context(DecodeBareMetalHostSnafu {
        path: &file.path,
    })?;
    let descriptor = bmh.name().to_owned();

    let role = classify(&descriptor, masters, workers);
    let queue = match role {
        HostRole::Master => masters,
        _ => workers,
    };
    let host = queue.pop_front().context(HostRecordExhaustedSnafu {
        role,
        descriptor: &descriptor,
    })?;

    tracing::info!(
        path = %file.path,
        %descriptor,
        host.id = %host.id,
        "modifying BareMetalHost"
    );
    bmh.adopt(host, options.baremetal_provisioning)
        .context(UpdateBareMetalHostSnafu {
            descriptor: &descriptor,
            host_id: &host.id,
        })?;
    let yaml = bmh.to_yaml().context(UpdateBareMetalHostSnafu {
        descriptor: &descriptor,
        host_id: &host.id,
    })?;

    file.contents.source = Some(ContentSource::inline(yaml));
    Ok(())
}

fn classify(
    descriptor: &str,
    masters: &VecDeque<&HostRecord>,
    workers: &VecDeque<&HostRecord>,
) -> HostRole {
    let listed = |hosts: &VecDeque<&HostRecord>| {
        hosts
            .iter()
            .any(|host| host.display_hostname() == descriptor)
    };

    if listed(masters) {
        HostRole::Master
    } else if listed(workers) {
        HostRole::Worker
    } else if descriptor.contains(MASTER_NAME_MARKER) {
        HostRole::Master
    } else {
        HostRole::Worker
    }
}

/// Post-processes `bootstrap.ign` in the working directory in place.
///
/// The document is only written back when every step succeeded.
#[instrument(skip(work_dir, hosts), fields(work_dir = %work_dir.root().display(), hosts = hosts.len()))]
pub async fn update_bootstrap(
    work_dir: &WorkDir,
    hosts: &[HostRecord],
    options: BootstrapOptions,
) -> Result<()> {
    let bytes = work_dir.read(BOOTSTRAP_DOCUMENT).await.context(WorkDirSnafu)?;
    let config = normalize::parse(&bytes).context(ParseBootstrapSnafu)?;

    let config = post_process(config, hosts, options)?;
    let bytes = normalize::to_vec(&config).context(SerializeBootstrapSnafu)?;

    work_dir
        .write(BOOTSTRAP_DOCUMENT, &bytes)
        .await
        .context(WorkDirSnafu)?;
    tracing::info!("updated bootstrap document");
    Ok(())
}

#[derive(Deserialize)]
struct ClusterVersionManifest {
    #[serde(default)]
    spec: ClusterVersionSpec,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClusterVersionSpec {
    #[serde(rename = "clusterID", default)]
    cluster_id: String,
}

/// Reads the cluster ID the installer generated out of a bootstrap document.
pub fn extract_cluster_id(bootstrap: &[u8]) -> Result<String> {
    let config = normalize::parse(bootstrap).context(ParseBootstrapSnafu)?;

    let file = config
        .files_at(CVO_OVERRIDES_PATH)
        .next()
        .context(MissingCvoOverridesSnafu)?;
    let contents = file
        .contents
        .source
        .as_ref()
        .and_then(ContentSource::as_inline)
        .context(RemoteCvoOverridesSnafu)?;

    let manifest: ClusterVersionManifest =
        serde_yaml::from_slice(contents).context(ParseCvoOverridesSnafu)?;
    snafu::ensure!(!manifest.spec.cluster_id.is_empty(), MissingClusterIdSnafu);

    Ok(manifest.spec.cluster_id)
}
