use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use strum::{Display, EnumString};

pub const DEFAULT_AGENT_IMAGE: &str = "quay.io/edge-infrastructure/assisted-installer-agent:latest";
pub const DEFAULT_AGENT_TIMEOUT_START: Duration = Duration::from_secs(10 * 60);

/// Service wide settings of the discovery config.
///
/// Additionally, this struct can be used as CLI arguments. This functionality is only
/// available if the feature `clap` is enabled.
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryParams {
    /// Container image of the discovery agent.
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "AGENT_DOCKER_IMAGE", default_value = DEFAULT_AGENT_IMAGE)
    )]
    pub agent_image: String,

    /// How long the agent service may take to start, for example `10m`.
    #[cfg_attr(
        feature = "clap",
        arg(
            long,
            env = "AGENT_TIMEOUT_START",
            default_value = "10m",
            value_parser = humantime::parse_duration
        )
    )]
    pub agent_timeout_start: Duration,

    /// Trust the Red Hat IT root CA on discovered hosts.
    #[cfg_attr(feature = "clap", arg(long, env = "INSTALL_RH_CA"))]
    pub install_rh_ca: bool,

    /// URL the agent reports to.
    #[cfg_attr(
        feature = "clap",
        arg(long, env = "SERVICE_BASE_URL", default_value = "")
    )]
    pub service_base_url: String,

    /// CA certificate the agent uses to verify the service, read from this path.
    #[cfg_attr(feature = "clap", arg(long, env = "SERVICE_CA_CERT_PATH"))]
    pub service_ca_cert_path: Option<PathBuf>,

    /// Comma separated IPs of the service, mapped to its hostname in `/etc/hosts`.
    #[cfg_attr(feature = "clap", arg(long, env = "SERVICE_IPS"))]
    pub service_ips: Option<String>,

    /// Let the agent skip verification of the service certificate.
    #[cfg_attr(feature = "clap", arg(long, env = "SKIP_CERT_VERIFICATION"))]
    pub skip_cert_verification: bool,

    /// Image with OKD RPMs to overlay onto discovered hosts.
    #[cfg_attr(feature = "clap", arg(long, env = "OKD_RPMS_IMAGE"))]
    pub okd_rpms_image: Option<String>,
}

impl Default for DiscoveryParams {
    fn default() -> Self {
        Self {
            agent_image: DEFAULT_AGENT_IMAGE.to_owned(),
            agent_timeout_start: DEFAULT_AGENT_TIMEOUT_START,
            install_rh_ca: false,
            service_base_url: String::new(),
            service_ca_cert_path: None,
            service_ips: None,
            skip_cert_verification: false,
            okd_rpms_image: None,
        }
    }
}

/// Flavour of the discovery image. Minimal images fetch their root filesystem at boot
/// and configure static networking from the initrd instead.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ImageType {
    #[default]
    FullIso,
    MinimalIso,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfraEnvProxy {
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub https_proxy: Option<String>,
    /// Comma separated.
    #[serde(default)]
    pub no_proxy: Option<String>,
}

/// The group of hosts a discovery image is built for.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InfraEnv {
    pub id: String,

    #[serde(default)]
    pub proxy: InfraEnvProxy,

    #[serde(default)]
    pub pull_secret: String,

    /// Newline separated public keys.
    #[serde(default)]
    pub ssh_authorized_key: Option<String>,

    /// Raw static network definition, turned into connection files by a
    /// [`super::StaticNetworkConfig`].
    #[serde(default)]
    pub static_network_config: Option<String>,

    #[serde(default, rename = "type")]
    pub image_type: ImageType,

    /// Overrides set by the service itself, merged before [`InfraEnv::ignition_config_override`].
    #[serde(default)]
    pub internal_ignition_config_override: Option<String>,

    #[serde(default)]
    pub ignition_config_override: Option<String>,
}

impl InfraEnv {
    pub fn internal_override(&self) -> Option<&str> {
        non_blank(self.internal_ignition_config_override.as_deref())
    }

    pub fn user_override(&self) -> Option<&str> {
        non_blank(self.ignition_config_override.as_deref())
    }
}

fn non_blank(document: Option<&str>) -> Option<&str> {
    document.filter(|document| !document.trim().is_empty())
}
