use std::path::PathBuf;

use clap::Args;
use provisioning_config::discovery::{
    self, DiscoveryParams, FileMirrorRegistries, InfraEnv, PrerenderedStaticNetwork,
};
use snafu::{ResultExt, Snafu};

use crate::files;

const DEFAULT_INFRA_ENV_PATHS: [&str; 2] = ["infra-env.yaml", "/etc/provisionctl/infra-env.yaml"];

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load infra env"))]
    LoadInfraEnv { source: files::Error },

    #[snafu(display("failed to build discovery document"))]
    Build { source: discovery::Error },

    #[snafu(display("failed to write discovery document"))]
    WriteOutput { source: files::Error },
}

#[derive(Debug, Args)]
pub struct DiscoveryArguments {
    /// YAML or JSON file describing the infra env. Defaults to the first of
    /// `infra-env.yaml` and `/etc/provisionctl/infra-env.yaml` that exists.
    #[arg(long, value_name = "FILE")]
    pub infra_env: Option<PathBuf>,

    /// Token the agent authenticates to the service with.
    #[arg(long, env = "PULL_SECRET_TOKEN", hide_env_values = true)]
    pub pull_secret_token: Option<String>,

    /// Replace all secrets with `*****`.
    #[arg(long)]
    pub safe_for_logs: bool,

    /// `registries.conf` listing the registry mirrors.
    #[arg(long, env = "MIRROR_REGISTRIES_CONF", value_name = "FILE")]
    pub mirror_registries_conf: Option<PathBuf>,

    /// CA bundle trusted for the registry mirrors.
    #[arg(long, env = "MIRROR_REGISTRIES_CA_BUNDLE", value_name = "FILE")]
    pub mirror_registries_ca_bundle: Option<PathBuf>,

    /// Write the document here instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub params: DiscoveryParams,
}

pub async fn run(arguments: DiscoveryArguments) -> Result<(), Error> {
    let infra_env: InfraEnv = files::load(arguments.infra_env.as_deref(), &DEFAULT_INFRA_ENV_PATHS)
        .await
        .context(LoadInfraEnvSnafu)?;

    let mirrors = FileMirrorRegistries {
        registries_conf: arguments.mirror_registries_conf,
        ca_bundle: arguments.mirror_registries_ca_bundle,
    };
    let document = discovery::build_discovery_document(
        &infra_env,
        &arguments.params,
        arguments.pull_secret_token.as_deref(),
        arguments.safe_for_logs,
        &PrerenderedStaticNetwork,
        &mirrors,
    )
    .context(BuildSnafu)?;

    files::write_output(arguments.output.as_deref(), document.as_bytes())
        .await
        .context(WriteOutputSnafu)
}
