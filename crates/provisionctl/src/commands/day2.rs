use std::path::PathBuf;

use clap::Args;
use provisioning_config::{day2, host::HostRecord};
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::files;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load host record"))]
    LoadHost { source: files::Error },

    #[snafu(display("failed to build pointer document"))]
    Build { source: day2::Error },

    #[snafu(display("failed to write pointer document"))]
    WriteOutput { source: files::Error },
}

#[derive(Debug, Args)]
pub struct Day2Arguments {
    /// Machine config server endpoint serving the config of the host's role.
    #[arg(long)]
    pub url: Url,

    /// Base64 encoded CA bundle of the machine config server.
    #[arg(long)]
    pub ca_cert: Option<String>,

    /// Token the machine config server expects in an `Authorization` header.
    #[arg(long, env = "MCS_BEARER_TOKEN", hide_env_values = true)]
    pub bearer_token: Option<String>,

    /// YAML or JSON file with the record of the joining host.
    #[arg(long, value_name = "FILE")]
    pub host: PathBuf,

    /// Write the document here instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub async fn run(arguments: Day2Arguments) -> Result<(), Error> {
    let host: HostRecord = files::load(Some(arguments.host.as_path()), &[] as &[PathBuf])
        .await
        .context(LoadHostSnafu)?;

    let document = day2::build_day2_document(
        &arguments.url,
        arguments.ca_cert.as_deref(),
        arguments.bearer_token.as_deref(),
        &host,
    )
    .context(BuildSnafu)?;

    files::write_output(arguments.output.as_deref(), &document)
        .await
        .context(WriteOutputSnafu)
}
