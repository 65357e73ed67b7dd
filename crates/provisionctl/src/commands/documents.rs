//! Commands working on single documents.
use std::path::PathBuf;

use clap::Args;
use provisioning_config::{bootstrap, merge};
use snafu::{ResultExt, Snafu};

use crate::files;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read document"))]
    ReadDocument { source: files::Error },

    #[snafu(display("failed to merge documents"))]
    MergeDocuments { source: merge::Error },

    #[snafu(display("failed to read cluster ID"))]
    ExtractClusterId { source: bootstrap::Error },

    #[snafu(display("failed to write output"))]
    WriteOutput { source: files::Error },
}

#[derive(Debug, Args)]
pub struct MergeArguments {
    #[arg(long, value_name = "FILE")]
    pub base: PathBuf,

    /// Document whose values take precedence over the ones in the base document.
    #[arg(long = "override", value_name = "FILE")]
    pub overrides: PathBuf,

    /// Write the merged document here instead of stdout.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ClusterIdArguments {
    /// Bootstrap document generated by the installer.
    #[arg(long, value_name = "FILE", default_value = "bootstrap.ign")]
    pub bootstrap: PathBuf,
}

pub async fn merge(arguments: MergeArguments) -> Result<(), Error> {
    let base = files::read(&arguments.base)
        .await
        .context(ReadDocumentSnafu)?;
    let overrides = files::read(&arguments.overrides)
        .await
        .context(ReadDocumentSnafu)?;

    let merged = merge::merge_documents(&base, &overrides).context(MergeDocumentsSnafu)?;

    files::write_output(arguments.output.as_deref(), merged.as_bytes())
        .await
        .context(WriteOutputSnafu)
}

pub async fn cluster_id(arguments: ClusterIdArguments) -> Result<(), Error> {
    let bootstrap = files::read(&arguments.bootstrap)
        .await
        .context(ReadDocumentSnafu)?;
    let cluster_id = bootstrap::extract_cluster_id(&bootstrap).context(ExtractClusterIdSnafu)?;

    files::write_output(None, format!("{cluster_id}\n").as_bytes())
        .await
        .context(WriteOutputSnafu)
}
