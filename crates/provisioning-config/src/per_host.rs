//! Derivation of the final provisioning config of every host from its role document.
use std::fmt::Display;

use futures::future::join_all;
use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    host::{HostRecord, HostRole},
    inventory::InventoryParseError,
    merge, mutate, normalize,
    workdir::{self, MASTER_DOCUMENT, WORKER_DOCUMENT, WorkDir},
};

/// Failure to derive the document of a single host.
#[derive(Debug, Snafu)]
pub enum HostError {
    #[snafu(display("failed to read role document {document}"))]
    ReadRoleDocument {
        source: workdir::Error,
        document: String,
    },

    #[snafu(display("failed to parse role document"))]
    ParseRoleDocument { source: normalize::Error },

    #[snafu(display("failed to get hostname"))]
    Hostname { source: InventoryParseError },

    #[snafu(display("failed to serialize host document"))]
    SerializeHostDocument { source: normalize::Error },

    #[snafu(display("failed to apply ignition config overrides"))]
    ApplyOverrides { source: merge::Error },

    #[snafu(display("failed to write host document"))]
    WriteHostDocument { source: workdir::Error },

    #[snafu(display("host task did not complete"))]
    Join { source: tokio::task::JoinError },
}

#[derive(Debug)]
pub struct HostFailure {
    pub host_id: String,
    pub error: HostError,
}

impl Display for HostFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "host {}: {}", self.host_id, snafu::Report::from_error(&self.error))
    }
}

#[derive(Debug, Snafu)]
#[snafu(display(
    "failed to create provisioning configs for {} host(s): {}",
    failures.len(),
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
))]
pub struct Error {
    failures: Vec<HostFailure>,
}

impl Error {
    pub fn failures(&self) -> &[HostFailure] {
        &self.failures
    }
}

/// The role document the document of `host` is derived from.
pub fn role_document(host: &HostRecord) -> &'static str {
    match host.effective_role() {
        HostRole::Master => MASTER_DOCUMENT,
        HostRole::Worker | HostRole::AutoAssign => WORKER_DOCUMENT,
    }
}

/// Adds the hostname of `host` to the role document `base`, then merges the host's
/// overrides into it.
pub fn derive_host_document(base: &[u8], host: &HostRecord) -> Result<Vec<u8>, HostError> {
    let mut config = normalize::parse(base).context(ParseRoleDocumentSnafu)?;

    let hostname = host.current_hostname().context(HostnameSnafu)?;
    mutate::set_hostname(&mut config, &hostname);

    let document = normalize::to_string(&config).context(SerializeHostDocumentSnafu)?;
    let document = merge::merge_optional(document, host.overrides()).context(ApplyOverridesSnafu)?;
    Ok(document.into_bytes())
}

async fn create_host_document(work_dir: &WorkDir, host: &HostRecord) -> Result<(), HostError> {
    let document = role_document(host);
    let base = work_dir
        .read(document)
        .await
        .context(ReadRoleDocumentSnafu { document })?;

    let bytes = derive_host_document(&base, host)?;

    work_dir
        .write(&host.document_file_name(), &bytes)
        .await
        .context(WriteHostDocumentSnafu)
}

/// Writes `<role>-<host id>.ign` for every host, one task per host.
///
/// The role documents must be final before this is called. A failing host does not stop
/// the others; all failures are reported together, in the order of `hosts`.
#[instrument(skip_all, fields(work_dir = %work_dir.root().display(), hosts = hosts.len()))]
pub async fn create_host_documents(work_dir: &WorkDir, hosts: &[HostRecord]) -> Result<(), Error> {
    let tasks = hosts.iter().cloned().map(|host| {
        let work_dir = work_dir.clone();
        tokio::spawn(async move {
            let result = create_host_document(&work_dir, &host).await;
            match &result {
                Ok(()) => tracing::debug!(host.id = %host.id, "created host document"),
                Err(error) => tracing::warn!(
                    host.id = %host.id,
                    error = %snafu::Report::from_error(error),
                    "failed to create host document"
                ),
            }
            result
        })
    });
    let results = join_all(tasks).await;

    let failures: Vec<_> = hosts
        .iter()
        .zip(results)
        .filter_map(|(host, result)| {
            let error = match result {
                Ok(Ok(())) => return None,
                Ok(Err(error)) => error,
                Err(source) => HostError::Join { source },
            };
            Some(HostFailure {
                host_id: host.id.clone(),
                error,
            })
        })
        .collect();

    if failures.is_empty() {
        tracing::info!("created host documents");
        Ok(())
    } else {
        Err(Error { failures })
    }
}
