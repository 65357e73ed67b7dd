//! The working directory shared by the bootstrap, role and per-host phases.
use std::{
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use snafu::{ResultExt, Snafu};
use tokio::{fs, io::AsyncWriteExt};

pub const BOOTSTRAP_DOCUMENT: &str = "bootstrap.ign";
pub const MASTER_DOCUMENT: &str = "master.ign";
pub const WORKER_DOCUMENT: &str = "worker.ign";

/// Every document written by this crate may contain secrets.
pub const DOCUMENT_MODE: u32 = 0o600;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read {path:?}"))]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write {path:?}"))]
    Write {
        source: std::io::Error,
        path: PathBuf,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub async fn exists(&self, name: &str) -> bool {
        fs::try_exists(self.path(name)).await.unwrap_or(false)
    }

    pub async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path(name);
        fs::read(&path).await.context(ReadSnafu { path })
    }

    /// Writes `contents` to `name`, readable by the owner only.
    ///
    /// Existing files are truncated and their permissions tightened.
    pub async fn write(&self, name: &str, contents: &[u8]) -> Result<()> {
        let path = self.path(name);

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(DOCUMENT_MODE)
            .open(&path)
            .await
            .context(WriteSnafu { path: &path })?;
        file.write_all(contents)
            .await
            .context(WriteSnafu { path: &path })?;
        file.flush().await.context(WriteSnafu { path: &path })?;

        fs::set_permissions(&path, std::fs::Permissions::from_mode(DOCUMENT_MODE))
            .await
            .context(WriteSnafu { path: &path })?;

        tracing::debug!(path = %path.display(), "wrote document");
        Ok(())
    }
}
