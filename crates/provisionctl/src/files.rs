//! Locating, loading and writing the files the commands work on.
use std::{
    fs::Permissions,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use provisioning_config::workdir::DOCUMENT_MODE;
use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu};
use tokio::io::AsyncWriteExt as _;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "failed to locate a required file in any of the following locations: {search_path:?}"
    ))]
    RequiredFileMissing { search_path: Vec<PathBuf> },

    #[snafu(display("failed to read {path:?}"))]
    Read {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse {path:?}"))]
    Parse {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write {path:?}"))]
    Write {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to write to stdout"))]
    WriteStdout { source: std::io::Error },
}

/// Returns the path given by the user, or the first of `default_paths` that exists.
///
/// A path given by the user must exist too.
pub fn resolve_path<'a>(
    user_provided_path: Option<&'a Path>,
    default_paths: &'a [impl AsRef<Path>],
) -> Result<&'a Path> {
    let candidates: Vec<&Path> = match user_provided_path {
        Some(path) => vec![path],
        None => default_paths.iter().map(|path| path.as_ref()).collect(),
    };

    match candidates.iter().find(|path| path.exists()) {
        Some(&path) => Ok(path),
        None => RequiredFileMissingSnafu {
            search_path: candidates.into_iter().map(Path::to_path_buf).collect::<Vec<_>>(),
        }
        .fail(),
    }
}

pub async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path).await.context(ReadSnafu { path })
}

/// Reads a YAML (or JSON) file found by [`resolve_path`].
pub async fn load<T: DeserializeOwned>(
    user_provided_path: Option<&Path>,
    default_paths: &[impl AsRef<Path>],
) -> Result<T> {
    let path = resolve_path(user_provided_path, default_paths)?;
    let contents = read(path).await?;
    serde_yaml::from_slice(&contents).context(ParseSnafu { path })
}

/// Writes `contents` to `output`, or to stdout when no output file is given.
///
/// Output files are readable by the owner only, as documents may carry secrets. Existing
/// files are truncated and their permissions tightened.
pub async fn write_output(output: Option<&Path>, contents: &[u8]) -> Result<()> {
    let Some(path) = output else {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(contents).await.context(WriteStdoutSnafu)?;
        return stdout.flush().await.context(WriteStdoutSnafu);
    };

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(DOCUMENT_MODE)
        .open(path)
        .await
        .context(WriteSnafu { path })?;
    file.write_all(contents).await.context(WriteSnafu { path })?;
    file.flush().await.context(WriteSnafu { path })?;

    tokio::fs::set_permissions(path, Permissions::from_mode(DOCUMENT_MODE))
        .await
        .context(WriteSnafu { path })
}
