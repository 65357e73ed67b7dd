use std::path::PathBuf;

use snafu::{ResultExt, Snafu};

/// Registry mirrors the discovered hosts pull their images through.
pub trait MirrorRegistries {
    type Error: std::error::Error + Send + Sync + 'static;

    fn is_configured(&self) -> bool;

    /// CA bundle trusted for the mirrors.
    fn ca_bundle(&self) -> Result<Vec<u8>, Self::Error>;

    /// The `registries.conf` listing the mirrors.
    fn registries_conf(&self) -> Result<Vec<u8>, Self::Error>;
}

#[derive(Debug, Snafu)]
#[snafu(display("failed to read mirror registry file {path:?}"))]
pub struct ReadMirrorFileError {
    source: std::io::Error,
    path: PathBuf,
}

/// Mirror configuration mounted into the service as files.
///
/// Configured only when both files are set and present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FileMirrorRegistries {
    pub registries_conf: Option<PathBuf>,
    pub ca_bundle: Option<PathBuf>,
}

impl FileMirrorRegistries {
    fn read(path: Option<&PathBuf>) -> Result<Vec<u8>, ReadMirrorFileError> {
        let path = path.cloned().unwrap_or_default();
        std::fs::read(&path).context(ReadMirrorFileSnafu { path })
    }
}

impl MirrorRegistries for FileMirrorRegistries {
    type Error = ReadMirrorFileError;

    fn is_configured(&self) -> bool {
        [&self.registries_conf, &self.ca_bundle]
            .into_iter()
            .all(|path| path.as_ref().is_some_and(|path| path.is_file()))
    }

    fn ca_bundle(&self) -> Result<Vec<u8>, Self::Error> {
        Self::read(self.ca_bundle.as_ref())
    }

    fn registries_conf(&self) -> Result<Vec<u8>, Self::Error> {
        Self::read(self.registries_conf.as_ref())
    }
}
