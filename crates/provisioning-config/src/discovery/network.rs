use serde::Deserialize;

/// A NetworkManager connection file, with a path relative to the staging directory.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct StaticNetworkFile {
    pub path: String,
    pub contents: String,
}

/// Turns the static network definition of an infra env into connection files.
pub trait StaticNetworkConfig {
    type Error: std::error::Error + Send + Sync + 'static;

    fn generate(&self, definition: &str) -> Result<Vec<StaticNetworkFile>, Self::Error>;
}

/// Reads definitions that already are a JSON list of rendered connection files.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrerenderedStaticNetwork;

impl StaticNetworkConfig for PrerenderedStaticNetwork {
    type Error = serde_json::Error;

    fn generate(&self, definition: &str) -> Result<Vec<StaticNetworkFile>, Self::Error> {
        serde_json::from_str(definition)
    }
}
