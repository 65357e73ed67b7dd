//! The canonical in-memory shape of a provisioning config.
//!
//! The tree follows the newest supported spec version. Documents declaring an older
//! version deserialize into the same types; fields the older version does not know about
//! simply stay empty, and [`crate::validation`] rejects them if they are set anyway.
//!
//! Only the subset of the config format exercised by this crate is modelled. Unknown keys are
//! rejected rather than silently dropped, so a document never loses content on a
//! parse/serialize round trip.
use serde::{Deserialize, Serialize};

use crate::{source::ContentSource, version::SpecVersion};

mod passwd;
mod storage;
mod systemd;

pub use passwd::*;
pub use storage::*;
pub use systemd::*;

/// A complete provisioning config document.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub ignition: Ignition,

    #[serde(default, skip_serializing_if = "Passwd::is_empty")]
    pub passwd: Passwd,

    #[serde(default, skip_serializing_if = "Storage::is_empty")]
    pub storage: Storage,

    #[serde(default, skip_serializing_if = "Systemd::is_empty")]
    pub systemd: Systemd,
}

impl Config {
    /// An otherwise empty document declaring `version`.
    pub fn new(version: SpecVersion) -> Self {
        Self {
            ignition: Ignition::new(version),
            passwd: Passwd::default(),
            storage: Storage::default(),
            systemd: Systemd::default(),
        }
    }

    pub fn version(&self) -> SpecVersion {
        self.ignition.version
    }

    /// Iterates over all file entries at `path`, in document order.
    pub fn files_at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a File> + 'a {
        self.storage.files.iter().filter(move |file| file.path == path)
    }

    pub fn unit(&self, name: &str) -> Option<&Unit> {
        self.systemd.units.iter().find(|unit| unit.name == name)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Ignition {
    pub version: SpecVersion,

    #[serde(default, skip_serializing_if = "IgnitionConfig::is_empty")]
    pub config: IgnitionConfig,

    #[serde(default, skip_serializing_if = "Proxy::is_empty")]
    pub proxy: Proxy,

    #[serde(default, skip_serializing_if = "Security::is_empty")]
    pub security: Security,

    #[serde(default, skip_serializing_if = "Timeouts::is_empty")]
    pub timeouts: Timeouts,
}

impl Ignition {
    pub fn new(version: SpecVersion) -> Self {
        Self {
            version,
            config: IgnitionConfig::default(),
            proxy: Proxy::default(),
            security: Security::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// References to other documents that are merged into, or replace, this one at boot.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IgnitionConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merge: Vec<Resource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<Resource>,
}

impl IgnitionConfig {
    pub fn is_empty(&self) -> bool {
        self.merge.is_empty() && self.replace.is_none()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Proxy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub no_proxy: Vec<String>,
}

impl Proxy {
    pub fn is_empty(&self) -> bool {
        self.http_proxy.is_none() && self.https_proxy.is_none() && self.no_proxy.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Security {
    #[serde(default, skip_serializing_if = "Tls::is_empty")]
    pub tls: Tls,
}

impl Security {
    pub fn is_empty(&self) -> bool {
        self.tls.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Tls {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_authorities: Vec<Resource>,
}

impl Tls {
    pub fn is_empty(&self) -> bool {
        self.certificate_authorities.is_empty()
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Timeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response_headers: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_total: Option<i64>,
}

impl Timeouts {
    pub fn is_empty(&self) -> bool {
        self.http_response_headers.is_none() && self.http_total.is_none()
    }
}

/// A piece of content: a file body, an appended fragment, a CA bundle or a referenced config.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ContentSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_headers: Vec<HttpHeader>,

    #[serde(default, skip_serializing_if = "Verification::is_empty")]
    pub verification: Verification,
}

impl Resource {
    pub fn from_source(source: ContentSource) -> Self {
        Self {
            source: Some(source),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HttpHeader {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl HttpHeader {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Verification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Verification {
    pub fn is_empty(&self) -> bool {
        self.hash.is_none()
    }
}
