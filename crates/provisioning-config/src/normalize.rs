//! Parsing and serialization of provisioning config documents.
//!
//! Parsing tries every supported spec version, newest first. A document is accepted by the
//! first version whose rules it satisfies and keeps the version it declared, so serializing
//! it again never changes its version.
use snafu::{ResultExt, Snafu, ensure};

use crate::{
    document::Config,
    validation::{self, Report},
    version::SpecVersion,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "document is not a supported provisioning config (3.2.0: {newest}; 3.1.0: {oldest})"
    ))]
    UnsupportedFormat { newest: String, oldest: String },

    #[snafu(display("document declaring version {version} is invalid: {report}"))]
    InvalidDocument { version: SpecVersion, report: Report },

    #[snafu(display("failed to serialize document"))]
    Serialize { source: serde_json::Error },
}

/// Parses raw bytes into the canonical tree.
///
/// Fails with [`Error::UnsupportedFormat`] carrying the diagnostic of every attempted
/// version when no parser accepts the document.
pub fn parse(bytes: &[u8]) -> Result<Config> {
    let mut diagnostics = Vec::with_capacity(SpecVersion::NEWEST_FIRST.len());

    for version in SpecVersion::NEWEST_FIRST {
        match parse_as(bytes, version) {
            Ok(config) => return Ok(config),
            Err(diagnostic) => {
                tracing::trace!(%version, %diagnostic, "document rejected by parser");
                diagnostics.push(diagnostic);
            }
        }
    }

    let mut diagnostics = diagnostics.into_iter();
    UnsupportedFormatSnafu {
        newest: diagnostics.next().unwrap_or_default(),
        oldest: diagnostics.next().unwrap_or_default(),
    }
    .fail()
}

/// Parses `bytes` strictly as `version`, returning a human readable diagnostic on failure.
fn parse_as(bytes: &[u8], version: SpecVersion) -> Result<Config, String> {
    let config: Config = serde_json::from_slice(bytes).map_err(|err| err.to_string())?;

    if config.version() != version {
        return Err(format!(
            "document declares version {}, expected {version}",
            config.version()
        ));
    }

    let report = validation::validate(&config);
    if report.is_fatal() {
        return Err(report.to_string());
    }

    Ok(config)
}

/// Checks that `bytes` is a valid document of exactly `version`.
pub fn validate_bytes(bytes: &[u8], version: SpecVersion) -> Result<(), String> {
    parse_as(bytes, version).map(|_| ())
}

/// Serializes `config` as compact JSON, tagged with the version recorded on it.
///
/// The tree is validated first, so a document can never be emitted with fields its
/// version does not support.
pub fn to_vec(config: &Config) -> Result<Vec<u8>> {
    ensure_valid(config)?;
    serde_json::to_vec(config).context(SerializeSnafu)
}

/// Same as [`to_vec`], but returns text.
pub fn to_string(config: &Config) -> Result<String> {
    ensure_valid(config)?;
    serde_json::to_string(config).context(SerializeSnafu)
}

fn ensure_valid(config: &Config) -> Result<()> {
    let report = validation::validate(config);
    ensure!(
        !report.is_fatal(),
        InvalidDocumentSnafu {
            version: config.version(),
            report,
        }
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;
    use crate::document::Luks;

    const BOOTSTRAP_3_1: &str = indoc! {r#"
        {
          "ignition": { "version": "3.1.0" },
          "storage": {
            "files": [
              { "path": "/etc/motd", "append": [{ "source": "data:text/plain;charset=utf-8;base64,aGVsbG8K" }] },
              { "path": "/opt/openshift/manifests/cvo-overrides.yaml", "mode": 420, "contents": { "source": "data:,spec%3A%0A" } }
            ],
            "directories": [{ "path": "/opt/openshift/openshift", "mode": 493 }],
            "links": [{ "path": "/usr/local/bin/kubectl", "target": "/usr/bin/oc" }]
          },
          "systemd": {
            "units": [
              { "name": "bootkube.service", "contents": "[Unit]\nDescription=Bootstrap\n" },
              { "name": "kubelet.service", "enabled": true, "dropins": [{ "name": "10-mco.conf", "contents": "[Service]\n" }] }
            ]
          }
        }
    "#};

    #[rstest]
    #[case::v3_1(BOOTSTRAP_3_1, SpecVersion::V3_1)]
    #[case::v3_2(&BOOTSTRAP_3_1.replace("3.1.0", "3.2.0"), SpecVersion::V3_2)]
    fn round_trip_keeps_declared_version_and_lists(#[case] input: &str, #[case] version: SpecVersion) {
        let parsed = parse(input.as_bytes()).expect("document is valid");
        assert_eq!(parsed.version(), version);

        let reparsed = parse(&to_vec(&parsed).expect("serializable")).expect("output is valid");
        assert_eq!(reparsed, parsed);
        assert_eq!(reparsed.storage.files.len(), 2);
        assert_eq!(reparsed.systemd.units.len(), 2);
        assert_eq!(reparsed.storage.links.len(), 1);
    }

    #[rstest]
    #[case::not_json("not a document")]
    #[case::unknown_version(r#"{ "ignition": { "version": "2.2.0" } }"#)]
    #[case::missing_ignition(r#"{ "storage": {} }"#)]
    #[case::newer_field_in_older_version(r#"{ "ignition": { "version": "3.1.0" }, "storage": { "luks": [{ "name": "root" }] } }"#)]
    fn unsupported_documents(#[case] input: &str) {
        let err = parse(input.as_bytes()).expect_err("document must be rejected");
        assert!(matches!(err, Error::UnsupportedFormat { .. }), "{err}");
    }

    #[test]
    fn unsupported_format_carries_both_diagnostics() {
        let err = parse(br#"{ "ignition": { "version": "3.1.0" }, "storage": { "luks": [{ "name": "root" }] } }"#)
            .expect_err("luks is not valid in 3.1.0");

        let Error::UnsupportedFormat { newest, oldest } = err else {
            panic!("unexpected error: {err}");
        };
        assert!(newest.contains("expected 3.2.0"), "{newest}");
        assert!(oldest.contains("requires spec version 3.2.0"), "{oldest}");
    }

    #[test]
    fn serializer_refuses_newer_fields_in_older_document() {
        let mut config = parse(br#"{ "ignition": { "version": "3.1.0" } }"#).expect("valid");
        config.storage.luks.push(Luks {
            name: "root".to_owned(),
            ..Luks::default()
        });

        let err = to_vec(&config).expect_err("luks is not valid in 3.1.0");
        assert!(matches!(
            err,
            Error::InvalidDocument {
                version: SpecVersion::V3_1,
                ..
            }
        ));
        let err = to_string(&config).expect_err("luks is not valid in 3.1.0");
        assert!(matches!(
            err,
            Error::InvalidDocument {
                version: SpecVersion::V3_1,
                ..
            }
        ));
    }

    #[test]
    fn validate_bytes_checks_exact_version() {
        let document = br#"{ "ignition": { "version": "3.1.0" } }"#;
        assert!(validate_bytes(document, SpecVersion::V3_1).is_ok());
        assert!(validate_bytes(document, SpecVersion::V3_2).is_err());
    }
}
