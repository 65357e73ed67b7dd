//! Structural validation of a [`Config`] against the rules of its declared spec version.
//!
//! Validation never fails fast: every problem is collected into a [`Report`] so the caller
//! can surface all of them at once. Only [`Severity::Error`] entries make a report fatal.
use std::fmt::Display;

use crate::{
    document::{Config, File, HttpHeader, Resource},
    source::ContentSource,
    version::SpecVersion,
};

const UNIT_SUFFIXES: &[&str] = &[
    ".automount",
    ".device",
    ".mount",
    ".path",
    ".scope",
    ".service",
    ".slice",
    ".socket",
    ".swap",
    ".target",
    ".timer",
];

const REMOTE_SCHEMES: &[&str] = &["http", "https", "tftp", "s3", "gs", "arn"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub severity: Severity,
    /// JSON-path-like location of the offending value, e.g. `$.storage.files.2.path`.
    pub path: String,
    pub message: String,
}

impl Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{severity} at {}: {}", self.path, self.message)
    }
}

/// The outcome of validating one document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub entries: Vec<Entry>,
}

impl Report {
    pub fn is_fatal(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.entries.push(Entry {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        });
    }

    fn warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.entries.push(Entry {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        });
    }
}

impl Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            entry.fmt(f)?;
        }
        Ok(())
    }
}

/// Validates `config` against the rules of the version it declares.
pub fn validate(config: &Config) -> Report {
    let version = config.version();
    let mut report = Report::default();

    for (index, reference) in config.ignition.config.merge.iter().enumerate() {
        validate_reference(&mut report, &format!("$.ignition.config.merge.{index}"), reference);
    }
    if let Some(replace) = &config.ignition.config.replace {
        validate_reference(&mut report, "$.ignition.config.replace", replace);
    }
    for (index, ca) in config
        .ignition
        .security
        .tls
        .certificate_authorities
        .iter()
        .enumerate()
    {
        validate_reference(
            &mut report,
            &format!("$.ignition.security.tls.certificateAuthorities.{index}"),
            ca,
        );
    }

    for (index, user) in config.passwd.users.iter().enumerate() {
        let path = format!("$.passwd.users.{index}");
        if user.name.is_empty() {
            report.error(format!("{path}.name"), "user name must not be empty");
        }
        if user.should_exist.is_some() {
            require_version(&mut report, version, SpecVersion::V3_2, &format!("{path}.shouldExist"));
        }
    }
    for (index, group) in config.passwd.groups.iter().enumerate() {
        let path = format!("$.passwd.groups.{index}");
        if group.name.is_empty() {
            report.error(format!("{path}.name"), "group name must not be empty");
        }
        if group.should_exist.is_some() {
            require_version(&mut report, version, SpecVersion::V3_2, &format!("{path}.shouldExist"));
        }
    }

    for (index, file) in config.storage.files.iter().enumerate() {
        validate_file(&mut report, &format!("$.storage.files.{index}"), file);
    }
    for (index, directory) in config.storage.directories.iter().enumerate() {
        let path = format!("$.storage.directories.{index}");
        validate_node_path(&mut report, &path, &directory.path);
        validate_mode(&mut report, &path, directory.mode);
    }
    for (index, link) in config.storage.links.iter().enumerate() {
        let path = format!("$.storage.links.{index}");
        validate_node_path(&mut report, &path, &link.path);
        if link.target.as_deref().is_none_or(str::is_empty) {
            report.error(format!("{path}.target"), "link target is required");
        }
    }
    for (index, luks) in config.storage.luks.iter().enumerate() {
        let path = format!("$.storage.luks.{index}");
        require_version(&mut report, version, SpecVersion::V3_2, &path);
        if luks.name.is_empty() {
            report.error(format!("{path}.name"), "luks volume name must not be empty");
        }
    }

    for (index, unit) in config.systemd.units.iter().enumerate() {
        let path = format!("$.systemd.units.{index}");
        if !UNIT_SUFFIXES.iter().any(|suffix| unit.name.ends_with(suffix)) {
            report.error(
                format!("{path}.name"),
                format!("invalid systemd unit extension in {:?}", unit.name),
            );
        }
        if unit.contents.as_deref() == Some("") {
            report.warning(format!("{path}.contents"), "unit contents are empty");
        }
        for (dropin_index, dropin) in unit.dropins.iter().enumerate() {
            if !dropin.name.ends_with(".conf") {
                report.error(
                    format!("{path}.dropins.{dropin_index}.name"),
                    format!("invalid drop-in extension in {:?}", dropin.name),
                );
            }
        }
    }

    report
}

fn require_version(report: &mut Report, declared: SpecVersion, required: SpecVersion, path: &str) {
    if declared < required {
        report.error(
            path,
            format!("field requires spec version {required} but the document declares {declared}"),
        );
    }
}

fn validate_file(report: &mut Report, path: &str, file: &File) {
    validate_node_path(report, path, &file.path);
    validate_mode(report, path, file.mode);

    if file.overwrite == Some(true) && file.contents.source.is_none() {
        report.error(
            format!("{path}.overwrite"),
            "overwrite requires contents.source to be set",
        );
    }

    validate_resource(report, &format!("{path}.contents"), &file.contents);
    for (index, fragment) in file.append.iter().enumerate() {
        let fragment_path = format!("{path}.append.{index}");
        if fragment.source.is_none() {
            report.error(format!("{fragment_path}.source"), "append entries need a source");
        } else if file.append[..index]
            .iter()
            .any(|earlier| earlier.source == fragment.source)
        {
            report.error(format!("{fragment_path}.source"), "duplicate append source");
        }
        validate_resource(report, &fragment_path, fragment);
    }
}

fn validate_node_path(report: &mut Report, path: &str, node_path: &str) {
    if !node_path.starts_with('/') {
        report.error(
            format!("{path}.path"),
            format!("path {node_path:?} must be absolute"),
        );
    }
}

fn validate_mode(report: &mut Report, path: &str, mode: Option<u32>) {
    if let Some(mode) = mode {
        if mode > 0o7777 {
            report.error(format!("{path}.mode"), format!("illegal file mode {mode:#o}"));
        }
    }
}

/// A referenced document or CA must name where it comes from.
fn validate_reference(report: &mut Report, path: &str, resource: &Resource) {
    if resource.source.is_none() {
        report.error(format!("{path}.source"), "source is required");
    }
    validate_resource(report, path, resource);
}

fn validate_resource(report: &mut Report, path: &str, resource: &Resource) {
    match &resource.source {
        Some(ContentSource::Remote(remote))
            if !REMOTE_SCHEMES.contains(&remote.url().scheme()) =>
        {
            report.error(
                format!("{path}.source"),
                format!("unsupported URL scheme {:?}", remote.url().scheme()),
            );
        }
        _ => {}
    }

    if let Some(compression) = resource.compression.as_deref() {
        if !compression.is_empty() && compression != "gzip" {
            report.error(
                format!("{path}.compression"),
                format!("unsupported compression {compression:?}"),
            );
        }
    }

    if let Some(hash) = resource.verification.hash.as_deref() {
        let valid = hash
            .split_once('-')
            .is_some_and(|(function, digest)| {
                matches!(function, "sha512" | "sha256")
                    && !digest.is_empty()
                    && digest.chars().all(|c| c.is_ascii_hexdigit())
            });
        if !valid {
            report.error(
                format!("{path}.verification.hash"),
                format!("malformed hash {hash:?}"),
            );
        }
    }

    validate_headers(report, path, resource);
}

fn validate_headers(report: &mut Report, path: &str, resource: &Resource) {
    if resource.http_headers.is_empty() {
        return;
    }

    let is_http = resource
        .source
        .as_ref()
        .and_then(ContentSource::as_remote)
        .is_some_and(|url| matches!(url.scheme(), "http" | "https"));
    if !is_http {
        report.error(
            format!("{path}.httpHeaders"),
            "HTTP headers are only supported for http and https sources",
        );
    }

    for (index, HttpHeader { name, .. }) in resource.http_headers.iter().enumerate() {
        if name.is_empty() {
            report.error(format!("{path}.httpHeaders.{index}.name"), "header name must not be empty");
        }
        if resource.http_headers[..index]
            .iter()
            .any(|earlier| &earlier.name == name)
        {
            report.error(
                format!("{path}.httpHeaders.{index}.name"),
                format!("duplicate header {name:?}"),
            );
        }
    }
}
