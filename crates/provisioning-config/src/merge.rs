//! Structural deep merge of provisioning config documents.
//!
//! Scalars and optional values are replaced when the override sets them. Lists whose
//! entries carry an identity (file paths, unit names, appended fragments by source, ...) are
//! merged entry by entry. Plain string lists are concatenated, skipping values already
//! present. The declared version becomes the newer of the two.
use snafu::{ResultExt, Snafu};

use crate::{
    document::{
        Config, Directory, Dropin, File, HttpHeader, Ignition, IgnitionConfig, Link, Luks,
        NodeGroup, NodeUser, Passwd, PasswdGroup, PasswdUser, Proxy, Resource, Security,
        Storage, Systemd, Timeouts, Tls, Unit, Verification,
    },
    normalize,
    source::ContentSource,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse base document"))]
    ParseBase { source: normalize::Error },

    #[snafu(display("failed to parse override document"))]
    ParseOverride { source: normalize::Error },

    #[snafu(display("failed to serialize merged document"))]
    SerializeMerged { source: normalize::Error },

    #[snafu(display("merged ignition config is invalid: {diagnostic}"))]
    InvalidMergedConfig { diagnostic: String },
}

/// A type that can absorb another value of itself.
///
/// Values set in `overrides` take precedence over the ones in `self`.
pub trait Merge {
    fn merge(&mut self, overrides: &Self);
}

/// A marker trait for types that are replaced as one single value rather than merged
/// field by field.
pub trait Atomic: Clone {}
impl Atomic for bool {}
impl Atomic for u32 {}
impl Atomic for i64 {}
impl Atomic for String {}
impl Atomic for ContentSource {}

impl<T: Atomic> Merge for Option<T> {
    fn merge(&mut self, overrides: &Self) {
        if overrides.is_some() {
            self.clone_from(overrides);
        }
    }
}

/// List entries that are identified by a key rather than by their position.
pub trait Keyed {
    type Key: PartialEq + ?Sized;

    fn key(&self) -> &Self::Key;
}

/// Merges every override entry into the last base entry with the same key, or appends it.
fn merge_keyed<T: Keyed + Merge + Clone>(base: &mut Vec<T>, overrides: &[T]) {
    for entry in overrides {
        match base.iter_mut().rev().find(|existing| existing.key() == entry.key()) {
            Some(existing) => existing.merge(entry),
            None => base.push(entry.clone()),
        }
    }
}

/// Concatenates `overrides` onto `base`, skipping values that are already present.
fn merge_unique(base: &mut Vec<String>, overrides: &[String]) {
    for value in overrides {
        if !base.contains(value) {
            base.push(value.clone());
        }
    }
}

macro_rules! keyed_by {
    ($($ty:ty => $field:ident: $key:ty),* $(,)?) => {
        $(
            impl Keyed for $ty {
                type Key = $key;

                fn key(&self) -> &Self::Key {
                    &self.$field
                }
            }
        )*
    };
}

keyed_by! {
    File => path: String,
    Directory => path: String,
    Link => path: String,
    Luks => name: String,
    Unit => name: String,
    Dropin => name: String,
    PasswdUser => name: String,
    PasswdGroup => name: String,
    HttpHeader => name: String,
    Resource => source: Option<ContentSource>,
}

impl Merge for Config {
    fn merge(&mut self, overrides: &Self) {
        self.ignition.merge(&overrides.ignition);
        self.passwd.merge(&overrides.passwd);
        self.storage.merge(&overrides.storage);
        self.systemd.merge(&overrides.systemd);
    }
}

impl Merge for Ignition {
    fn merge(&mut self, overrides: &Self) {
        self.version = self.version.max(overrides.version);
        self.config.merge(&overrides.config);
        self.proxy.merge(&overrides.proxy);
        self.security.merge(&overrides.security);
        self.timeouts.merge(&overrides.timeouts);
    }
}

impl Merge for IgnitionConfig {
    fn merge(&mut self, overrides: &Self) {
        merge_keyed(&mut self.merge, &overrides.merge);
        if overrides.replace.is_some() {
            self.replace.clone_from(&overrides.replace);
        }
    }
}

impl Merge for Proxy {
    fn merge(&mut self, overrides: &Self) {
        self.http_proxy.merge(&overrides.http_proxy);
        self.https_proxy.merge(&overrides.https_proxy);
        merge_unique(&mut self.no_proxy, &overrides.no_proxy);
    }
}

impl Merge for Security {
    fn merge(&mut self, overrides: &Self) {
        self.tls.merge(&overrides.tls);
    }
}

impl Merge for Tls {
    fn merge(&mut self, overrides: &Self) {
        merge_keyed(
            &mut self.certificate_authorities,
            &overrides.certificate_authorities,
        );
    }
}

impl Merge for Timeouts {
    fn merge(&mut self, overrides: &Self) {
        self.http_response_headers
            .merge(&overrides.http_response_headers);
        self.http_total.merge(&overrides.http_total);
    }
}

impl Merge for Resource {
    fn merge(&mut self, overrides: &Self) {
        self.source.merge(&overrides.source);
        self.compression.merge(&overrides.compression);
        merge_keyed(&mut self.http_headers, &overrides.http_headers);
        self.verification.merge(&overrides.verification);
    }
}

impl Merge for HttpHeader {
    fn merge(&mut self, overrides: &Self) {
        self.value.merge(&overrides.value);
    }
}

impl Merge for Verification {
    fn merge(&mut self, overrides: &Self) {
        self.hash.merge(&overrides.hash);
    }
}

impl Merge for Passwd {
    fn merge(&mut self, overrides: &Self) {
        merge_keyed(&mut self.users, &overrides.users);
        merge_keyed(&mut self.groups, &overrides.groups);
    }
}

impl Merge for PasswdUser {
    fn merge(&mut self, overrides: &Self) {
        self.password_hash.merge(&overrides.password_hash);
        merge_unique(&mut self.ssh_authorized_keys, &overrides.ssh_authorized_keys);
        merge_unique(&mut self.groups, &overrides.groups);
        self.uid.merge(&overrides.uid);
        self.home_dir.merge(&overrides.home_dir);
        self.shell.merge(&overrides.shell);
        self.system.merge(&overrides.system);
        self.should_exist.merge(&overrides.should_exist);
    }
}

impl Merge for PasswdGroup {
    fn merge(&mut self, overrides: &Self) {
        self.gid.merge(&overrides.gid);
        self.password_hash.merge(&overrides.password_hash);
        self.system.merge(&overrides.system);
        self.should_exist.merge(&overrides.should_exist);
    }
}

impl Merge for Storage {
    fn merge(&mut self, overrides: &Self) {
        merge_keyed(&mut self.directories, &overrides.directories);
        merge_keyed(&mut self.files, &overrides.files);
        merge_keyed(&mut self.links, &overrides.links);
        merge_keyed(&mut self.luks, &overrides.luks);
    }
}

impl Merge for NodeUser {
    fn merge(&mut self, overrides: &Self) {
        self.id.merge(&overrides.id);
        self.name.merge(&overrides.name);
    }
}

impl Merge for NodeGroup {
    fn merge(&mut self, overrides: &Self) {
        self.id.merge(&overrides.id);
        self.name.merge(&overrides.name);
    }
}

impl Merge for File {
    fn merge(&mut self, overrides: &Self) {
        self.overwrite.merge(&overrides.overwrite);
        self.user.merge(&overrides.user);
        self.group.merge(&overrides.group);
        self.mode.merge(&overrides.mode);
        self.contents.merge(&overrides.contents);
        merge_keyed(&mut self.append, &overrides.append);
    }
}

impl Merge for Directory {
    fn merge(&mut self, overrides: &Self) {
        self.overwrite.merge(&overrides.overwrite);
        self.user.merge(&overrides.user);
        self.group.merge(&overrides.group);
        self.mode.merge(&overrides.mode);
    }
}

impl Merge for Link {
    fn merge(&mut self, overrides: &Self) {
        self.overwrite.merge(&overrides.overwrite);
        self.user.merge(&overrides.user);
        self.group.merge(&overrides.group);
        self.target.merge(&overrides.target);
        self.hard.merge(&overrides.hard);
    }
}

impl Merge for Luks {
    fn merge(&mut self, overrides: &Self) {
        self.device.merge(&overrides.device);
        if overrides.key_file.is_some() {
            self.key_file.clone_from(&overrides.key_file);
        }
        self.label.merge(&overrides.label);
        self.uuid.merge(&overrides.uuid);
        self.wipe_volume.merge(&overrides.wipe_volume);
    }
}

impl Merge for Systemd {
    fn merge(&mut self, overrides: &Self) {
        merge_keyed(&mut self.units, &overrides.units);
    }
}

impl Merge for Unit {
    fn merge(&mut self, overrides: &Self) {
        self.enabled.merge(&overrides.enabled);
        self.mask.merge(&overrides.mask);
        self.contents.merge(&overrides.contents);
        merge_keyed(&mut self.dropins, &overrides.dropins);
    }
}

impl Merge for Dropin {
    fn merge(&mut self, overrides: &Self) {
        self.contents.merge(&overrides.contents);
    }
}

/// Moving version of [`Merge::merge`].
pub fn merge<T: Merge>(mut base: T, overrides: &T) -> T {
    base.merge(overrides);
    base
}

/// Merges the `overrides` document into the `base` document and serializes the result.
///
/// Both inputs may declare any supported version. The result declares the newer of the two
/// and is re-parsed against exactly that version before it is returned.
#[tracing::instrument(skip_all, fields(base.len = base.len(), overrides.len = overrides.len()))]
pub fn merge_documents(base: &[u8], overrides: &[u8]) -> Result<String> {
    let base = normalize::parse(base).context(ParseBaseSnafu)?;
    let overrides = normalize::parse(overrides).context(ParseOverrideSnafu)?;

    let merged = merge(base, &overrides);
    let version = merged.version();
    let serialized = match normalize::to_string(&merged) {
        Ok(serialized) => serialized,
        Err(normalize::Error::InvalidDocument { report, .. }) => {
            return InvalidMergedConfigSnafu {
                diagnostic: report.to_string(),
            }
            .fail();
        }
        Err(source) => return Err(source).context(SerializeMergedSnafu),
    };

    if let Err(diagnostic) = normalize::validate_bytes(serialized.as_bytes(), version) {
        return InvalidMergedConfigSnafu { diagnostic }.fail();
    }

    tracing::debug!(%version, "merged provisioning config documents");
    Ok(serialized)
}

/// Merges `overrides` into `base` when an override is given, returns `base` untouched
/// otherwise.
pub fn merge_optional(base: String, overrides: Option<&str>) -> Result<String> {
    match overrides {
        Some(overrides) if !overrides.trim().is_empty() => {
            merge_documents(base.as_bytes(), overrides.as_bytes())
        }
        _ => Ok(base),
    }
}
