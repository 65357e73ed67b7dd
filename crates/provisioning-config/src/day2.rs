//! The pointer document of hosts joining a cluster that is already installed.
//!
//! The document does not carry any configuration itself; it tells the host to fetch its
//! real config from the machine config server of the cluster.
use snafu::{ResultExt, Snafu};
use url::Url;

use crate::{
    document::{Config, HttpHeader, Resource},
    host::HostRecord,
    inventory::InventoryParseError,
    merge, mutate, normalize,
    source::ContentSource,
    version::SpecVersion,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("CA certificate data URL is invalid"))]
    CaCertificate {
        source: crate::source::ParseSourceError,
    },

    #[snafu(display("failed to serialize pointer document"))]
    SerializePointer { source: normalize::Error },

    #[snafu(display("failed to apply ignition override for host {host_id}"))]
    ApplyOverrides {
        source: merge::Error,
        host_id: String,
    },

    #[snafu(display("failed to set hostname in ignition for host {host_id}"))]
    SetHostname {
        source: normalize::Error,
        host_id: String,
    },

    #[snafu(display("failed to get hostname for host {host_id}"))]
    Hostname {
        source: InventoryParseError,
        host_id: String,
    },
}

/// The version pointer documents are written in, understood by every supported cluster.
pub const POINTER_VERSION: SpecVersion = SpecVersion::V3_1;

/// Builds the pointer document for `host`.
///
/// `ca_cert` is the base64 encoded CA bundle of the machine config server. When a
/// `bearer_token` is given, the config is fetched with an `Authorization` header.
pub fn build_day2_document(
    url: &Url,
    ca_cert: Option<&str>,
    bearer_token: Option<&str>,
    host: &HostRecord,
) -> Result<Vec<u8>> {
    let mut pointer = Config::new(POINTER_VERSION);

    let mut reference = Resource::from_source(ContentSource::from(url.clone()));
    if let Some(token) = bearer_token.filter(|token| !token.is_empty()) {
        reference
            .http_headers
            .push(HttpHeader::new("Authorization", format!("Bearer {token}")));
    }
    pointer.ignition.config.merge.push(reference);

    if let Some(ca_cert) = ca_cert {
        let source = format!("data:text/plain;base64,{ca_cert}")
            .parse()
            .context(CaCertificateSnafu)?;
        pointer
            .ignition
            .security
            .tls
            .certificate_authorities
            .push(Resource::from_source(source));
    }

    let document = normalize::to_string(&pointer).context(SerializePointerSnafu)?;
    let document = merge::merge_optional(document, host.overrides())
        .context(ApplyOverridesSnafu { host_id: &host.id })?;
    if host.overrides().is_some() {
        tracing::info!(host.id = %host.id, "applied ignition override");
    }

    let mut config = normalize::parse(document.as_bytes())
        .context(SetHostnameSnafu { host_id: &host.id })?;
    let hostname = host
        .current_hostname()
        .context(HostnameSnafu { host_id: &host.id })?;
    mutate::set_hostname(&mut config, &hostname);

    normalize::to_vec(&config).context(SetHostnameSnafu { host_id: &host.id })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::mutate::HOSTNAME_PATH;

    fn url() -> Url {
        "http://192.168.126.100:22624/config/worker"
            .parse()
            .expect("valid URL")
    }

    fn host(overrides: Option<&str>) -> HostRecord {
        HostRecord {
            id: "3f1a".to_owned(),
            requested_hostname: Some("worker-7".to_owned()),
            ignition_config_overrides: overrides.map(ToOwned::to_owned),
            ..HostRecord::default()
        }
    }

    fn build(ca_cert: Option<&str>, token: Option<&str>, overrides: Option<&str>) -> Config {
        let bytes = build_day2_document(&url(), ca_cert, token, &host(overrides))
            .expect("build succeeds");
        normalize::parse(&bytes).expect("valid document")
    }

    #[rstest]
    #[case::token(Some("secret"), 1)]
    #[case::no_token(None, 0)]
    #[case::empty_token(Some(""), 0)]
    fn authorization_header(#[case] token: Option<&str>, #[case] headers: usize) {
        let config = build(None, token, None);

        assert_eq!(config.version(), SpecVersion::V3_1);
        let merge = &config.ignition.config.merge;
        assert_eq!(merge.len(), 1);
        assert_eq!(merge[0].source, Some(ContentSource::from(url())));
        assert_eq!(merge[0].http_headers.len(), headers);
        if headers == 1 {
            assert_eq!(
                merge[0].http_headers[0],
                HttpHeader::new("Authorization", "Bearer secret")
            );
        }
    }

    #[test]
    fn ca_certificate_is_pinned() {
        // "-----BEGIN CERTIFICATE-----\n"
        let ca = "LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0tCg==";
        let config = build(Some(ca), None, None);

        let cas = &config.ignition.security.tls.certificate_authorities;
        assert_eq!(cas.len(), 1);
        assert_eq!(
            cas[0].source,
            Some(ContentSource::inline("-----BEGIN CERTIFICATE-----\n"))
        );
    }

    #[test]
    fn invalid_ca_certificate_is_rejected() {
        let err = build_day2_document(&url(), Some("%%%"), None, &host(None))
            .expect_err("CA is not base64");
        assert!(matches!(err, Error::CaCertificate { .. }));
    }

    #[test]
    fn hostname_is_injected_after_overrides() {
        let overrides = r#"{"ignition":{"version":"3.1.0"},"storage":{"files":[{"path":"/etc/hostname","contents":{"source":"data:,from-override"}}]}}"#;
        let config = build(None, None, Some(overrides));

        let hostnames: Vec<_> = config
            .files_at(HOSTNAME_PATH)
            .map(|f| f.contents.source.clone())
            .collect();
        assert_eq!(
            hostnames,
            [
                Some(ContentSource::inline("from-override")),
                Some(ContentSource::inline("worker-7"))
            ]
        );
    }

    #[test]
    fn broken_override_is_attributed_to_host() {
        let err = build_day2_document(&url(), None, None, &host(Some("{")))
            .expect_err("override is not a document");
        assert_eq!(err.to_string(), "failed to apply ignition override for host 3f1a");
    }
}
