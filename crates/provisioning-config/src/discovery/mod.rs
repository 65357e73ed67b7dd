//! The boot config of the discovery image.
//!
//! Hosts booted from the discovery image run the agent, which reports their hardware to the
//! assisted service until they are assigned to a cluster and installed. Everything the
//! agent needs on the host is described by the document built here.
use std::path::{Path, PathBuf};

use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::{
    document::{Config, PasswdUser, Proxy, Unit},
    merge,
    mutate::{self, FileBuilder},
    normalize,
    role::{self, ETC_HOSTS_PATH, HOST_CA_CERT_PATH, IPV6_CLIENT_ID_CONF, IPV6_CONFIG_PATH},
    source::ContentSource,
    version::SpecVersion,
};

pub mod assets;
mod mirror;
mod network;
mod params;

pub use mirror::*;
pub use network::*;
pub use params::*;

/// Replaces secrets in documents that are meant to be logged.
pub const REDACTED: &str = "*****";

pub const DISCOVERY_VERSION: SpecVersion = SpecVersion::V3_1;

/// Where the generated connection files are staged before NetworkManager starts.
pub const STATIC_NETWORK_STAGING_DIR: &str = "/etc/assisted/network";

pub const AGENT_UNIT: &str = "agent.service";
pub const AGENT_FIX_BZ1964591_PATH: &str = "/usr/local/bin/agent-fix-bz1964591";
pub const MOTD_PATH: &str = "/etc/motd";
pub const MULTIPATH_CONF_PATH: &str = "/etc/multipath.conf";
pub const DOCKER_CONFIG_PATH: &str = "/root/.docker/config.json";
pub const SELINUX_POLICY_PATH: &str = "/root/assisted.te";
pub const REDHAT_ROOT_CA_PATH: &str = "/etc/pki/ca-trust/source/anchors/rh-it-root-ca.crt";
pub const MIRROR_REGISTRIES_CONF_PATH: &str = "/etc/containers/registries.conf";
pub const MIRROR_CA_PATH: &str = "/etc/pki/ca-trust/source/anchors/domain.crt";
pub const PRE_NETWORK_CONFIG_SCRIPT_PATH: &str = "/usr/local/bin/pre-network-manager-config.sh";
pub const OKD_BINARIES_PATH: &str = "/usr/local/bin/okd-binaries.sh";
pub const OKD_HOLD_PIVOT_PATH: &str =
    "/etc/systemd/system/release-image-pivot.service.d/wait-for-okd.conf";
pub const OKD_HOLD_AGENT_PATH: &str = "/etc/systemd/system/agent.service.d/wait-for-okd.conf";

const SCRIPT_MODE: u32 = 0o755;
const CONNECTION_FILE_MODE: u32 = 0o600;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read service CA certificate {path:?}"))]
    ReadServiceCaCert {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to generate static network config for infra env {infra_env_id}"))]
    StaticNetwork {
        source: Box<dyn std::error::Error + Send + Sync>,
        infra_env_id: String,
    },

    #[snafu(display("failed to get mirror registries config"))]
    MirrorRegistries {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("failed to render discovery ignition config"))]
    TemplateRender { source: normalize::Error },

    #[snafu(display("failed to apply internal ignition override for infra env {infra_env_id}"))]
    ApplyInternalOverride {
        source: merge::Error,
        infra_env_id: String,
    },

    #[snafu(display("failed to apply ignition override for infra env {infra_env_id}"))]
    ApplyOverride {
        source: merge::Error,
        infra_env_id: String,
    },
}

/// Credentials that end up in the document, unless it is built for logging.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Secrets {
    ssh_keys: Vec<String>,
    pull_secret_token: Option<String>,
    pull_secret: String,
    redhat_root_ca: Option<String>,
}

impl Secrets {
    fn new(infra_env: &InfraEnv, params: &DiscoveryParams, pull_secret_token: Option<&str>) -> Self {
        Self {
            ssh_keys: ssh_keys(infra_env.ssh_authorized_key.as_deref().unwrap_or_default()),
            pull_secret_token: pull_secret_token
                .filter(|token| !token.is_empty())
                .map(ToOwned::to_owned),
            pull_secret: infra_env.pull_secret.clone(),
            redhat_root_ca: params
                .install_rh_ca
                .then(|| assets::REDHAT_ROOT_CA.to_owned()),
        }
    }

    /// Replaces every secret that is present with [`REDACTED`].
    fn redact(self) -> Self {
        let redacted = || REDACTED.to_owned();
        Self {
            ssh_keys: if self.ssh_keys.is_empty() {
                Vec::new()
            } else {
                vec![redacted()]
            },
            pull_secret_token: self.pull_secret_token.map(|_| redacted()),
            pull_secret: redacted(),
            redhat_root_ca: self.redhat_root_ca.map(|_| redacted()),
        }
    }
}

/// Splits newline separated public keys, dropping blank lines.
pub fn ssh_keys(keys: &str) -> Vec<String> {
    keys.lines()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

/// The `ignition.proxy` section, empty unless at least one of the settings is present.
pub fn proxy_settings(proxy: &InfraEnvProxy) -> Proxy {
    let non_empty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    };

    Proxy {
        http_proxy: non_empty(&proxy.http_proxy),
        https_proxy: non_empty(&proxy.https_proxy),
        no_proxy: proxy
            .no_proxy
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(ToOwned::to_owned)
            .collect(),
    }
}

fn agent_unit(
    infra_env: &InfraEnv,
    params: &DiscoveryParams,
    proxy: &Proxy,
    pull_secret_token: Option<&str>,
) -> Unit {
    let http_proxy = proxy.http_proxy.as_deref().unwrap_or_default();
    let https_proxy = proxy.https_proxy.as_deref().unwrap_or_default();
    let no_proxy = proxy.no_proxy.join(",");
    let token = pull_secret_token
        .map(|token| format!("\nEnvironment=PULL_SECRET_TOKEN={token}"))
        .unwrap_or_default();
    let timeout = params.agent_timeout_start.as_secs();
    let image = &params.agent_image;
    let url = params.service_base_url.trim();
    let infra_env_id = &infra_env.id;
    let insecure = params.skip_cert_verification;
    let cacert = if params.service_ca_cert_path.is_some() {
        format!(" --cacert {HOST_CA_CERT_PATH}")
    } else {
        String::new()
    };

    let contents = format!(
        "[Service]\nType=simple\nRestart=always\nRestartSec=3\nStartLimitInterval=0\n\
         Environment=HTTP_PROXY={http_proxy}\nEnvironment=http_proxy={http_proxy}\n\
         Environment=HTTPS_PROXY={https_proxy}\nEnvironment=https_proxy={https_proxy}\n\
         Environment=NO_PROXY={no_proxy}\nEnvironment=no_proxy={no_proxy}{token}\n\
         TimeoutStartSec={timeout}\n\
         ExecStartPre={AGENT_FIX_BZ1964591_PATH} {image}\n\
         ExecStartPre=podman run --privileged --rm -v /usr/local/bin:/hostbin {image} cp /usr/bin/agent /hostbin\n\
         ExecStart=/usr/local/bin/agent --url {url} --infra-env-id {infra_env_id} --agent-version {image} --insecure={insecure}{cacert}\n\n\
         [Unit]\nWants=network-online.target\nAfter=network-online.target\n\n\
         [Install]\nWantedBy=multi-user.target"
    );

    Unit {
        name: AGENT_UNIT.to_owned(),
        // Infra envs with an internal override bring their own way of starting the agent.
        enabled: Some(infra_env.internal_override().is_none()),
        contents: Some(contents),
        ..Unit::default()
    }
}

fn unit(name: &str, contents: Option<&str>) -> Unit {
    Unit {
        name: name.to_owned(),
        enabled: Some(true),
        contents: contents.map(ToOwned::to_owned),
        ..Unit::default()
    }
}

fn replace_file(path: &str, contents: impl Into<Vec<u8>>) -> FileBuilder {
    FileBuilder::new(path, ContentSource::inline(contents)).overwrite(true)
}

fn read_service_ca_cert(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).context(ReadServiceCaCertSnafu { path })
}

fn add_static_network(config: &mut Config, files: Vec<StaticNetworkFile>) {
    mutate::set_unit(
        config,
        unit(
            "pre-network-manager-config.service",
            Some(assets::PRE_NETWORK_MANAGER_CONFIG_UNIT),
        ),
    );
    mutate::set_file(
        config,
        replace_file(PRE_NETWORK_CONFIG_SCRIPT_PATH, assets::PRE_NETWORK_CONFIG_SCRIPT)
            .mode(SCRIPT_MODE),
    );

    for file in files {
        let path = format!(
            "{STATIC_NETWORK_STAGING_DIR}/{}",
            file.path.trim_start_matches('/')
        );
        mutate::set_file(
            config,
            replace_file(&path, file.contents).mode(CONNECTION_FILE_MODE),
        );
    }
}

fn add_okd_overlay(config: &mut Config, rpms_image: &str) {
    mutate::set_unit(config, unit("okd-overlay.service", Some(assets::OKD_OVERLAY_UNIT)));
    mutate::set_unit(config, unit("multipathd.service", None));
    mutate::set_unit(
        config,
        unit(
            "systemd-journal-gatewayd.socket",
            Some(assets::JOURNAL_GATEWAY_SOCKET),
        ),
    );

    mutate::set_file(
        config,
        replace_file(OKD_BINARIES_PATH, assets::okd_binaries_overlay(rpms_image)).mode(SCRIPT_MODE),
    );
    mutate::set_file(config, replace_file(OKD_HOLD_PIVOT_PATH, assets::OKD_HOLD_PIVOT));
    mutate::set_file(config, replace_file(OKD_HOLD_AGENT_PATH, assets::OKD_HOLD_AGENT));
}

/// Builds the discovery document of `infra_env` and applies its overrides.
///
/// The internal override is merged before the user's override. With `safe_for_logs` every
/// secret is replaced with [`REDACTED`], so the result can be logged or shown to users
/// that are not allowed to see the secrets. Nothing is returned unless every step
/// succeeds.
#[instrument(skip_all, fields(infra_env.id = %infra_env.id, safe_for_logs = safe_for_logs))]
pub fn build_discovery_document(
    infra_env: &InfraEnv,
    params: &DiscoveryParams,
    pull_secret_token: Option<&str>,
    safe_for_logs: bool,
    static_network: &impl StaticNetworkConfig,
    mirrors: &impl MirrorRegistries,
) -> Result<String> {
    let mut secrets = Secrets::new(infra_env, params, pull_secret_token);
    if safe_for_logs {
        secrets = secrets.redact();
    }

    let mut config = Config::new(DISCOVERY_VERSION);
    config.ignition.proxy = proxy_settings(&infra_env.proxy);

    if !secrets.ssh_keys.is_empty() {
        config.passwd.users.push(PasswdUser {
            name: "core".to_owned(),
            password_hash: Some("!".to_owned()),
            ssh_authorized_keys: secrets.ssh_keys.clone(),
            groups: vec!["sudo".to_owned()],
            ..PasswdUser::default()
        });
    }

    let agent = agent_unit(
        infra_env,
        params,
        &config.ignition.proxy,
        secrets.pull_secret_token.as_deref(),
    );
    mutate::set_unit(&mut config, agent);
    mutate::set_unit(&mut config, unit("selinux.service", Some(assets::SELINUX_UNIT)));

    mutate::set_file(
        &mut config,
        replace_file(AGENT_FIX_BZ1964591_PATH, assets::AGENT_FIX_BZ1964591).mode(SCRIPT_MODE),
    );
    mutate::set_file(&mut config, replace_file(MOTD_PATH, assets::AGENT_MOTD));
    mutate::set_file(&mut config, replace_file(MULTIPATH_CONF_PATH, assets::MULTIPATH_CONF));
    mutate::set_file(&mut config, replace_file(IPV6_CONFIG_PATH, IPV6_CLIENT_ID_CONF));
    mutate::set_file(&mut config, replace_file(DOCKER_CONFIG_PATH, secrets.pull_secret));
    mutate::set_file(&mut config, replace_file(SELINUX_POLICY_PATH, assets::SELINUX_POLICY));

    if let Some(redhat_root_ca) = secrets.redhat_root_ca {
        mutate::set_file(&mut config, replace_file(REDHAT_ROOT_CA_PATH, redhat_root_ca));
    }

    if let Some(path) = &params.service_ca_cert_path {
        let ca_cert = read_service_ca_cert(path)?;
        mutate::set_file(&mut config, replace_file(HOST_CA_CERT_PATH, ca_cert));
    }

    if let Some(service_ips) = &params.service_ips {
        let hosts = role::service_ip_hosts(service_ips);
        if !hosts.is_empty() {
            mutate::append_line(&mut config, ETC_HOSTS_PATH, hosts, mutate::DEFAULT_FILE_MODE);
        }
    }

    if mirrors.is_configured() {
        let ca_bundle = mirrors.ca_bundle().boxed().context(MirrorRegistriesSnafu)?;
        let registries_conf = mirrors
            .registries_conf()
            .boxed()
            .context(MirrorRegistriesSnafu)?;
        mutate::set_file(
            &mut config,
            replace_file(MIRROR_REGISTRIES_CONF_PATH, registries_conf),
        );
        mutate::set_file(&mut config, replace_file(MIRROR_CA_PATH, ca_bundle));
    }

    let static_network_config = infra_env
        .static_network_config
        .as_deref()
        .filter(|definition| !definition.trim().is_empty());
    if let Some(definition) = static_network_config {
        // Minimal images apply static networking from the initrd instead.
        if infra_env.image_type == ImageType::FullIso {
            let files = static_network
                .generate(definition)
                .boxed()
                .context(StaticNetworkSnafu {
                    infra_env_id: &infra_env.id,
                })?;
            add_static_network(&mut config, files);
        }
    }

    if let Some(rpms_image) = params.okd_rpms_image.as_deref().filter(|i| !i.is_empty()) {
        add_okd_overlay(&mut config, rpms_image);
    }

    let document = normalize::to_string(&config).context(TemplateRenderSnafu)?;

    let internal_override = infra_env.internal_override();
    let document = merge::merge_optional(document, internal_override).context(
        ApplyInternalOverrideSnafu {
            infra_env_id: &infra_env.id,
        },
    )?;
    if internal_override.is_some() {
        tracing::info!(infra_env.id = %infra_env.id, "applied internal ignition override");
    }

    let user_override = infra_env.user_override();
    let document = merge::merge_optional(document, user_override).context(ApplyOverrideSnafu {
        infra_env_id: &infra_env.id,
    })?;
    if user_override.is_some() {
        tracing::info!(infra_env.id = %infra_env.id, "applied ignition override");
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use std::{convert::Infallible, time::Duration};

    use base64::{Engine, engine::general_purpose::STANDARD};
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    const SSH_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIHcBkCNvZ6Lf4vT3 admin@example.com";
    const PULL_SECRET: &str = r#"{"auths":{"registry.example.com":{"auth":"c2VjcmV0"}}}"#;
    const TOKEN: &str = "eyJhbGciOiJIUzI1NiJ9.agent-token";

    struct StaticFiles(Vec<StaticNetworkFile>);

    impl StaticNetworkConfig for StaticFiles {
        type Error = Infallible;

        fn generate(&self, _definition: &str) -> Result<Vec<StaticNetworkFile>, Self::Error> {
            Ok(self.0.clone())
        }
    }

    fn infra_env() -> InfraEnv {
        InfraEnv {
            id: "b4b7c1a4-2d6c-4b9e-a9f4-7ff6fbd1d1f0".to_owned(),
            pull_secret: PULL_SECRET.to_owned(),
            ssh_authorized_key: Some(format!("{SSH_KEY}\n\n  \n")),
            ..InfraEnv::default()
        }
    }

    fn params() -> DiscoveryParams {
        DiscoveryParams {
            service_base_url: " https://assisted.example.com ".to_owned(),
            ..DiscoveryParams::default()
        }
    }

    fn build_with(
        infra_env: &InfraEnv,
        params: &DiscoveryParams,
        safe_for_logs: bool,
        static_network: &StaticFiles,
    ) -> (String, Config) {
        let document = build_discovery_document(
            infra_env,
            params,
            Some(TOKEN),
            safe_for_logs,
            static_network,
            &FileMirrorRegistries::default(),
        )
        .expect("build succeeds");
        let config = normalize::parse(document.as_bytes()).expect("valid document");
        (document, config)
    }

    fn build(infra_env: &InfraEnv, params: &DiscoveryParams) -> Config {
        build_with(infra_env, params, false, &StaticFiles(Vec::new())).1
    }

    fn file_text(config: &Config, path: &str) -> String {
        config
            .files_at(path)
            .next()
            .and_then(|file| file.contents.source.as_ref())
            .and_then(ContentSource::inline_text)
            .unwrap_or_else(|| panic!("{path} has inline contents"))
            .into_owned()
    }

    fn agent_contents(config: &Config) -> &str {
        config
            .unit(AGENT_UNIT)
            .and_then(|unit| unit.contents.as_deref())
            .expect("agent unit has contents")
    }

    #[test]
    fn base_document() {
        let config = build(&infra_env(), &params());

        assert_eq!(config.version(), SpecVersion::V3_1);
        assert!(config.ignition.proxy.is_empty());

        let units: Vec<_> = config.systemd.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(units, [AGENT_UNIT, "selinux.service"]);

        let files: Vec<_> = config.storage.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(
            files,
            [
                AGENT_FIX_BZ1964591_PATH,
                MOTD_PATH,
                MULTIPATH_CONF_PATH,
                IPV6_CONFIG_PATH,
                DOCKER_CONFIG_PATH,
                SELINUX_POLICY_PATH,
            ]
        );
        assert_eq!(file_text(&config, DOCKER_CONFIG_PATH), PULL_SECRET);
        assert_eq!(
            config.files_at(AGENT_FIX_BZ1964591_PATH).next().and_then(|f| f.mode),
            Some(0o755)
        );

        let core = &config.passwd.users[0];
        assert_eq!(core.name, "core");
        assert_eq!(core.password_hash.as_deref(), Some("!"));
        assert_eq!(core.ssh_authorized_keys, [SSH_KEY]);
        assert_eq!(core.groups, ["sudo"]);

        let agent = agent_contents(&config);
        assert!(agent.contains(&format!("Environment=PULL_SECRET_TOKEN={TOKEN}")));
        assert!(agent.contains("TimeoutStartSec=600\n"));
        assert!(agent.contains(
            "--url https://assisted.example.com --infra-env-id b4b7c1a4-2d6c-4b9e-a9f4-7ff6fbd1d1f0"
        ));
        assert!(agent.contains("--insecure=false\n"));
        assert!(!agent.contains("--cacert"));
    }

    #[test]
    fn document_without_proxy_has_no_proxy_key() {
        let document = build_with(&infra_env(), &params(), false, &StaticFiles(Vec::new())).0;
        assert!(!document.contains("\"proxy\""));
    }

    #[rstest]
    #[case::https_only(None, Some("https://proxy:3128"), None, None, Some("https://proxy:3128"), &[])]
    #[case::all(
        Some("http://proxy:3128"),
        Some("https://proxy:3128"),
        Some("example.com, .cluster.local,,"),
        Some("http://proxy:3128"),
        Some("https://proxy:3128"),
        &["example.com", ".cluster.local"]
    )]
    #[case::no_proxy_only(None, None, Some("example.com"), None, None, &["example.com"])]
    #[case::empty_values(Some(""), Some(" "), Some(""), None, None, &[])]
    fn proxy_section(
        #[case] http_proxy: Option<&str>,
        #[case] https_proxy: Option<&str>,
        #[case] no_proxy: Option<&str>,
        #[case] expected_http: Option<&str>,
        #[case] expected_https: Option<&str>,
        #[case] expected_no_proxy: &[&str],
    ) {
        let infra_env = InfraEnv {
            proxy: InfraEnvProxy {
                http_proxy: http_proxy.map(ToOwned::to_owned),
                https_proxy: https_proxy.map(ToOwned::to_owned),
                no_proxy: no_proxy.map(ToOwned::to_owned),
            },
            ..infra_env()
        };

        let config = build(&infra_env, &params());
        let proxy = &config.ignition.proxy;
        assert_eq!(proxy.http_proxy.as_deref(), expected_http);
        assert_eq!(proxy.https_proxy.as_deref(), expected_https);
        assert_eq!(proxy.no_proxy, expected_no_proxy);

        let agent = agent_contents(&config);
        assert!(agent.contains(&format!(
            "Environment=HTTPS_PROXY={}\n",
            expected_https.unwrap_or_default()
        )));
        assert!(agent.contains(&format!(
            "Environment=NO_PROXY={}\n",
            expected_no_proxy.join(",")
        )));
    }

    #[test]
    fn secrets_are_redacted_for_logs() {
        let params = DiscoveryParams {
            install_rh_ca: true,
            ..params()
        };

        let (document, config) =
            build_with(&infra_env(), &params, true, &StaticFiles(Vec::new()));

        assert_eq!(config.passwd.users[0].ssh_authorized_keys, [REDACTED]);
        assert_eq!(file_text(&config, DOCKER_CONFIG_PATH), REDACTED);
        assert_eq!(file_text(&config, REDHAT_ROOT_CA_PATH), REDACTED);
        assert!(agent_contents(&config).contains("Environment=PULL_SECRET_TOKEN=*****\n"));

        for secret in [SSH_KEY, TOKEN] {
            assert!(!document.contains(secret));
        }
        assert!(!document.contains(&STANDARD.encode(PULL_SECRET)));
    }

    #[test]
    fn root_ca_is_installed_on_request() {
        let params = DiscoveryParams {
            install_rh_ca: true,
            ..params()
        };
        let config = build(&infra_env(), &params);

        assert_eq!(file_text(&config, REDHAT_ROOT_CA_PATH), assets::REDHAT_ROOT_CA);
    }

    #[test]
    fn no_user_without_ssh_keys() {
        let infra_env = InfraEnv {
            ssh_authorized_key: Some("\n \n".to_owned()),
            ..infra_env()
        };

        let (_, config) = build_with(&infra_env, &params(), true, &StaticFiles(Vec::new()));
        assert!(config.passwd.users.is_empty());
    }

    #[rstest]
    #[case::no_internal_override(None, true)]
    #[case::internal_override(
        Some(r#"{"ignition":{"version":"3.1.0"}}"#),
        false
    )]
    fn agent_is_enabled_without_internal_override(
        #[case] internal_override: Option<&str>,
        #[case] enabled: bool,
    ) {
        let infra_env = InfraEnv {
            internal_ignition_config_override: internal_override.map(ToOwned::to_owned),
            ..infra_env()
        };

        let config = build(&infra_env, &params());
        assert_eq!(config.unit(AGENT_UNIT).and_then(|u| u.enabled), Some(enabled));
    }

    #[rstest]
    #[case::full_iso(ImageType::FullIso, true)]
    #[case::minimal_iso(ImageType::MinimalIso, false)]
    fn static_network_only_for_full_iso(#[case] image_type: ImageType, #[case] staged: bool) {
        let infra_env = InfraEnv {
            static_network_config: Some("interfaces: []".to_owned()),
            image_type,
            ..infra_env()
        };
        let generator = StaticFiles(vec![StaticNetworkFile {
            path: "host0/eth0.nmconnection".to_owned(),
            contents: "[connection]\nid=eth0\n".to_owned(),
        }]);

        let (_, config) = build_with(&infra_env, &params(), false, &generator);

        let connection = "/etc/assisted/network/host0/eth0.nmconnection";
        assert_eq!(config.files_at(connection).count(), usize::from(staged));
        assert_eq!(
            config.files_at(PRE_NETWORK_CONFIG_SCRIPT_PATH).count(),
            usize::from(staged)
        );
        assert_eq!(
            config.unit("pre-network-manager-config.service").is_some(),
            staged
        );
        if staged {
            let file = config.files_at(connection).next().expect("staged");
            assert_eq!(file.mode, Some(0o600));
            assert_eq!(file_text(&config, connection), "[connection]\nid=eth0\n");
        }
    }

    #[test]
    fn okd_overlay() {
        let params = DiscoveryParams {
            okd_rpms_image: Some("quay.io/okd/rpms:4.10".to_owned()),
            ..params()
        };
        let config = build(&infra_env(), &params);

        for unit in [
            "okd-overlay.service",
            "multipathd.service",
            "systemd-journal-gatewayd.socket",
        ] {
            assert_eq!(config.unit(unit).and_then(|u| u.enabled), Some(true));
        }
        assert!(file_text(&config, OKD_BINARIES_PATH).contains("quay.io/okd/rpms:4.10"));
        assert_eq!(file_text(&config, OKD_HOLD_PIVOT_PATH), assets::OKD_HOLD_PIVOT);
        assert_eq!(file_text(&config, OKD_HOLD_AGENT_PATH), assets::OKD_HOLD_AGENT);
    }

    #[test]
    fn service_ca_and_ips() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let ca_path = dir.path().join("service-ca.crt");
        std::fs::write(&ca_path, "-----BEGIN CERTIFICATE-----\n").expect("write CA");

        let params = DiscoveryParams {
            service_ca_cert_path: Some(ca_path),
            service_ips: Some("10.0.0.1,10.0.0.2".to_owned()),
            agent_timeout_start: Duration::from_secs(90),
            skip_cert_verification: true,
            ..params()
        };
        let config = build(&infra_env(), &params);

        assert_eq!(
            file_text(&config, HOST_CA_CERT_PATH),
            "-----BEGIN CERTIFICATE-----\n"
        );
        let hosts = config.files_at(ETC_HOSTS_PATH).next().expect("hosts entry");
        assert_eq!(hosts.overwrite, Some(false));
        assert_eq!(
            hosts.append[0].source.as_ref().and_then(ContentSource::inline_text).as_deref(),
            Some(indoc! {"
                10.0.0.1 assisted-api.local.openshift.io
                10.0.0.2 assisted-api.local.openshift.io
            "})
        );

        let agent = agent_contents(&config);
        assert!(agent.contains("--insecure=true --cacert /etc/assisted-service/service-ca-cert.crt\n"));
        assert!(agent.contains("TimeoutStartSec=90\n"));
    }

    #[test]
    fn unreadable_service_ca_aborts() {
        let params = DiscoveryParams {
            service_ca_cert_path: Some("/nonexistent/service-ca.crt".into()),
            ..params()
        };

        let err = build_discovery_document(
            &infra_env(),
            &params,
            None,
            false,
            &StaticFiles(Vec::new()),
            &FileMirrorRegistries::default(),
        )
        .expect_err("CA file is missing");
        assert!(matches!(err, Error::ReadServiceCaCert { .. }));
    }

    #[test]
    fn mirror_registries() {
        let dir = tempfile::tempdir().expect("temporary directory");
        let mirrors = FileMirrorRegistries {
            registries_conf: Some(dir.path().join("registries.conf")),
            ca_bundle: Some(dir.path().join("ca-bundle.crt")),
        };
        std::fs::write(dir.path().join("registries.conf"), "[[registry]]\n").expect("write");
        std::fs::write(dir.path().join("ca-bundle.crt"), "mirror CA\n").expect("write");

        let document = build_discovery_document(
            &infra_env(),
            &params(),
            None,
            false,
            &StaticFiles(Vec::new()),
            &mirrors,
        )
        .expect("build succeeds");
        let config = normalize::parse(document.as_bytes()).expect("valid document");

        assert_eq!(file_text(&config, MIRROR_REGISTRIES_CONF_PATH), "[[registry]]\n");
        assert_eq!(file_text(&config, MIRROR_CA_PATH), "mirror CA\n");
    }

    #[test]
    fn user_override_is_applied_after_internal_override() {
        let infra_env = InfraEnv {
            internal_ignition_config_override: Some(
                r#"{"ignition":{"version":"3.1.0"},"storage":{"files":[{"path":"/etc/motd","contents":{"source":"data:,internal"}}]}}"#
                    .to_owned(),
            ),
            ignition_config_override: Some(
                r#"{"ignition":{"version":"3.2.0"},"storage":{"files":[{"path":"/etc/motd","contents":{"source":"data:,user"}}]}}"#
                    .to_owned(),
            ),
            ..infra_env()
        };

        let config = build(&infra_env, &params());

        assert_eq!(config.version(), SpecVersion::V3_2);
        assert_eq!(file_text(&config, MOTD_PATH), "user");
    }

    #[test]
    fn invalid_user_override_aborts() {
        let infra_env = InfraEnv {
            ignition_config_override: Some(r#"{"ignition":{"version":"2.2.0"}}"#.to_owned()),
            ..infra_env()
        };

        let err = build_discovery_document(
            &infra_env,
            &params(),
            None,
            false,
            &StaticFiles(Vec::new()),
            &FileMirrorRegistries::default(),
        )
        .expect_err("override version is unsupported");
        assert!(matches!(err, Error::ApplyOverride { .. }));
    }
}
