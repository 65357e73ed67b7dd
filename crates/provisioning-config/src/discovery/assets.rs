//! Fixed file and unit contents placed on every discovered host.

pub const AGENT_MOTD: &str = r"
**  **  **  **  **  **  **  **  **  **  **  **  **  **  **  **  **  ** **  **  **  **  **  **  **
This is a host being installed by the OpenShift Assisted Installer.
It will be installed from scratch during the installation.

The primary service is agent.service. To watch its status, run:
sudo journalctl -u agent.service

To view the agent log, run:
sudo journalctl TAG=agent
**  **  **  **  **  **  **  **  **  **  **  **  **  **  **  **  **  ** **  **  **  **  **  **  **
";

pub const REDHAT_ROOT_CA: &str = "
-----BEGIN CERTIFICATE-----
MIIENDCCAxygAwIBAgIJANunI0D662cnMA0GCSqGSIb3DQEBCwUAMIGlMQswCQYD
VQQGEwJVUzEXMBUGA1UECAwOTm9ydGggQ2Fyb2xpbmExEDAOBgNVBAcMB1JhbGVp
Z2gxFjAUBgNVBAoMDVJlZCBIYXQsIEluYy4xEzARBgNVBAsMClJlZCBIYXQgSVQx
GzAZBgNVBAMMElJlZCBIYXQgSVQgUm9vdCBDQTEhMB8GCSqGSIb3DQEJARYSaW5m
b3NlY0ByZWRoYXQuY29tMCAXDTE1MDcwNjE3MzgxMVoYDzIwNTUwNjI2MTczODEx
WjCBpTELMAkGA1UEBhMCVVMxFzAVBgNVBAgMDk5vcnRoIENhcm9saW5hMRAwDgYD
VQQHDAdSYWxlaWdoMRYwFAYDVQQKDA1SZWQgSGF0LCBJbmMuMRMwEQYDVQQLDApS
ZWQgSGF0IElUMRswGQYDVQQDDBJSZWQgSGF0IElUIFJvb3QgQ0ExITAfBgkqhkiG
9w0BCQEWEmluZm9zZWNAcmVkaGF0LmNvbTCCASIwDQYJKoZIhvcNAQEBBQADggEP
ADCCAQoCggEBALQt9OJQh6GC5LT1g80qNh0u50BQ4sZ/yZ8aETxt+5lnPVX6MHKz
bfwI6nO1aMG6j9bSw+6UUyPBHP796+FT/pTS+K0wsDV7c9XvHoxJBJJU38cdLkI2
c/i7lDqTfTcfLL2nyUBd2fQDk1B0fxrskhGIIZ3ifP1Ps4ltTkv8hRSob3VtNqSo
GxkKfvD2PKjTPxDPWYyruy9irLZioMffi3i/gCut0ZWtAyO3MVH5qWF/enKwgPES
X9po+TdCvRB/RUObBaM761EcrLSM1GqHNueSfqnho3AjLQ6dBnPWlo638Zm1VebK
BELyhkLWMSFkKwDmne0jQ02Y4g075vCKvCsCAwEAAaNjMGEwHQYDVR0OBBYEFH7R
4yC+UehIIPeuL8Zqw3PzbgcZMB8GA1UdIwQYMBaAFH7R4yC+UehIIPeuL8Zqw3Pz
bgcZMA8GA1UdEwEB/wQFMAMBAf8wDgYDVR0PAQH/BAQDAgGGMA0GCSqGSIb3DQEB
CwUAA4IBAQBDNvD2Vm9sA5A9AlOJR8+en5Xz9hXcxJB5phxcZQ8jFoG04Vshvd0e
LEnUrMcfFgIZ4njMKTQCM4ZFUPAieyLx4f52HuDopp3e5JyIMfW+KFcNIpKwCsak
oSoKtIUOsUJK7qBVZxcrIyeQV2qcYOeZhtS5wBqIwOAhFwlCET7Ze58QHmS48slj
S9K0JAcps2xdnGu0fkzhSQxY8GPQNFTlr6rYld5+ID/hHeS76gq0YG3q6RLWRkHf
4eTkRjivAlExrFzKcljC4axKQlnOvVAzz+Gm32U0xPBF4ByePVxCJUHw1TsyTmel
RxNEp7yHoXcwn+fXna+t5JWh1gxUZty3
-----END CERTIFICATE-----";

/// Lets chronyd talk to the agent's containers.
pub const SELINUX_POLICY: &str = "
module assisted 1.0;
require {
        type chronyd_t;
        type container_file_t;
        type spc_t;
        class unix_dgram_socket sendto;
        class dir search;
        class sock_file write;
}
#============= chronyd_t ==============
allow chronyd_t container_file_t:dir search;
allow chronyd_t container_file_t:sock_file write;
allow chronyd_t spc_t:unix_dgram_socket sendto;
";

/// Removes the agent image when its layers are corrupted (bugzilla 1964591), so that
/// `agent.service` pulls it again.
pub const AGENT_FIX_BZ1964591: &str = r"#!/usr/bin/sh

# Symlinks inside /var/lib/containers/ can get corrupted. When podman fails to list the
# requested image it is removed, and agent.service pulls it again on start.

IMAGE=$(echo $1 | sed 's/:.*//')
podman images | grep $IMAGE || podman rmi --force $1 || true
";

pub const MULTIPATH_CONF: &str = r#"defaults {
    user_friendly_names yes
    find_multipaths yes
    enable_foreign "^$"
}
blacklist_exceptions {
    property "(SCSI_IDENT_|ID_WWN)"
}
blacklist {
}
"#;

/// Placeholder replaced with the OKD RPMs image in [`OKD_BINARIES_OVERLAY_TEMPLATE`].
pub const RPMS_IMAGE_PLACEHOLDER: &str = "@RPMS_IMAGE@";

/// Installs the OKD RPMs into an overlay on `/usr` before the agent starts.
pub const OKD_BINARIES_OVERLAY_TEMPLATE: &str = r#"#!/bin/env bash
set -eux
# Fetch an image with OKD rpms
RPMS_IMAGE="@RPMS_IMAGE@"
while ! podman pull --quiet "${RPMS_IMAGE}"
do
    echo "Pull failed. Retrying ${RPMS_IMAGE}..."
    sleep 5
done
mnt=$(podman image mount "${RPMS_IMAGE}")
# Extract machine-config-daemon binary
cp -rvf ${mnt}/binaries/machine-config-daemon /usr/local/bin/machine-config-daemon
chmod a+x /usr/local/bin/machine-config-daemon
restorecon -Rv /usr/local/bin/machine-config-daemon
# Install RPMs in overlayed FS
mkdir /tmp/rpms
cp -rvf ${mnt}/rpms/* /tmp/rpms
tmpd=$(mktemp -d)
mkdir ${tmpd}/{upper,work}
mount -t overlay -o lowerdir=/usr,upperdir=${tmpd}/upper,workdir=${tmpd}/work overlay /usr
rpm -Uvh /tmp/rpms/*
podman rmi -f "${RPMS_IMAGE}"
# Expand /var to 6G if necessary
if (( $(stat -c%s /run/ephemeral.xfsloop) > 6*1024*1024*1024 )); then
  exit 0
fi
/bin/truncate -s 6G /run/ephemeral.xfsloop
losetup -c /dev/loop0
xfs_growfs /var
mount -o remount,size=6G /run
"#;

pub fn okd_binaries_overlay(rpms_image: &str) -> String {
    OKD_BINARIES_OVERLAY_TEMPLATE.replace(RPMS_IMAGE_PLACEHOLDER, rpms_image)
}

/// Keeps the release image pivot from running on OKD hosts.
pub const OKD_HOLD_PIVOT: &str = "[Unit]\nConditionPathExists=/enoent\n";

/// Holds `agent.service` until the OKD binaries are installed.
pub const OKD_HOLD_AGENT: &str = "[Unit]\nWants=okd-overlay.service\nAfter=okd-overlay.service\n";

/// Copies the connection files staged in `/etc/assisted/network` into place before
/// NetworkManager starts.
///
/// Every host directory carries a `mac_interface.ini` mapping MAC addresses to the
/// interface names used in its connection files. The directory whose MACs are all present
/// on this host is the one that belongs to it.
pub const PRE_NETWORK_CONFIG_SCRIPT: &str = r#"#!/bin/bash

PATH_PREFIX="/etc/assisted/network"
SYSTEM_CONNECTIONS="/etc/NetworkManager/system-connections"

if [ ! -d "${PATH_PREFIX}" ]; then
  echo "No static network configuration staged in ${PATH_PREFIX}"
  exit 0
fi

host_macs=$(cat /sys/class/net/*/address 2>/dev/null)

for host_dir in "${PATH_PREFIX}"/*/; do
  mapping="${host_dir}mac_interface.ini"
  [ -f "${mapping}" ] || continue

  matched=true
  while IFS="=" read -r mac _; do
    [ -n "${mac}" ] || continue
    if ! grep -qi "^${mac}$" <<< "${host_macs}"; then
      matched=false
      break
    fi
  done < "${mapping}"

  if [ "${matched}" = true ]; then
    echo "Using static network configuration from ${host_dir}"
    mkdir -p "${SYSTEM_CONNECTIONS}"
    cp -f "${host_dir}"*.nmconnection "${SYSTEM_CONNECTIONS}/"
    chmod 600 "${SYSTEM_CONNECTIONS}"/*.nmconnection
    exit 0
  fi
done

echo "None of the staged static network configurations matches this host"
"#;

pub const SELINUX_UNIT: &str = "[Service]\nType=oneshot\nExecStartPre=checkmodule -M -m -o /root/assisted.mod /root/assisted.te\nExecStartPre=semodule_package -o /root/assisted.pp -m /root/assisted.mod\nExecStart=semodule -i /root/assisted.pp\n\n[Install]\nWantedBy=multi-user.target";

pub const PRE_NETWORK_MANAGER_CONFIG_UNIT: &str = "[Unit]\nDescription=Prepare network manager config content\nBefore=dracut-initqueue.service\nAfter=dracut-cmdline.service\nDefaultDependencies=no\n[Service]\nUser=root\nType=oneshot\nTimeoutSec=60\nExecStart=/bin/bash /usr/local/bin/pre-network-manager-config.sh\nPrivateTmp=true\nRemainAfterExit=no\n[Install]\nWantedBy=multi-user.target";

pub const OKD_OVERLAY_UNIT: &str = "[Service]\nType=oneshot\nExecStart=/usr/local/bin/okd-binaries.sh\n\n[Unit]\nWants=network-online.target\nAfter=network-online.target\n\n[Install]\nWantedBy=multi-user.target";

/// Stands in for the journal gateway so that nothing else listens on its port.
pub const JOURNAL_GATEWAY_SOCKET: &str = "[Unit]\nDescription = Fake systemd-journal-gatewayd.socket\n\n[Socket]\nListenStream = 19531\nAccept = yes\n\n[Install]\nWantedBy = sockets.target";
