use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use snafu::{ResultExt, Snafu, ensure};

#[derive(Debug, Snafu)]
pub enum VersionParseError {
    #[snafu(display("failed to parse {input:?} as a semantic version"))]
    InvalidSemver {
        source: semver::Error,
        input: String,
    },

    #[snafu(display("unsupported spec version {version}, expected one of 3.1.0 or 3.2.0"))]
    Unsupported { version: semver::Version },
}

/// The provisioning-config (Ignition) spec versions this crate can read and write.
///
/// Variants are ordered from oldest to newest, so `max` picks the newer of two versions.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpecVersion {
    V3_1,
    V3_2,
}

impl SpecVersion {
    pub const LATEST: Self = Self::V3_2;

    /// All supported versions, newest first. Parsing tries them in this order.
    pub const NEWEST_FIRST: [Self; 2] = [Self::V3_2, Self::V3_1];

    pub const fn minor(self) -> u64 {
        match self {
            Self::V3_1 => 1,
            Self::V3_2 => 2,
        }
    }

    pub fn as_semver(self) -> semver::Version {
        semver::Version::new(3, self.minor(), 0)
    }
}

impl FromStr for SpecVersion {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let version = semver::Version::parse(input).context(InvalidSemverSnafu { input })?;

        ensure!(
            version.major == 3 && version.patch == 0 && version.pre.is_empty(),
            UnsupportedSnafu { version }
        );

        match version.minor {
            1 => Ok(Self::V3_1),
            2 => Ok(Self::V3_2),
            _ => UnsupportedSnafu { version }.fail(),
        }
    }
}

impl Display for SpecVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "3.{}.0", self.minor())
    }
}

impl Serialize for SpecVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SpecVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let input = String::deserialize(deserializer)?;
        Self::from_str(&input).map_err(de::Error::custom)
    }
}

#[derive(Debug, Snafu)]
#[snafu(display("failed to parse cluster version {input:?}"))]
pub struct ClusterVersionParseError {
    source: semver::Error,
    input: String,
}

/// An OpenShift release version such as `4.7`, `4.10.3` or `4.10.0-0.alpha`.
///
/// Only the `major.minor` part takes part in comparisons, which is how feature gates
/// (for example "is this at least 4.10") are expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClusterVersion {
    pub major: u64,
    pub minor: u64,
}

impl FromStr for ClusterVersion {
    type Err = ClusterVersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim().trim_start_matches('v');

        // Releases are commonly written as `major.minor`, which is not valid semver on its own
        let parsed = match semver::Version::parse(trimmed) {
            Ok(version) => version,
            Err(_) if trimmed.matches('.').count() == 1 => {
                semver::Version::parse(&format!("{trimmed}.0")).context(
                    ClusterVersionParseSnafu {
                        input: input.to_owned(),
                    },
                )?
            }
            Err(source) => {
                return Err(source).context(ClusterVersionParseSnafu {
                    input: input.to_owned(),
                });
            }
        };

        Ok(Self {
            major: parsed.major,
            minor: parsed.minor,
        })
    }
}

impl ClusterVersion {
    pub fn at_least(&self, major: u64, minor: u64) -> bool {
        (self.major, self.minor) >= (major, minor)
    }
}
