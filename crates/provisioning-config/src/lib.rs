//! Assembly and merge engine for first-boot provisioning configs, the documents hosts read
//! on their very first boot to lay down files, users and systemd units.
//!
//! Documents of spec version 3.1.0 and 3.2.0 are parsed into one canonical tree
//! ([`document::Config`]), edited there and written back in the version they declare.
//!
//! ## Crate Features
//!
//! - `clap` lets [`discovery::DiscoveryParams`] be used as CLI arguments.
pub mod bootstrap;
pub mod day2;
pub mod discovery;
pub mod document;
pub mod host;
pub mod inventory;
pub mod merge;
pub mod mutate;
pub mod normalize;
pub mod per_host;
pub mod role;
pub mod source;
pub mod validation;
pub mod version;
pub mod workdir;

pub use document::Config;
pub use source::ContentSource;
pub use version::{ClusterVersion, SpecVersion};
