// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for nfctl.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Registry used for images built locally on RHEL-family hosts.
pub const LOCAL_REGISTRY: &str = "localhost/oai";

/// Registry used for published images.
pub const PUBLIC_REGISTRY: &str = "docker.io/oaisoftwarealliance";

const RHEL_FAMILY: &[&str] = &["rhel", "centos", "fedora", "rocky"];

/// Launcher configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Container runtime CLI binary (docker, podman)
    pub runtime_binary: String,
    /// Platform identifier used as the image tag (e.g. `ubuntu18.04`)
    pub platform: String,
    /// Registry prefix for network-function images
    pub registry: String,
    /// Prefix prepended to every container name
    pub name_prefix: String,
    /// Database image, also used as the provisioning client
    pub db_image: String,
    /// Well-known address whose route identifies the outbound interface
    pub probe_target: String,
    /// Default timeout for container state waits
    pub state_timeout: Duration,
    /// Default timeout for socket waits
    pub socket_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let os_release_path = std::env::var("NFCTL_OS_RELEASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/os-release"));

        let platform = std::env::var("NFCTL_PLATFORM").ok();
        let registry = std::env::var("NFCTL_REGISTRY").ok();

        // os-release is only consulted when one of the derived values is missing
        let (platform, registry) = match (platform, registry) {
            (Some(p), Some(r)) => (p, r),
            (p, r) => {
                let os = OsRelease::from_file(&os_release_path)?;
                (
                    p.unwrap_or_else(|| os.platform()),
                    r.unwrap_or_else(|| os.registry().to_string()),
                )
            }
        };

        Ok(Self {
            runtime_binary: std::env::var("NFCTL_CONTAINER_RUNTIME")
                .unwrap_or_else(|_| "docker".to_string()),
            platform,
            registry,
            name_prefix: std::env::var("NFCTL_NAME_PREFIX").unwrap_or_else(|_| "nfctl".to_string()),
            db_image: std::env::var("NFCTL_DB_IMAGE").unwrap_or_else(|_| "cassandra:2.1".to_string()),
            probe_target: std::env::var("NFCTL_PROBE_TARGET")
                .unwrap_or_else(|_| "8.8.8.8".to_string()),
            state_timeout: parse_secs("NFCTL_STATE_TIMEOUT_SECS", 30)?,
            socket_timeout: parse_secs("NFCTL_SOCKET_TIMEOUT_SECS", 120)?,
        })
    }
}

fn parse_secs(var: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(v) => match v.trim().parse::<u64>() {
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(_) => Err(ConfigError::InvalidValue { var, value: v }),
        },
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

/// Parsed `/etc/os-release` key/value pairs.
#[derive(Debug, Clone, Default)]
pub struct OsRelease {
    fields: HashMap<String, String>,
}

impl OsRelease {
    /// Parse os-release content. Values may be single- or double-quoted.
    pub fn parse(content: &str) -> Self {
        let fields = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once('='))
            .map(|(k, v)| {
                let v = v.trim().trim_matches(|c| c == '"' || c == '\'');
                (k.trim().to_string(), v.to_string())
            })
            .collect();
        Self { fields }
    }

    /// Read and parse an os-release file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::OsRelease {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Look up a raw field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Distribution ID, lowercased (`ubuntu`, `rhel`, ...).
    pub fn id(&self) -> String {
        self.get("ID").unwrap_or("linux").to_ascii_lowercase()
    }

    /// Platform identifier: ID followed by VERSION_ID (`ubuntu18.04`).
    pub fn platform(&self) -> String {
        format!("{}{}", self.id(), self.get("VERSION_ID").unwrap_or_default())
    }

    /// Registry prefix for this distribution.
    pub fn registry(&self) -> &'static str {
        if RHEL_FAMILY.contains(&self.id().as_str()) {
            LOCAL_REGISTRY
        } else {
            PUBLIC_REGISTRY
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// The os-release file could not be read.
    #[error("Cannot read {}: {source}", path.display())]
    OsRelease {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No component tags were requested.
    #[error("No component tags requested")]
    EmptyRequest,

    /// A requested tag is not a known component or alias.
    #[error("Unknown component tag: {0}")]
    UnknownTag(String),

    /// A component declares a dependency that is not in the catalog.
    #[error("Component {component} depends on unknown component {dependency}")]
    UnknownDependency {
        /// Declaring component.
        component: String,
        /// Missing dependency.
        dependency: String,
    },

    /// A component tag or launch unit key is declared twice.
    #[error("Duplicate catalog entry: {0}")]
    DuplicateEntry(String),

    /// The dependency graph contains a cycle.
    #[error("Dependency cycle between components: {}", .0.join(", "))]
    DependencyCycle(Vec<String>),

    /// A component template declares the same environment key twice.
    #[error("Duplicate environment key {key} in {unit}")]
    DuplicateEnvKey {
        /// Launch unit key.
        unit: String,
        /// Duplicated key.
        key: String,
    },

    /// A template references an address the component cannot know.
    #[error("{unit} references unit {reference}, which is not part of its dependencies")]
    UnreachableReference {
        /// Launch unit key containing the reference.
        unit: String,
        /// Referenced unit key.
        reference: String,
    },

    /// A template contains a malformed placeholder.
    #[error("Invalid placeholder in {unit}: {placeholder}")]
    InvalidPlaceholder {
        /// Launch unit key.
        unit: String,
        /// Offending placeholder text.
        placeholder: String,
    },
}
