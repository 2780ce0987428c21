//! Provenance attached to every written artifact.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Host the artifact was produced on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        EnvironmentInfo {
            os: std::env::consts::OS.to_string(),
            hostname: None,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl EnvironmentInfo {
    /// Detect environment information from the current system
    pub fn detect() -> Self {
        use sysinfo::System;

        let os = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
        let hostname = System::host_name();

        EnvironmentInfo { os, hostname, ..Default::default() }
    }
}

/// A file that went into an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub role: String,
    pub path: String,
    pub sha256: String,
}

impl InputFile {
    pub fn from_bytes(role: &str, path: &Path, bytes: &[u8]) -> Self {
        InputFile {
            role: role.to_string(),
            path: path.display().to_string(),
            sha256: crate::sha256_hex(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    /// `flatten` or `merge`.
    pub command: String,
    /// ISO 8601 timestamp
    pub created: String,
    pub env: EnvironmentInfo,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<InputFile>,
    /// Provenance of each merged artifact, in merge order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Provenance>,
}

impl Provenance {
    pub fn new(command: &str) -> Self {
        Provenance {
            command: command.to_string(),
            created: crate::now_string(),
            env: EnvironmentInfo::detect(),
            inputs: Vec::new(),
            sources: Vec::new(),
        }
    }
}
