//! Probe configuration: built-in defaults, optional TOML file, CLI overrides

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::descriptor::{NetworkDescriptor, ServerConfig};
use crate::network::{DEFAULT_ECHO_TIMEOUT_SECS, DEFAULT_ECHO_URL, DEFAULT_TARGET_TIMEOUT_SECS};
use crate::probe::{Markers, ProbeSettings, DEFAULT_AUTHORIZED_MARKER, DEFAULT_DENIED_MARKER};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSection {
    pub echo_url: String,
    pub echo_timeout_secs: u64,
    /// Verification page; no default, must come from the file or the CLI
    pub target_url: Option<String>,
    pub target_timeout_secs: u64,
    pub authorized_marker: String,
    pub denied_marker: String,
}

impl Default for ProbeSection {
    fn default() -> Self {
        Self {
            echo_url: DEFAULT_ECHO_URL.to_string(),
            echo_timeout_secs: DEFAULT_ECHO_TIMEOUT_SECS,
            target_url: None,
            target_timeout_secs: DEFAULT_TARGET_TIMEOUT_SECS,
            authorized_marker: DEFAULT_AUTHORIZED_MARKER.to_string(),
            denied_marker: DEFAULT_DENIED_MARKER.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub probe: ProbeSection,
    pub network: NetworkDescriptor,
    pub server: ServerConfig,
}

impl Config {
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let cfg: Config = toml::from_str(&s)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(cfg)
    }

    /// Validate and turn the probe section into runtime settings
    pub fn to_settings(&self) -> anyhow::Result<ProbeSettings> {
        let probe = &self.probe;
        let target_url = match probe.target_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => anyhow::bail!(
                "No verification page URL: pass --target-url or set probe.target_url in the config file"
            ),
        };
        if probe.echo_url.trim().is_empty() {
            anyhow::bail!("Echo URL must not be empty");
        }
        if probe.echo_timeout_secs == 0 || probe.target_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be at least 1 second");
        }
        if probe.authorized_marker.is_empty() || probe.denied_marker.is_empty() {
            anyhow::bail!("Marker strings must not be empty");
        }

        Ok(ProbeSettings {
            echo_url: probe.echo_url.trim().to_string(),
            echo_timeout: Duration::from_secs(probe.echo_timeout_secs),
            target_url,
            target_timeout: Duration::from_secs(probe.target_timeout_secs),
            markers: Markers {
                authorized: probe.authorized_marker.clone(),
                denied: probe.denied_marker.clone(),
            },
        })
    }
}
