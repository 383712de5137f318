use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::{Addressing, ReconnectPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Shared secret required in the `x-api-key` header on every route
    /// except `/health`. No default; the bridge refuses to serve without one.
    pub api_key: Option<String>,
    /// Country code prepended to recipient numbers that lack it.
    #[serde(default = "default_country_prefix")]
    pub country_prefix: String,
    /// Domain suffix of the transport's addressing scheme.
    #[serde(default = "default_jid_suffix")]
    pub jid_suffix: String,
    /// Where session credentials are persisted between restarts.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Delay before reconnecting after a retryable connection close.
    #[serde(default = "default_close_retry_secs")]
    pub close_retry_secs: u64,
    /// Delay before retrying after a transport startup failure. Larger than
    /// `close_retry_secs` so persistent misconfiguration cannot crash-loop.
    #[serde(default = "default_start_retry_secs")]
    pub start_retry_secs: u64,
    #[serde(default)]
    pub transport: TransportMode,
}

/// Which transport backend the session connects through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// In-process transport that pairs instantly and echoes sends.
    /// Useful for development and exercising the control API end to end.
    #[default]
    Loopback,
}

// Default functions
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    3000
}
fn default_country_prefix() -> String {
    "55".into()
}
fn default_jid_suffix() -> String {
    "@s.whatsapp.net".into()
}
fn default_close_retry_secs() -> u64 {
    5
}
fn default_start_retry_secs() -> u64 {
    10
}
fn default_credentials_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "wabridge")
        .map(|dirs| dirs.data_dir().join("credentials.json"))
        .unwrap_or_else(|| PathBuf::from("credentials.json"))
}

fn default_config_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "wabridge")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load configuration from a TOML file, then apply environment overrides.
///
/// An explicit `path` must exist; without one the default location is used
/// and a missing file simply means defaults.
pub fn load(path: Option<&str>) -> Result<BridgeConfig> {
    let content = match path {
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("failed to read config file {p}"))?,
        None => {
            let default = default_config_path();
            if default.exists() {
                std::fs::read_to_string(&default)
                    .with_context(|| format!("failed to read {}", default.display()))?
            } else {
                tracing::warn!("no config file at {}, using defaults", default.display());
                String::new()
            }
        }
    };

    let mut config: BridgeConfig = toml::from_str(&content).context("invalid config file")?;

    // Env var overrides
    if let Ok(v) = std::env::var("WABRIDGE_HOST") {
        config.host = v;
    }
    if let Ok(v) = std::env::var("WABRIDGE_PORT") {
        config.port = v.parse().context("WABRIDGE_PORT must be a port number")?;
    }
    if let Ok(v) = std::env::var("WABRIDGE_API_KEY") {
        config.api_key = Some(v);
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &BridgeConfig) -> Result<()> {
    if config.close_retry_secs == 0 || config.start_retry_secs == 0 {
        bail!("reconnect delays must be non-zero (a zero delay hot-loops against the remote service)");
    }
    if config.country_prefix.is_empty() || !config.country_prefix.chars().all(|c| c.is_ascii_digit())
    {
        bail!("country_prefix must be one or more digits");
    }
    if !config.jid_suffix.starts_with('@') {
        bail!("jid_suffix must start with '@' (e.g. \"@s.whatsapp.net\")");
    }
    if let Some(key) = &config.api_key {
        if key.trim().is_empty() {
            bail!("api_key must not be blank");
        }
    }
    Ok(())
}

impl BridgeConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            close_retry: Duration::from_secs(self.close_retry_secs),
            start_retry: Duration::from_secs(self.start_retry_secs),
        }
    }

    pub fn addressing(&self) -> Addressing {
        Addressing {
            country_prefix: self.country_prefix.clone(),
            jid_suffix: self.jid_suffix.clone(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
