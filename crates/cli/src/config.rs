//! Configuration management for the CLI
//!
//! Values are layered from lowest to highest precedence: built-in defaults,
//! `~/.config/arkctl/config.json`, `ARKCTL_*` environment variables and
//! finally command-line flags.

use anyhow::{Context, Result};
use ark_client::{ClientConfig, RuntimeCoordinate, DEFAULT_NAMESPACE, LOCAL_HOST};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Host of the ark container for direct calls
    #[serde(default = "default_host")]
    pub host: String,

    /// Ark API port; the client default applies when unset
    #[serde(default)]
    pub port: Option<u16>,

    /// Timeout for a whole HTTP request in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Orchestrator program used for `health --pod`
    #[serde(default = "default_kubectl")]
    pub kubectl: String,

    /// Namespace for pod references given without one
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_host() -> String {
    LOCAL_HOST.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            timeout_secs: default_timeout_secs(),
            kubectl: default_kubectl(),
            namespace: default_namespace(),
        }
    }
}

impl Settings {
    /// Load from the user config file and environment
    pub fn load() -> Result<Self> {
        Self::load_from(config_path().as_deref())
    }

    /// Load from `file` (skipped when absent) and environment
    pub fn load_from(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Json)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("ARKCTL").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// Apply command-line overrides
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if port.is_some() {
            self.port = port;
        }
        self
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            request_timeout: Duration::from_secs(self.timeout_secs),
            exec_program: self.kubectl.clone(),
            ..ClientConfig::default()
        }
    }

    /// Container addressed by `host`/`port`
    pub fn direct_target(&self) -> RuntimeCoordinate {
        if self.host == LOCAL_HOST || self.host.eq_ignore_ascii_case("localhost") {
            RuntimeCoordinate::Local {
                host: self.host.clone(),
                port: self.port,
            }
        } else {
            RuntimeCoordinate::vm(self.host.clone(), self.port)
        }
    }

    /// Container in a pod; bare pod names land in the configured namespace
    pub fn pod_target(&self, pod_ref: &str) -> Result<RuntimeCoordinate> {
        let qualified = if pod_ref.contains('/') {
            pod_ref.to_string()
        } else {
            format!("{}/{}", self.namespace, pod_ref)
        };
        RuntimeCoordinate::from_pod_ref(&qualified, self.port).context("Invalid --pod value")
    }
}

/// Get the configuration file path
fn config_path() -> Option<PathBuf> {
    dirs_next::home_dir().map(|home| home.join(".config").join("arkctl").join("config.json"))
}
