use crate::walker::WalkStrategy;
use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub vsphere: VsphereConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VsphereConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: SecretString,
    /// Skip TLS certificate validation (vCenter commonly ships self-signed certs)
    #[serde(default = "default_insecure")]
    pub insecure: bool,
    #[serde(default = "default_api_release")]
    pub api_release: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub strategy: WalkStrategy,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_seconds: u64,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub collect_host_metrics: bool,
    #[serde(default = "default_true")]
    pub collect_datastore_metrics: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_password() -> SecretString {
    SecretString::from("")
}

fn default_insecure() -> bool {
    true
}

fn default_api_release() -> String {
    "8.0.1.0".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9102
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_call_timeout() -> u64 {
    10
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: String::new(),
            password: default_password(),
            insecure: default_insecure(),
            api_release: default_api_release(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
            metrics_path: default_metrics_path(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            strategy: WalkStrategy::default(),
            call_timeout_seconds: default_call_timeout(),
            poll_timeout_seconds: default_poll_timeout(),
            collect_host_metrics: true,
            collect_datastore_metrics: true,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("VSPHERE_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Reject settings that would make every poll fail or the router panic
    pub fn validate(&self) -> Result<()> {
        if self.vsphere.host.trim().is_empty() {
            anyhow::bail!("vsphere.host must not be empty");
        }
        if !self.server.metrics_path.starts_with('/') {
            anyhow::bail!(
                "server.metrics_path must start with '/', got {:?}",
                self.server.metrics_path
            );
        }
        if matches!(self.server.metrics_path.as_str(), "/" | "/health") {
            anyhow::bail!(
                "server.metrics_path {:?} collides with a built-in route",
                self.server.metrics_path
            );
        }
        if self.metrics.call_timeout_seconds == 0 || self.metrics.poll_timeout_seconds == 0 {
            anyhow::bail!("metrics timeouts must be at least one second");
        }
        Ok(())
    }
}
