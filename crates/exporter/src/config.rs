//! Exporter configuration
//!
//! Settings are layered: built-in defaults, an optional TOML file, then
//! `SAKURACLOUD_EXPORTER_*` environment variables, then command-line flags.

use anyhow::{bail, Context, Result};
use clap::Parser;
use exporter_lib::client::{DEFAULT_ROOT_URL, DEFAULT_ZONES};
use exporter_lib::collector::{is_known_kind, ALL_KINDS};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "SAKURACLOUD_EXPORTER";

/// Command-line flags
#[derive(Parser, Debug, Default)]
#[command(name = "sakuracloud-exporter", version, about = "Prometheus exporter for SAKURA Cloud resources")]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, env = "SAKURACLOUD_EXPORTER_CONFIG")]
    pub config: Option<PathBuf>,

    /// API access token
    #[arg(long, env = "SAKURACLOUD_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// API access token secret
    #[arg(long, env = "SAKURACLOUD_ACCESS_TOKEN_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Address to listen on
    #[arg(long)]
    pub webaddr: Option<String>,

    /// Path under which metrics are served
    #[arg(long)]
    pub webpath: Option<String>,

    /// Zones to collect from, comma separated
    #[arg(long, value_delimiter = ',')]
    pub zones: Vec<String>,

    /// Root URL of the cloud API
    #[arg(long)]
    pub api_root_url: Option<String>,

    /// Timeout of a single API request in seconds
    #[arg(long)]
    pub api_timeout_secs: Option<u64>,

    /// Collector to disable; may be repeated or comma separated
    #[arg(long = "disable-collector", value_delimiter = ',')]
    pub disable_collector: Vec<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// Exporter configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExporterConfig {
    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub secret: String,

    /// Listen address of the HTTP server
    #[serde(default = "default_webaddr")]
    pub webaddr: String,

    /// Metrics endpoint path
    #[serde(default = "default_webpath")]
    pub webpath: String,

    #[serde(default = "default_zones")]
    pub zones: Vec<String>,

    #[serde(default = "default_api_root_url")]
    pub api_root_url: String,

    #[serde(default = "default_api_timeout")]
    pub api_timeout_secs: u64,

    #[serde(default)]
    pub disabled_collectors: Vec<String>,

    #[serde(default)]
    pub debug: bool,
}

fn default_webaddr() -> String {
    "0.0.0.0:9542".to_string()
}

fn default_webpath() -> String {
    "/metrics".to_string()
}

fn default_zones() -> Vec<String> {
    DEFAULT_ZONES.iter().map(|z| z.to_string()).collect()
}

fn default_api_root_url() -> String {
    DEFAULT_ROOT_URL.to_string()
}

fn default_api_timeout() -> u64 {
    20
}

impl ExporterConfig {
    /// Load configuration from file, environment and flags
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with_env(cli, environment())
    }

    fn load_with_env(cli: &Cli, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = &cli.config {
            builder = builder.add_source(
                config::File::from(path.as_path())
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        let mut loaded: ExporterConfig = builder
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        loaded.apply_cli(cli);
        loaded.validate()?;
        Ok(loaded)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(token) = &cli.token {
            self.token = token.clone();
        }
        if let Some(secret) = &cli.secret {
            self.secret = secret.clone();
        }
        if let Some(addr) = &cli.webaddr {
            self.webaddr = addr.clone();
        }
        if let Some(path) = &cli.webpath {
            self.webpath = path.clone();
        }
        if !cli.zones.is_empty() {
            self.zones = cli.zones.clone();
        }
        if let Some(url) = &cli.api_root_url {
            self.api_root_url = url.clone();
        }
        if let Some(secs) = cli.api_timeout_secs {
            self.api_timeout_secs = secs;
        }
        for name in &cli.disable_collector {
            if !self.disabled_collectors.contains(name) {
                self.disabled_collectors.push(name.clone());
            }
        }
        self.debug |= cli.debug;

        self.zones = self
            .zones
            .iter()
            .map(|z| z.trim().to_string())
            .filter(|z| !z.is_empty())
            .collect();
    }

    fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            bail!("an API access token is required (--token or SAKURACLOUD_ACCESS_TOKEN)");
        }
        if self.secret.is_empty() {
            bail!("an API access token secret is required (--secret or SAKURACLOUD_ACCESS_TOKEN_SECRET)");
        }
        if self.zones.is_empty() {
            bail!("at least one zone must be configured");
        }
        if !self.webpath.starts_with('/') {
            bail!("metrics path must start with '/': {}", self.webpath);
        }
        if matches!(self.webpath.as_str(), "/" | "/healthz" | "/readyz") {
            bail!("metrics path collides with a built-in route: {}", self.webpath);
        }
        self.webaddr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address: {}", self.webaddr))?;
        if self.api_timeout_secs == 0 {
            bail!("API timeout must be positive");
        }
        if let Some(unknown) = self.disabled_collectors.iter().find(|n| !is_known_kind(n)) {
            bail!(
                "unknown collector '{unknown}', expected one of: {}",
                ALL_KINDS.join(", ")
            );
        }
        Ok(())
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("zones")
        .with_list_parse_key("disabled_collectors")
}
