//! Configuration parsing and validation for the proxy server
//!
//! Every option can be given as a flag or through the environment.
use anyhow::anyhow;
use clap::Parser;
use nexos_compat::client::PoolConfig;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// The port on which the proxy server will listen.
    #[arg(short = 'p', long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Base URL of the gateway requests are forwarded to.
    #[arg(short = 'u', long, env = "UPSTREAM_URL", default_value = "https://api.nexos.ai/")]
    pub upstream_url: Url,

    /// The port on which the metrics server will listen.
    #[arg(long, env = "METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Whether to enable the metrics endpoint.
    #[arg(short = 'm', long, env = "METRICS", default_value_t = true, action = clap::ArgAction::Set)]
    pub metrics: bool,

    /// The prefix to use for metrics.
    #[arg(long, env = "METRICS_PREFIX", default_value = "nexos_compat")]
    pub metrics_prefix: String,

    /// Maximum number of idle connections kept alive to the upstream.
    #[arg(long, env = "POOL_MAX_IDLE_PER_HOST", default_value_t = 100)]
    pub pool_max_idle_per_host: usize,

    /// How long (in seconds) to keep idle upstream connections alive.
    #[arg(long, env = "POOL_IDLE_TIMEOUT_SECS", default_value_t = 90)]
    pub pool_idle_timeout_secs: u64,
}

impl Config {
    pub fn validate(self) -> Result<Self, anyhow::Error> {
        if !matches!(self.upstream_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Upstream URL '{}' must use http or https",
                self.upstream_url
            ));
        }
        if self.upstream_url.host_str().is_none() {
            return Err(anyhow!("Upstream URL '{}' has no host", self.upstream_url));
        }
        if self.metrics && self.metrics_port == self.port {
            return Err(anyhow!(
                "Metrics port {} clashes with the proxy port",
                self.metrics_port
            ));
        }
        Ok(self)
    }

    pub fn pool(&self) -> PoolConfig {
        PoolConfig {
            max_idle_per_host: self.pool_max_idle_per_host,
            idle_timeout: Duration::from_secs(self.pool_idle_timeout_secs),
        }
    }
}
