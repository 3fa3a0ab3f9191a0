//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::Algorithm;

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Throttling algorithm; unrecognized values fall back to the
    /// sliding window log
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Requests allowed per client per minute
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Request paths exempt from rate limiting (exact match)
    #[serde(default = "default_exempt_paths")]
    pub exempt_paths: Vec<String>,

    /// Idle time after which a client's window state is evicted, in seconds
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,

    /// Interval between idle-state sweeps, in seconds
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            requests_per_minute: default_requests_per_minute(),
            exempt_paths: default_exempt_paths(),
            idle_ttl_secs: default_idle_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_exempt_paths() -> Vec<String> {
    vec!["/internal".to_string()]
}

fn default_idle_ttl_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl TurnstileConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: TurnstileConfig = serde_yaml::from_str(&contents)
            .map_err(|e| TurnstileError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration at startup.
    ///
    /// Invalid limits are construction-time failures; they must never
    /// surface on the request path.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limiting.requests_per_minute == 0 {
            return Err(TurnstileError::Config(
                "rate_limiting.requests_per_minute must be greater than zero".to_string(),
            ));
        }
        if self.rate_limiting.sweep_interval_secs == 0 {
            return Err(TurnstileError::Config(
                "rate_limiting.sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
