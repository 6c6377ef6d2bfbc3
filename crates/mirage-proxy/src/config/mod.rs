//! Configuration types for the Mirage proxy.

use crate::modes::Mode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    /// Mode the proxy starts in
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middleware: Option<MiddlewareConfig>,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub no_match: NoMatchConfig,
    /// Simulation document loaded at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulation_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8500
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// When set, all forwarded traffic goes to this `host[:port]` instead of
    /// the destination the client addressed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

fn default_upstream_timeout() -> u64 {
    30
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            destination: None,
            timeout_secs: default_upstream_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MiddlewareConfig {
    /// Remote middleware endpoint the request/response pair is POSTed to
    pub url: String,
    #[serde(default = "default_middleware_timeout")]
    pub timeout_secs: u64,
}

fn default_middleware_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JournalConfig {
    /// Oldest entries are evicted past this size; None = unlimited
    #[serde(default = "default_journal_capacity")]
    pub capacity: Option<usize>,
}

fn default_journal_capacity() -> Option<usize> {
    Some(1000)
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            capacity: default_journal_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CaptureConfig {
    /// Header names capture mode turns into matchers; `*` captures all
    #[serde(default)]
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NoMatchConfig {
    /// Status of the simulate-mode no-match response
    #[serde(default = "default_no_match_status")]
    pub status: u16,
    /// Fixed response body; when unset the response describes the closest
    /// missed pair
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

fn default_no_match_status() -> u16 {
    502
}

impl Default for NoMatchConfig {
    fn default() -> Self {
        Self {
            status: default_no_match_status(),
            body: None,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.port == 0 {
            anyhow::bail!("listen.port must be non-zero");
        }

        if let Some(middleware) = &self.middleware {
            let uri: hyper::Uri = middleware
                .url
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid middleware url '{}': {e}", middleware.url))?;
            if uri.scheme_str() != Some("http") && uri.scheme_str() != Some("https") {
                anyhow::bail!(
                    "middleware url '{}' must be http or https",
                    middleware.url
                );
            }
            if middleware.timeout_secs == 0 {
                anyhow::bail!("middleware.timeout_secs must be non-zero");
            }
        }

        if self.upstream.timeout_secs == 0 {
            anyhow::bail!("upstream.timeout_secs must be non-zero");
        }

        Ok(())
    }
}
