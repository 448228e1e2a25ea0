use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub search: SearchConfig,
    pub upstream: UpstreamConfig,
    pub downloads: DownloadConfig,
    pub cli: CliToolConfig,
    #[serde(default)]
    pub quality: QualityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Key-value store configuration (backs all caches and history)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("catcharr.db")
}

/// Search behaviour configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Use the native upstream search API. When false (or for the `*`
    /// feed query) the CLI-driven engine is used instead.
    #[serde(default = "default_true")]
    pub native_search: bool,
    /// Results per page, applied after aggregate expansion.
    #[serde(default = "default_page_size")]
    pub results_per_page: usize,
    /// TTL for cached search responses, in seconds.
    #[serde(default = "default_search_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            native_search: default_true(),
            results_per_page: default_page_size(),
            cache_ttl_secs: default_search_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_page_size() -> usize {
    20
}

fn default_search_ttl() -> u64 {
    300
}

/// Remote catch-up service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Base URL of the catch-up service API (e.g. "https://ibl.api.example/v1")
    pub base_url: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_timeout() -> u32 {
    30
}

/// Download queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Concurrency ceiling for active downloads.
    #[serde(default = "default_active_limit")]
    pub active_limit: usize,
    /// Root directory for in-flight downloads (one subdirectory per item).
    pub download_dir: PathBuf,
    /// Directory finished artifacts are delivered into.
    pub complete_dir: PathBuf,
    /// Working directories older than this with no live queue entry are
    /// deleted by the stale sweep.
    #[serde(default = "default_stale_hours")]
    pub stale_after_hours: u64,
}

fn default_active_limit() -> usize {
    2
}

fn default_stale_hours() -> u64 {
    24
}

/// External CLI tool (search + download) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliToolConfig {
    /// Path to the CLI binary.
    pub path: PathBuf,
    /// Argument template for searches. `{term}` is replaced with the
    /// resolved search term.
    #[serde(default)]
    pub search_args: Vec<String>,
    /// Argument template for downloads. `{pid}` and `{output}` are replaced
    /// with the item id and the per-item working directory.
    #[serde(default)]
    pub download_args: Vec<String>,
}

/// Quality profile to size-factor mapping
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QualityConfig {
    /// Active profile name (key into `size_factors`).
    #[serde(default = "default_profile")]
    pub profile: String,
    /// Estimated megabytes per minute of runtime, per profile.
    #[serde(default = "default_size_factors")]
    pub size_factors: HashMap<String, f64>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            size_factors: default_size_factors(),
        }
    }
}

impl QualityConfig {
    /// Size factor (MB per minute) for the active profile.
    pub fn active_size_factor(&self) -> f64 {
        self.size_factors
            .get(&self.profile)
            .copied()
            .unwrap_or(DEFAULT_SIZE_FACTOR)
    }
}

const DEFAULT_SIZE_FACTOR: f64 = 18.0;

fn default_profile() -> String {
    "hd".to_string()
}

fn default_size_factors() -> HashMap<String, f64> {
    [
        ("fhd".to_string(), 35.0),
        ("hd".to_string(), 18.0),
        ("sd".to_string(), 8.0),
    ]
    .into()
}

/// Sanitized config for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub search: SearchConfig,
    pub upstream: SanitizedUpstreamConfig,
    pub downloads: DownloadConfig,
    pub cli_path: PathBuf,
    pub quality_profile: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedUpstreamConfig {
    pub base_url: String,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            store: config.store.clone(),
            search: config.search.clone(),
            upstream: SanitizedUpstreamConfig {
                base_url: config.upstream.base_url.clone(),
                timeout_secs: config.upstream.timeout_secs,
            },
            downloads: config.downloads.clone(),
            cli_path: config.cli.path.clone(),
            quality_profile: config.quality.profile.clone(),
        }
    }
}
