//! Configuration management for the MİDA server.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::flow::SalesSettings;
use mida_common::constants::{
    DEFAULT_LISTEN_ADDR, DEFAULT_PAGE_SIZE, DEFAULT_REDIS_URL, TEXT_CHALLENGE_TTL_SECS,
};

/// Where sessions and challenges are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    /// Process memory; lost on restart
    Memory,
}

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub store: StoreBackend,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Chapca flows with no activity for this long are dropped
    #[serde(default = "default_flow_idle")]
    pub flow_idle_secs: u64,

    /// Text CAPTCHA configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Sales wizard captcha settings served when a request brings none
    #[serde(default)]
    pub sales: SalesSettings,

    /// Session history paging
    #[serde(default)]
    pub history: HistoryConfig,
}

/// Text CAPTCHA configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Font file for CAPTCHA text; the bundled DejaVu Sans when unset
    #[serde(default)]
    pub font_path: Option<String>,

    /// Challenge validity in seconds
    #[serde(default = "default_challenge_ttl")]
    pub challenge_ttl_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            challenge_ttl_secs: default_challenge_ttl(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    /// Larger requested pages are cut down to this
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl HistoryConfig {
    /// Requested page size, defaulted and capped
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

// Default value functions
fn default_redis_url() -> String { DEFAULT_REDIS_URL.to_string() }
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_request_timeout() -> u64 { 10 }
fn default_flow_idle() -> u64 { 30 * 60 }
fn default_challenge_ttl() -> u64 { TEXT_CHALLENGE_TTL_SECS }
fn default_page_size() -> usize { DEFAULT_PAGE_SIZE }
fn default_max_page_size() -> usize { 50 }

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub redis_url: Option<String>,
    pub listen: Option<String>,
    pub store: Option<StoreBackend>,
}

impl AppConfig {
    /// Load configuration from file, with CLI overrides
    pub fn load(config_path: &str, overrides: &Overrides) -> Result<Self> {
        let mut config = if Path::new(config_path).exists() {
            let settings = config::Config::builder()
                .add_source(config::File::with_name(config_path))
                .build()
                .context("Failed to load config file")?;

            settings
                .try_deserialize()
                .context("Failed to parse config")?
        } else {
            // Use defaults if config file doesn't exist
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Self::default()
        };

        // Apply CLI overrides
        if let Some(ref redis_url) = overrides.redis_url {
            config.redis_url = redis_url.clone();
        }
        if let Some(ref listen) = overrides.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(store) = overrides.store {
            config.store = store;
        }

        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            listen_addr: default_listen_addr(),
            store: StoreBackend::default(),
            request_timeout_secs: default_request_timeout(),
            flow_idle_secs: default_flow_idle(),
            captcha: CaptchaConfig::default(),
            sales: SalesSettings::default(),
            history: HistoryConfig::default(),
        }
    }
}
