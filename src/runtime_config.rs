// =============================================================================
// Runtime Configuration — JSON settings with serde defaults and env overrides
// =============================================================================
//
// All fields carry `#[serde(default)]` so a partial (or empty) config file is
// always valid. A missing file is not an error at the call site: `main` falls
// back to defaults with a warning.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::directory::CodeFormat;
use crate::spread::DEFAULT_WINDOW;
use crate::types::Lookback;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_bind_addr() -> String {
    "127.0.0.1:8501".to_string()
}

fn default_directory_url() -> String {
    "https://indexes.nikkei.co.jp/nkave/index/component?idx=nk225".to_string()
}

fn default_price_base_url() -> String {
    "https://query2.finance.yahoo.com".to_string()
}

fn default_code_width() -> usize {
    4
}

fn default_market_suffix() -> String {
    ".T".to_string()
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

fn default_directory_ttl_secs() -> u64 {
    86_400
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("Mozilla/5.0 (saya-viewer/", env!("CARGO_PKG_VERSION"), ")").to_string()
}

fn default_chart_width() -> u32 {
    960
}

fn default_chart_height() -> u32 {
    420
}

// =============================================================================
// RuntimeConfig
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Server -------------------------------------------------------------

    /// Address the dashboard listens on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    // --- Directory source ---------------------------------------------------

    /// Page holding the constituent tables.
    #[serde(default = "default_directory_url")]
    pub directory_url: String,

    /// Codes are left-padded with zeros to this width.
    #[serde(default = "default_code_width")]
    pub code_width: usize,

    /// Appended to every normalised code, e.g. `.T` for Tokyo.
    #[serde(default = "default_market_suffix")]
    pub market_suffix: String,

    /// Directory cache lifetime; 0 keeps it for the process lifetime.
    #[serde(default = "default_directory_ttl_secs")]
    pub directory_ttl_secs: u64,

    // --- Price source -------------------------------------------------------

    #[serde(default = "default_price_base_url")]
    pub price_base_url: String,

    /// Lookback used when a request does not name one.
    #[serde(default)]
    pub default_lookback: Lookback,

    /// Rolling window used when a request does not name one.
    #[serde(default = "default_window")]
    pub default_window: usize,

    // --- HTTP client --------------------------------------------------------

    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    // --- Chart --------------------------------------------------------------

    #[serde(default = "default_chart_width")]
    pub chart_width: u32,

    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            directory_url: default_directory_url(),
            code_width: default_code_width(),
            market_suffix: default_market_suffix(),
            directory_ttl_secs: default_directory_ttl_secs(),
            price_base_url: default_price_base_url(),
            default_lookback: Lookback::default(),
            default_window: default_window(),
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            directory_url = %config.directory_url,
            default_window = config.default_window,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// `main`).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = non_empty("SAYA_BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = non_empty("SAYA_DIRECTORY_URL") {
            self.directory_url = v;
        }
        if let Some(v) = non_empty("SAYA_PRICE_BASE_URL") {
            self.price_base_url = v;
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }

    pub fn code_format(&self) -> CodeFormat {
        CodeFormat {
            width: self.code_width,
            suffix: self.market_suffix.clone(),
        }
    }
}
