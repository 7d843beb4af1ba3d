//! Server configuration from environment variables
//!
//! A `.env` file is loaded first when present.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use callwatch::TrackerConfig;

use crate::adapters::ElevenLabsConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0:5001";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub provider: ElevenLabsConfig,
    pub tracker: TrackerConfig,
    pub webhook_secret: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("ELEVENLABS_API_KEY").context("ELEVENLABS_API_KEY is not set")?;
        let phone_number_id =
            get("ELEVENLABS_PHONE_NUMBER_ID").context("ELEVENLABS_PHONE_NUMBER_ID is not set")?;

        let mut provider = ElevenLabsConfig::new(api_key, phone_number_id);
        if let Some(base_url) = get("ELEVENLABS_BASE_URL") {
            provider.base_url = base_url.trim_end_matches('/').to_string();
        }

        let bind = get("CALLWATCH_BIND")
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse()
            .context("CALLWATCH_BIND must be host:port")?;

        let mut tracker = TrackerConfig::default();
        if let Some(ms) = get("CALLWATCH_POLL_INTERVAL_MS") {
            let ms: u64 = ms
                .parse()
                .context("CALLWATCH_POLL_INTERVAL_MS must be a number")?;
            tracker.poll_interval = Duration::from_millis(ms.max(100));
        }
        if let Some(max) = get("CALLWATCH_MAX_RECONCILE_ATTEMPTS") {
            tracker.max_reconcile_attempts = max
                .parse()
                .context("CALLWATCH_MAX_RECONCILE_ATTEMPTS must be a number")?;
        }
        if let Some(flag) = get("CALLWATCH_AUTO_RECONCILE") {
            tracker.auto_reconcile = parse_flag(&flag)
                .with_context(|| format!("CALLWATCH_AUTO_RECONCILE: invalid value {}", flag))?;
        }

        Ok(Self {
            bind,
            provider,
            tracker,
            webhook_secret: get("CALLWATCH_WEBHOOK_SECRET"),
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
