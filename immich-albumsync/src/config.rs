use std::path::PathBuf;
use std::time::Duration;

use crate::rules::ConfigError;
use crate::sync::EngineOptions;
use crate::sync::backoff::{Backoff, RetryPolicy};
use crate::sync::governor::MAX_LIMIT;

const DEFAULT_BASE_URL: &str = "http://localhost:2283";
const DEFAULT_RULES_FILE: &str = "rules.json";
const APP_DIR_NAME: &str = "immich-albumsync";
const DEFAULT_MAX_CONCURRENT_REQUESTS: u64 = 4;
const DEFAULT_PAGE_SIZE: u64 = 1000;
const DEFAULT_BATCH_SIZE: u64 = 2000;
const DEFAULT_MAX_RETRIES: u64 = 4;
const DEFAULT_RETRY_BASE_MS: u64 = 500;
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub base_url: String,
    pub api_key: String,
    pub rules_path: PathBuf,
    pub max_concurrent_requests: usize,
    pub page_size: u32,
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_base: Duration,
    pub preview: bool,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("IMMICH_API_KEY")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(ConfigError::MissingSetting("IMMICH_API_KEY"))?;
        let base_url = lookup("IMMICH_BASE_URL")
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let rules_path = lookup("IMMICH_RULES_FILE")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_rules_path);

        Ok(Self {
            base_url,
            api_key,
            rules_path,
            max_concurrent_requests: read_u64(
                &lookup,
                "IMMICH_MAX_CONCURRENT_REQUESTS",
                DEFAULT_MAX_CONCURRENT_REQUESTS,
            )
            .min(MAX_LIMIT as u64) as usize,
            page_size: read_u64(&lookup, "IMMICH_PAGE_SIZE", DEFAULT_PAGE_SIZE)
                .min(u64::from(u32::MAX)) as u32,
            batch_size: read_u64(&lookup, "IMMICH_BATCH_SIZE", DEFAULT_BATCH_SIZE) as usize,
            max_retries: read_u64(&lookup, "IMMICH_MAX_RETRIES", DEFAULT_MAX_RETRIES)
                .min(u64::from(u32::MAX)) as u32,
            retry_base: Duration::from_millis(read_u64(
                &lookup,
                "IMMICH_RETRY_BASE_MS",
                DEFAULT_RETRY_BASE_MS,
            )),
            preview: read_bool(&lookup, "IMMICH_PREVIEW", false),
        })
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_concurrent_requests: self.max_concurrent_requests,
            page_size: self.page_size,
            batch_size: self.batch_size,
            preview: self.preview,
            retry: RetryPolicy::new(
                self.max_retries,
                Backoff::new(self.retry_base, RETRY_MAX_DELAY.max(self.retry_base), true),
            ),
        }
    }
}

fn default_rules_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_default()
        .join(DEFAULT_RULES_FILE)
}

fn read_u64<F>(lookup: &F, name: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn read_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}
