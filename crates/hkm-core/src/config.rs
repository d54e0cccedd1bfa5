use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, retry::RetryPolicy, Result};

/// Cache lifetimes per operation family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    /// User profile lookups.
    pub user_ttl: Duration,
    /// Task lists, task detail and task stats.
    pub task_ttl: Duration,
    /// Upper bound on stored entries; `None` keeps the lazy-sweep-only behavior.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            user_ttl: Duration::from_secs(300),
            task_ttl: Duration::from_secs(60),
            max_entries: None,
        }
    }
}

/// Transport settings for the backend API client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    /// Total timeout for a single attempt.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Maximum simultaneous physical connections / in-flight requests.
    pub pool_size: usize,
    /// How long idle pooled connections (and their resolved addresses) are kept.
    pub pool_idle_timeout: Duration,
    pub retry: RetryPolicy,
    pub cache: CacheConfig,
    pub user_agent: String,
}

impl ApiConfig {
    /// Defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let timeout = Duration::from_secs(30);
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            connect_timeout: Duration::from_secs(10),
            pool_size: 100,
            pool_idle_timeout: Duration::from_secs(300),
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(10),
                max_elapsed: timeout,
            },
            cache: CacheConfig::default(),
            user_agent: format!("hkm/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Typed configuration for the host process.
#[derive(Clone, Debug)]
pub struct Config {
    pub api: ApiConfig,
    /// Token for the Telegram file side channel. Attachments are skipped without it.
    pub telegram_bot_token: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from an arbitrary key lookup (env, tests, ...).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = get("API_URL").and_then(non_empty).ok_or_else(|| {
            Error::Config("API_URL environment variable is required".to_string())
        })?;

        let mut api = ApiConfig::new(base_url.trim());

        let secs = |key: &str| get(key).and_then(|s| parse_u64(&s)).map(Duration::from_secs);

        if let Some(t) = secs("API_TIMEOUT") {
            api.timeout = t;
            api.retry.max_elapsed = t;
        }
        if let Some(t) = secs("API_CONNECT_TIMEOUT") {
            api.connect_timeout = t;
        }

        // API_MAX_RETRIES wins; API_RETRY_COUNT is the older spelling.
        if let Some(n) = get("API_MAX_RETRIES")
            .or_else(|| get("API_RETRY_COUNT"))
            .and_then(|s| parse_u64(&s))
        {
            api.retry.max_attempts = n.clamp(1, u32::MAX as u64) as u32;
        }
        if let Some(d) = secs("API_RETRY_DELAY") {
            api.retry.base_delay = d;
        }
        if let Some(d) = secs("API_RETRY_MAX_DELAY") {
            api.retry.max_delay = d;
        }
        if let Some(d) = secs("API_MAX_RETRY_TIME") {
            api.retry.max_elapsed = d;
        }

        if let Some(n) = get("API_POOL_SIZE").and_then(|s| parse_u64(&s)) {
            api.pool_size = (n as usize).max(1);
        }
        if let Some(d) = secs("API_DNS_CACHE_TTL") {
            api.pool_idle_timeout = d;
        }

        if let Some(d) = secs("CACHE_TTL") {
            api.cache.task_ttl = d;
        }
        if let Some(d) = secs("USER_CACHE_TTL") {
            api.cache.user_ttl = d;
        }
        api.cache.max_entries = get("CACHE_MAX_ENTRIES")
            .and_then(|s| parse_u64(&s))
            .map(|n| n as usize)
            .filter(|n| *n > 0);

        let telegram_bot_token = get("BOT_TOKEN").and_then(non_empty);

        Ok(Self {
            api,
            telegram_bot_token,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_u64(s: &str) -> Option<u64> {
    s.trim().parse::<u64>().ok()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
