use std::time::Duration;

use reqwest::Client;

use crate::types::types::FetchError;

/// Default number of idle pooled connections kept per host.
const DEFAULT_POOL_MAX_IDLE: usize = 8;

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client settings for the fetch path.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub connect_timeout: Duration,
    /// Per-read timeout on the response body; `None` waits forever.
    pub read_timeout: Option<Duration>,
    pub pool_max_idle_per_host: usize,
    pub tcp_nodelay: bool,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE,
            tcp_nodelay: true,
            user_agent: concat!("progfetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    /// Defaults overridden by `PROGFETCH_*` environment variables.
    ///
    /// | Variable                         | Field                    |
    /// |----------------------------------|--------------------------|
    /// | `PROGFETCH_CONNECT_TIMEOUT_SECS` | `connect_timeout`        |
    /// | `PROGFETCH_READ_TIMEOUT_SECS`    | `read_timeout`           |
    /// | `PROGFETCH_POOL_MAX_IDLE`        | `pool_max_idle_per_host` |
    /// | `PROGFETCH_USER_AGENT`           | `user_agent`             |
    ///
    /// Unparseable values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(secs) = parse_var::<u64, _>(&lookup, "PROGFETCH_CONNECT_TIMEOUT_SECS") {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "PROGFETCH_READ_TIMEOUT_SECS") {
            config.read_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(n) = parse_var::<usize, _>(&lookup, "PROGFETCH_POOL_MAX_IDLE") {
            config.pool_max_idle_per_host = n;
        }
        if let Some(ua) = lookup("PROGFETCH_USER_AGENT").filter(|s| !s.trim().is_empty()) {
            config.user_agent = ua;
        }
        config
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_pool_max_idle_per_host(mut self, n: usize) -> Self {
        self.pool_max_idle_per_host = n;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Builds the shared HTTP client these settings describe.
    pub fn build_client(&self) -> Result<Client, FetchError> {
        let mut builder = Client::builder()
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .tcp_nodelay(self.tcp_nodelay)
            .user_agent(self.user_agent.clone());
        if let Some(timeout) = self.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        builder.build().map_err(|e| FetchError::Client(e.to_string()))
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("[fetch_config] ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}
