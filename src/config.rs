use std::path::PathBuf;
use std::time::Duration;

use crate::engine::StatsPolicy;

/// Process configuration, read once from `BOOKQ_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub user: Option<String>,
    pub password: String,
    pub max_connections: usize,
    /// `None` disables the background reloader.
    pub reload_interval: Option<Duration>,
    pub policy: StatsPolicy,
    pub metrics_port: Option<u16>,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unparseable numbers fall back to their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| get(key).and_then(|s| s.trim().parse::<u64>().ok());

        let reload_secs = parsed("BOOKQ_RELOAD_INTERVAL_SECS").unwrap_or(5);
        let exclude_cancelled = get("BOOKQ_PENDING_EXCLUDES_CANCELLED")
            .is_some_and(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"));

        Self {
            bind: get("BOOKQ_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: get("BOOKQ_PORT").and_then(|s| s.trim().parse().ok()).unwrap_or(5434),
            data_dir: PathBuf::from(get("BOOKQ_DATA_DIR").unwrap_or_else(|| "./data".into())),
            user: get("BOOKQ_USER").filter(|u| !u.is_empty()),
            password: get("BOOKQ_PASSWORD").unwrap_or_else(|| "bookq".into()),
            max_connections: parsed("BOOKQ_MAX_CONNECTIONS").map_or(256, |n| n as usize),
            reload_interval: (reload_secs > 0).then(|| Duration::from_secs(reload_secs)),
            policy: StatsPolicy {
                exclude_cancelled_from_pending: exclude_cancelled,
            },
            metrics_port: get("BOOKQ_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
            tls_cert: get("BOOKQ_TLS_CERT"),
            tls_key: get("BOOKQ_TLS_KEY"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
