use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "idvault";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable prefix for runtime overrides
pub const ENV_PREFIX: &str = "IDVAULT_";

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SIMULATED_LATENCY_MS: u64 = 250;
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Get the application data directory
/// ~/.idvault/ (falls back to the working directory without a home)
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!(".{APP_NAME}"))
}

/// Default SQLite database file
pub fn database_path() -> PathBuf {
    app_data_dir().join("documents.db")
}

/// Default content store directory
pub fn content_store_dir() -> PathBuf {
    app_data_dir().join("blobs")
}

/// Log filter used when RUST_LOG is not set
pub fn default_log_filter() -> &'static str {
    if cfg!(debug_assertions) {
        "idvault=debug,idvault_lib=debug"
    } else {
        "idvault=info,idvault_lib=info"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// `None` keeps blobs in memory only.
    pub content_store_dir: Option<PathBuf>,
    pub bind_addr: SocketAddr,
    pub worker_concurrency: usize,
    pub step_timeout: Duration,
    /// Delay of the simulated OCR and ledger calls.
    pub simulated_latency: Duration,
    pub max_document_bytes: usize,
    /// Synthesise a placeholder identifier when none is found.
    pub relaxed_identifiers: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: database_path(),
            content_store_dir: Some(content_store_dir()),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            step_timeout: Duration::from_millis(DEFAULT_STEP_TIMEOUT_MS),
            simulated_latency: Duration::from_millis(DEFAULT_SIMULATED_LATENCY_MS),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            relaxed_identifiers: false,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `IDVAULT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = get("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        if let Some(dir) = get("CONTENT_STORE_DIR") {
            config.content_store_dir = match dir.as_str() {
                "memory" | ":memory:" => None,
                _ => Some(PathBuf::from(dir)),
            };
        }
        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", &addr)?;
        }
        if let Some(n) = get("WORKER_CONCURRENCY") {
            config.worker_concurrency = parse::<usize>("WORKER_CONCURRENCY", &n)?.max(1);
        }
        if let Some(ms) = get("STEP_TIMEOUT_MS") {
            config.step_timeout = Duration::from_millis(parse("STEP_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = get("SIMULATED_LATENCY_MS") {
            config.simulated_latency = Duration::from_millis(parse("SIMULATED_LATENCY_MS", &ms)?);
        }
        if let Some(n) = get("MAX_DOCUMENT_BYTES") {
            config.max_document_bytes = parse("MAX_DOCUMENT_BYTES", &n)?;
        }
        if let Some(flag) = get("RELAXED_IDENTIFIERS") {
            config.relaxed_identifiers = parse_flag("RELAXED_IDENTIFIERS", &flag)?;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: format!("{ENV_PREFIX}{key}"),
        value: value.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: format!("{ENV_PREFIX}{key}"),
            value: value.to_string(),
        }),
    }
}
