//! Server configuration from `HOUSEBOOK_*` environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use crate::calendar::Calendar;

const PREFIX: &str = "HOUSEBOOK_";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("HOUSEBOOK_{var}: invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("both HOUSEBOOK_TLS_CERT and HOUSEBOOK_TLS_KEY must be set, or neither")]
    PartialTls,
    #[error("HOUSEBOOK_UTC_OFFSET_MINUTES must be within ±1439, got {0}")]
    OffsetOutOfRange(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    /// WAL appends since the last compaction that trigger a rewrite.
    pub compact_threshold: u64,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub metrics_port: Option<u16>,
    /// Building-local time as minutes east of UTC.
    pub utc_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "housebook".into(),
            max_connections: 256,
            compact_threshold: 1000,
            tls_cert: None,
            tls_key: None,
            metrics_port: None,
            utc_offset_minutes: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source; `lookup` receives the full
    /// prefixed name. Unset variables keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(&format!("{PREFIX}{var}")).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(v) = parse(&get, "PORT")? {
            config.port = v;
        }
        if let Some(v) = get("BIND") {
            config.bind = v;
        }
        if let Some(v) = get("DATA_DIR") {
            config.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PASSWORD") {
            config.password = v;
        }
        if let Some(v) = parse(&get, "MAX_CONNECTIONS")? {
            if v == 0 {
                return Err(ConfigError::Invalid {
                    var: "MAX_CONNECTIONS",
                    value: "0".into(),
                });
            }
            config.max_connections = v;
        }
        if let Some(v) = parse(&get, "COMPACT_THRESHOLD")? {
            config.compact_threshold = v;
        }
        config.metrics_port = parse(&get, "METRICS_PORT")?;
        if let Some(v) = parse(&get, "UTC_OFFSET_MINUTES")? {
            if !(-1439..=1439).contains(&v) {
                return Err(ConfigError::OffsetOutOfRange(v));
            }
            config.utc_offset_minutes = v;
        }

        config.tls_cert = get("TLS_CERT");
        config.tls_key = get("TLS_KEY");
        if config.tls_cert.is_some() != config.tls_key.is_some() {
            return Err(ConfigError::PartialTls);
        }
        Ok(config)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("housebook.wal")
    }

    /// Building-local calendar. The offset was range-checked on load.
    pub fn calendar(&self) -> Calendar {
        Calendar::with_offset_minutes(self.utc_offset_minutes).unwrap_or_else(Calendar::utc)
    }
}

fn parse<T: FromStr>(get: &impl Fn(&str) -> Option<String>, var: &'static str) -> Result<Option<T>, ConfigError> {
    match get(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
    }
}
