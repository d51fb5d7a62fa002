use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// JSON file the store is persisted to. Kept in memory only when unset.
    pub storage_path: Option<PathBuf>,
    /// Origin of the frontend allowed by CORS. Any origin when unset.
    pub allowed_origin: Option<String>,
    /// Page that opens shared bills; share links point here.
    pub public_url: String,
    pub qr_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage_path: None,
            allowed_origin: None,
            public_url: "http://localhost:8080/shared".to_string(),
            qr_base_url: "https://img.vietqr.io/image".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match non_empty("SPLITBILL_PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port))?,
            None => defaults.port,
        };

        Ok(Config {
            host: non_empty("SPLITBILL_HOST").unwrap_or(defaults.host),
            port,
            storage_path: non_empty("SPLITBILL_STORAGE_PATH").map(PathBuf::from),
            allowed_origin: non_empty("SPLITBILL_ALLOWED_ORIGIN"),
            public_url: non_empty("SPLITBILL_PUBLIC_URL").unwrap_or(defaults.public_url),
            qr_base_url: non_empty("SPLITBILL_QR_BASE_URL").unwrap_or(defaults.qr_base_url),
        })
    }
}
