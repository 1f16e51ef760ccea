use std::env;
use std::path::PathBuf;
use std::time::Duration;

use area_index::{AreaIndexPaths, DEFAULT_REBUILD_DEBOUNCE};

use crate::error::{CoreError, CoreResult};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT_API: u16 = 8000;
const DEFAULT_PORT_CDN_THINGDEFS: u16 = 8001;
const DEFAULT_PORT_CDN_AREABUNDLES: u16 = 8002;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_CACHE_DIR: &str = "./cache";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub api_port: u16,
    pub thingdefs_port: u16,
    pub areabundles_port: u16,
    pub data_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub index_debounce: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            api_port: DEFAULT_PORT_API,
            thingdefs_port: DEFAULT_PORT_CDN_THINGDEFS,
            areabundles_port: DEFAULT_PORT_CDN_AREABUNDLES,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            index_debounce: DEFAULT_REBUILD_DEBOUNCE,
        }
    }
}

impl ServerConfig {
    /// Reads the process environment after loading an optional `.env` file.
    pub fn from_env() -> CoreResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
            Err(error) if error.not_found() => {}
            Err(error) => {
                return Err(CoreError::InvalidInput(format!("failed to load .env: {error}")))
            }
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let text = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let host = text("HOST").unwrap_or(defaults.host);
        let api_port = parse_var(&lookup, "PORT_API")?.unwrap_or(defaults.api_port);
        let thingdefs_port =
            parse_var(&lookup, "PORT_CDN_THINGDEFS")?.unwrap_or(defaults.thingdefs_port);
        let areabundles_port =
            parse_var(&lookup, "PORT_CDN_AREABUNDLES")?.unwrap_or(defaults.areabundles_port);
        let data_dir = text("DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir);
        let cache_dir = text("CACHE_DIR").map(PathBuf::from).unwrap_or(defaults.cache_dir);
        let index_debounce = parse_var::<u64, _>(&lookup, "AREA_INDEX_DEBOUNCE_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.index_debounce);

        Ok(Self {
            host,
            api_port,
            thingdefs_port,
            areabundles_port,
            data_dir,
            cache_dir,
            index_debounce,
        })
    }

    pub fn index_paths(&self) -> AreaIndexPaths {
        AreaIndexPaths::from_roots(&self.data_dir, &self.cache_dir)
    }

    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.host, self.api_port)
    }

    pub fn thingdefs_addr(&self) -> String {
        format!("{}:{}", self.host, self.thingdefs_port)
    }

    pub fn areabundles_addr(&self) -> String {
        format!("{}:{}", self.host, self.areabundles_port)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> CoreResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key).filter(|value| !value.trim().is_empty()) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|error| CoreError::InvalidInput(format!("invalid {key}={raw:?}: {error}")))
}
