//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

pub use cli::{CliArgs, Command, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "showroom";
const ENV_PREFIX: &str = "SHOWROOM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CACHE_FRESHNESS_SECS: u32 = 60;
const DEFAULT_CACHE_STALE_SECS: u32 = 120;
const DEFAULT_CACHE_REFRESH_LOCK_SECS: u32 = 5;
const DEFAULT_CACHE_REFRESH_TIMEOUT_SECS: u32 = 5;
const DEFAULT_CACHE_STORE_CAPACITY: usize = 10_000;
const DEFAULT_CACHE_MAX_BODY_BYTES: u32 = 1024 * 1024;
const DEFAULT_PER_PAGE: u32 = 20;
const DEFAULT_MAX_PER_PAGE: u32 = 50;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub admin: AdminSettings,
    pub catalog: CatalogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub freshness_seconds: u32,
    pub stale_seconds: u32,
    pub refresh_lock_seconds: NonZeroU32,
    pub refresh_timeout_seconds: NonZeroU32,
    pub store_capacity: NonZeroUsize,
    pub max_body_bytes: NonZeroU32,
}

#[derive(Clone, Default)]
pub struct AdminSettings {
    /// Shared secret for write and purge routes; `None` disables them.
    pub token: Option<String>,
}

impl std::fmt::Debug for AdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub default_per_page: u32,
    pub max_per_page: u32,
    pub seed_demo_data: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Parse CLI arguments from the process and load settings.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    admin: RawAdminSettings,
    catalog: RawCatalogSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(seconds) = overrides.cache_freshness_seconds {
            self.cache.freshness_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.cache_stale_seconds {
            self.cache.stale_seconds = Some(seconds);
        }
        if let Some(capacity) = overrides.cache_store_capacity {
            self.cache.store_capacity = Some(capacity);
        }
        if let Some(seed) = overrides.catalog_seed_demo_data {
            self.catalog.seed_demo_data = Some(seed);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            cache,
            admin,
            catalog,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            admin: build_admin_settings(admin),
            catalog: build_catalog_settings(catalog)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let refresh_lock_seconds = non_zero_u32(
        cache
            .refresh_lock_seconds
            .unwrap_or(DEFAULT_CACHE_REFRESH_LOCK_SECS)
            .into(),
        "cache.refresh_lock_seconds",
    )?;
    let refresh_timeout_seconds = non_zero_u32(
        cache
            .refresh_timeout_seconds
            .unwrap_or(DEFAULT_CACHE_REFRESH_TIMEOUT_SECS)
            .into(),
        "cache.refresh_timeout_seconds",
    )?;
    if refresh_timeout_seconds > refresh_lock_seconds {
        return Err(LoadError::invalid(
            "cache.refresh_timeout_seconds",
            format!(
                "must not exceed cache.refresh_lock_seconds ({refresh_lock_seconds})"
            ),
        ));
    }

    let store_capacity = NonZeroUsize::new(
        cache
            .store_capacity
            .unwrap_or(DEFAULT_CACHE_STORE_CAPACITY),
    )
    .ok_or_else(|| LoadError::invalid("cache.store_capacity", "must be greater than zero"))?;

    let max_body_bytes = non_zero_u32(
        cache
            .max_body_bytes
            .unwrap_or(DEFAULT_CACHE_MAX_BODY_BYTES)
            .into(),
        "cache.max_body_bytes",
    )?;

    Ok(CacheSettings {
        enabled: cache.enabled.unwrap_or(true),
        freshness_seconds: cache
            .freshness_seconds
            .unwrap_or(DEFAULT_CACHE_FRESHNESS_SECS),
        stale_seconds: cache.stale_seconds.unwrap_or(DEFAULT_CACHE_STALE_SECS),
        refresh_lock_seconds,
        refresh_timeout_seconds,
        store_capacity,
        max_body_bytes,
    })
}

fn build_admin_settings(admin: RawAdminSettings) -> AdminSettings {
    let token = admin.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    AdminSettings { token }
}

fn build_catalog_settings(catalog: RawCatalogSettings) -> Result<CatalogSettings, LoadError> {
    let max_per_page = catalog.max_per_page.unwrap_or(DEFAULT_MAX_PER_PAGE);
    if max_per_page == 0 {
        return Err(LoadError::invalid(
            "catalog.max_per_page",
            "must be greater than zero",
        ));
    }

    let default_per_page = catalog.default_per_page.unwrap_or(DEFAULT_PER_PAGE);
    if default_per_page == 0 || default_per_page > max_per_page {
        return Err(LoadError::invalid(
            "catalog.default_per_page",
            format!("must be between 1 and catalog.max_per_page ({max_per_page})"),
        ));
    }

    Ok(CatalogSettings {
        default_per_page,
        max_per_page,
        seed_demo_data: catalog.seed_demo_data.unwrap_or(true),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    freshness_seconds: Option<u32>,
    stale_seconds: Option<u32>,
    refresh_lock_seconds: Option<u32>,
    refresh_timeout_seconds: Option<u32>,
    store_capacity: Option<usize>,
    max_body_bytes: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    default_per_page: Option<u32>,
    max_per_page: Option<u32>,
    seed_demo_data: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse::<SocketAddr>()
        .map_err(|err| format!("invalid socket address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    let value = u32::try_from(value)
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
