use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Showroom binary.
#[derive(Debug, Parser)]
#[command(name = "showroom", version, about = "Showroom car listing API")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SHOWROOM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Showroom HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Enable or disable the response cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the freshness window.
    #[arg(long = "cache-freshness-seconds", value_name = "SECONDS")]
    pub cache_freshness_seconds: Option<u32>,

    /// Override the stale-while-revalidate window.
    #[arg(long = "cache-stale-seconds", value_name = "SECONDS")]
    pub cache_stale_seconds: Option<u32>,

    /// Override the response store capacity.
    #[arg(long = "cache-store-capacity", value_name = "COUNT")]
    pub cache_store_capacity: Option<usize>,

    /// Seed the inventory with demo dealers and cars.
    #[arg(
        long = "catalog-seed-demo-data",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub catalog_seed_demo_data: Option<bool>,
}
